//! Persistence sink trait.
//!
//! The core writes records to a durable store and never reads them back;
//! the only read paths over persisted data (sanction activity, the
//! notification center) are served elsewhere. Implementations live in the
//! infrastructure layer.

use async_trait::async_trait;

use crate::domain::entities::{AuditEntry, Message, Notification, Sanction};
use crate::shared::error::AppError;

/// Write-only durable store for core records.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Persist an accepted message.
    async fn store_message(&self, message: &Message) -> Result<(), AppError>;

    /// Redact a message deleted by moderation: set the deleted flag and
    /// blank the body, keeping the sequence number. The room id keys the
    /// update together with the message id; a message that does not exist
    /// in that room fails with `NotFound`, so a moderator's scope cannot
    /// reach into another room's messages.
    async fn mark_message_deleted(
        &self,
        message_id: i64,
        room_id: i64,
        deleted_by: i64,
    ) -> Result<(), AppError>;

    /// Persist a newly issued sanction.
    async fn store_sanction(&self, sanction: &Sanction) -> Result<(), AppError>;

    /// Clear the active flag of a lifted or lazily expired sanction.
    async fn deactivate_sanction(&self, sanction_id: i64) -> Result<(), AppError>;

    /// Append an audit entry. Callers treat failure as fail-closed: the
    /// moderation action carrying this entry must be rejected.
    async fn store_audit_entry(&self, entry: &AuditEntry) -> Result<(), AppError>;

    /// Persist a notification for an offline recipient.
    async fn store_notification(&self, notification: &Notification) -> Result<(), AppError>;
}
