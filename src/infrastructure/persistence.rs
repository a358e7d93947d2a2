//! Persistence sink implementations.
//!
//! PostgreSQL implementation of the write-only sink, plus an in-memory
//! variant used by the test suites.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::entities::{AuditEntry, Message, Notification, Sanction, REDACTED_BODY};
use crate::domain::persistence::PersistenceSink;
use crate::shared::error::AppError;

/// PostgreSQL persistence sink.
pub struct PgPersistenceSink {
    pool: PgPool,
}

impl PgPersistenceSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceSink for PgPersistenceSink {
    async fn store_message(&self, message: &Message) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, room_id, sender_id, body, sequence, reply_to, deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(message.id)
        .bind(message.room_id)
        .bind(message.sender_id)
        .bind(&message.body)
        .bind(message.sequence as i64)
        .bind(message.reply_to)
        .bind(message.deleted)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_message_deleted(
        &self,
        message_id: i64,
        room_id: i64,
        deleted_by: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET deleted = TRUE, body = $3, deleted_by = $4
            WHERE id = $1 AND room_id = $2
            "#,
        )
        .bind(message_id)
        .bind(room_id)
        .bind(REDACTED_BODY)
        .bind(deleted_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "message {} in room {}",
                message_id, room_id
            )));
        }
        Ok(())
    }

    async fn store_sanction(&self, sanction: &Sanction) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sanctions (id, kind, scope_room_id, target_id, issuer_id, reason, issued_at, expires_at, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(sanction.id)
        .bind(sanction.kind.as_str())
        .bind(sanction.scope.room_id())
        .bind(sanction.target_id)
        .bind(sanction.issuer_id)
        .bind(&sanction.reason)
        .bind(sanction.issued_at)
        .bind(sanction.expires_at)
        .bind(sanction.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate_sanction(&self, sanction_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE sanctions SET active = FALSE WHERE id = $1")
            .bind(sanction_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_audit_entry(&self, entry: &AuditEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, actor_id, kind, target_id, message_id, scope_room_id, timestamp, reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_id)
        .bind(entry.kind.as_str())
        .bind(entry.target_id)
        .bind(entry.message_id)
        .bind(entry.scope.room_id())
        .bind(entry.timestamp)
        .bind(&entry.reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_notification(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, kind, recipient_id, room_id, message_id, actor_id, body, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(notification.id)
        .bind(notification.kind.as_str())
        .bind(notification.recipient_id)
        .bind(notification.room_id)
        .bind(notification.message_id)
        .bind(notification.actor_id)
        .bind(&notification.body)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub mod memory {
    //! In-memory sink for the test suites. Records every write and can
    //! inject failures to exercise the fail-closed paths.

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::domain::entities::{AuditEntry, Message, Notification, Sanction, REDACTED_BODY};
    use crate::domain::persistence::PersistenceSink;
    use crate::shared::error::AppError;

    #[derive(Default)]
    pub struct InMemorySink {
        pub messages: Mutex<Vec<Message>>,
        /// (message_id, deleted_by) pairs
        pub deletions: Mutex<Vec<(i64, i64)>>,
        pub sanctions: Mutex<Vec<Sanction>>,
        pub deactivated: Mutex<Vec<i64>>,
        pub audit_entries: Mutex<Vec<AuditEntry>>,
        pub notifications: Mutex<Vec<Notification>>,
        fail_next: AtomicBool,
        fail_audit: AtomicBool,
    }

    impl InMemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next write of any kind, once.
        pub fn fail_next(&self) {
            self.fail_next.store(true, Ordering::SeqCst);
        }

        /// Fail every audit write until cleared.
        pub fn set_fail_audit(&self, fail: bool) {
            self.fail_audit.store(fail, Ordering::SeqCst);
        }

        fn check_fail(&self) -> Result<(), AppError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(AppError::Internal("injected sink failure".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PersistenceSink for InMemorySink {
        async fn store_message(&self, message: &Message) -> Result<(), AppError> {
            self.check_fail()?;
            self.messages.lock().push(message.clone());
            Ok(())
        }

        async fn mark_message_deleted(
            &self,
            message_id: i64,
            room_id: i64,
            deleted_by: i64,
        ) -> Result<(), AppError> {
            self.check_fail()?;
            let mut messages = self.messages.lock();
            let message = messages
                .iter_mut()
                .find(|m| m.id == message_id && m.room_id == room_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!("message {} in room {}", message_id, room_id))
                })?;
            message.deleted = true;
            message.body = REDACTED_BODY.to_string();
            drop(messages);
            self.deletions.lock().push((message_id, deleted_by));
            Ok(())
        }

        async fn store_sanction(&self, sanction: &Sanction) -> Result<(), AppError> {
            self.check_fail()?;
            self.sanctions.lock().push(sanction.clone());
            Ok(())
        }

        async fn deactivate_sanction(&self, sanction_id: i64) -> Result<(), AppError> {
            self.check_fail()?;
            self.deactivated.lock().push(sanction_id);
            Ok(())
        }

        async fn store_audit_entry(&self, entry: &AuditEntry) -> Result<(), AppError> {
            self.check_fail()?;
            if self.fail_audit.load(Ordering::SeqCst) {
                return Err(AppError::Internal("injected audit failure".into()));
            }
            self.audit_entries.lock().push(entry.clone());
            Ok(())
        }

        async fn store_notification(&self, notification: &Notification) -> Result<(), AppError> {
            self.check_fail()?;
            self.notifications.lock().push(notification.clone());
            Ok(())
        }
    }
}
