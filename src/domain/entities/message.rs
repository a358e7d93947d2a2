//! Message entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum message body length in characters.
pub const MAX_BODY_LENGTH: usize = 4000;

/// Placeholder body for moderation-deleted messages.
pub const REDACTED_BODY: &str = "[deleted]";

/// Represents a message sent in a room.
///
/// A deleted message keeps its sequence number (no renumbering) so that
/// ordering observed by prior readers is preserved; only the body is
/// redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Room the message was sent in
    pub room_id: i64,

    /// Sender user ID
    pub sender_id: i64,

    /// Message body (up to 4000 characters)
    pub body: String,

    /// Per-room monotonic sequence number, assigned at publish time
    pub sequence: u64,

    /// ID of the message being replied to (if this is a reply)
    pub reply_to: Option<i64>,

    /// Whether a moderator deleted this message
    pub deleted: bool,

    /// Timestamp when the message was accepted
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Check if this is a reply message.
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    /// Get the body length in characters.
    pub fn body_length(&self) -> usize {
        self.body.chars().count()
    }
}
