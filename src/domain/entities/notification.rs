//! Notification entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Mention,
    Message,
    Invite,
    Reply,
    Warning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::Message => "message",
            Self::Invite => "invite",
            Self::Reply => "reply",
            Self::Warning => "warning",
        }
    }
}

/// Represents a notification computed by the dispatcher.
///
/// The read/unread toggle is owned by the external notification-center
/// surface; the core only creates records with `read = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Snowflake ID (primary key)
    pub id: i64,

    pub kind: NotificationKind,

    pub recipient_id: i64,

    /// Source room, if any
    pub room_id: Option<i64>,

    /// Source message, if any
    pub message_id: Option<i64>,

    /// User who caused the notification, if any
    pub actor_id: Option<i64>,

    /// Human-readable summary line
    pub body: String,

    pub read: bool,

    pub created_at: DateTime<Utc>,
}
