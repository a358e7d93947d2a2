//! Audit log entry: immutable record of every accepted moderation action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sanction::Scope;

/// Moderation action kinds recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationKind {
    Mute,
    Unmute,
    Ban,
    Unban,
    Kick,
    Warn,
    DeleteMessage,
}

impl ModerationKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mute" => Some(Self::Mute),
            "unmute" => Some(Self::Unmute),
            "ban" => Some(Self::Ban),
            "unban" => Some(Self::Unban),
            "kick" => Some(Self::Kick),
            "warn" => Some(Self::Warn),
            "delete_message" | "delete" => Some(Self::DeleteMessage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::Kick => "kick",
            Self::Warn => "warn",
            Self::DeleteMessage => "delete_message",
        }
    }
}

impl std::fmt::Display for ModerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One append-only audit record. Written exactly once per accepted
/// moderation action, before the action's effect is observable; never
/// mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Issuing moderator
    pub actor_id: i64,

    pub kind: ModerationKind,

    /// Targeted user, where the action has one
    pub target_id: Option<i64>,

    /// Targeted message, for deletions
    pub message_id: Option<i64>,

    #[serde(skip)]
    pub scope: Scope,

    pub timestamp: DateTime<Utc>,

    pub reason: String,
}
