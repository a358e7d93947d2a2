//! Sanction entity: standing restrictions (mute/ban) and one-shot kicks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of sanction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionKind {
    Mute,
    Ban,
    /// One-shot: forces disconnect at issuance, then blocks re-join until
    /// the cool-down expiry lapses.
    Kick,
}

impl SanctionKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mute" => Some(Self::Mute),
            "ban" => Some(Self::Ban),
            "kick" => Some(Self::Kick),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mute => "mute",
            Self::Ban => "ban",
            Self::Kick => "kick",
        }
    }
}

/// The set of rooms a sanction or moderation action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Room(i64),
}

impl Scope {
    pub fn room_id(&self) -> Option<i64> {
        match self {
            Self::Global => None,
            Self::Room(id) => Some(*id),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Room(id) => write!(f, "room:{}", id),
        }
    }
}

/// Standing restriction state for a user within some scope.
///
/// `Banned` dominates `Muted` when both are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanctionStatus {
    None,
    Muted,
    Banned,
}

/// Represents an active or historical sanction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sanction {
    /// Snowflake ID (primary key)
    pub id: i64,

    pub kind: SanctionKind,

    /// Global or a single room (serialized as `global` / `room:<id>`)
    #[serde(skip)]
    pub scope: Scope,

    /// Sanctioned user
    pub target_id: i64,

    /// Issuing moderator
    pub issuer_id: i64,

    pub reason: String,

    pub issued_at: DateTime<Utc>,

    /// Expiry instant; `None` means indefinite
    pub expires_at: Option<DateTime<Utc>>,

    /// Cleared on lift; expiry is evaluated lazily at query time
    pub active: bool,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Global
    }
}

impl Sanction {
    /// Whether this record has lapsed at `now`. Expiry is checked lazily
    /// at query time, not by a background sweep.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => now >= expiry,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sanction(expires_at: Option<DateTime<Utc>>) -> Sanction {
        Sanction {
            id: 1,
            kind: SanctionKind::Mute,
            scope: Scope::Global,
            target_id: 2,
            issuer_id: 3,
            reason: "spam".into(),
            issued_at: Utc::now(),
            expires_at,
            active: true,
        }
    }

    #[test]
    fn test_indefinite_sanction_never_expires() {
        let s = sanction(None);
        assert!(!s.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_expiry_is_inclusive_of_deadline() {
        let deadline = Utc::now();
        let s = sanction(Some(deadline));
        assert!(s.is_expired(deadline));
        assert!(!s.is_expired(deadline - Duration::seconds(1)));
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::Global.to_string(), "global");
        assert_eq!(Scope::Room(42).to_string(), "room:42");
    }
}
