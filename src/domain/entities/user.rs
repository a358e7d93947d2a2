//! User identity types and the identity provider trait.
//!
//! User accounts are created and managed by the external account system;
//! the core only reads identity and role.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// User role tag. Ordering matters: a role can only sanction targets
/// that do not outrank it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Member,
    Staff,
    Superuser,
}

impl Role {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "superuser" => Self::Superuser,
            "staff" => Self::Staff,
            _ => Self::Member,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Staff => "staff",
            Self::Superuser => "superuser",
        }
    }

    /// Whether this role may issue globally scoped sanctions.
    pub fn is_global_moderator(&self) -> bool {
        matches!(self, Self::Staff | Self::Superuser)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved identity of an authenticated connection. Produced once at
/// handshake time and trusted for the session's lifetime.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub display_name: String,
    pub role: Role,
}

/// Represents a user account as the core sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Display name, unique across the account system
    pub display_name: String,

    /// Role tag
    pub role: Role,
}

/// External identity provider. Resolves handshake tokens and answers
/// role/name lookups needed for sanction rank checks and mention parsing.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a handshake token to an identity.
    ///
    /// Called exactly once per connection, at the `Connecting` phase.
    async fn resolve_token(&self, token: &str) -> Result<Identity, AppError>;

    /// Look up the role of a user (sanction target rank checks).
    async fn role_of(&self, user_id: i64) -> Result<Option<Role>, AppError>;

    /// Resolve a display name to a user ID (mention parsing).
    async fn find_by_name(&self, name: &str) -> Result<Option<i64>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Superuser > Role::Staff);
        assert!(Role::Staff > Role::Member);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Member, Role::Staff, Role::Superuser] {
            assert_eq!(Role::from_str(role.as_str()), role);
        }
    }
}
