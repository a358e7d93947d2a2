//! Room entity and the room directory trait.
//!
//! Rooms are created and mutated by the external room-management surface;
//! the core reads membership and moderator sets to resolve auto-join and
//! authorization scope.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Room visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "private" => Self::Private,
            _ => Self::Public,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// Represents a chat room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Room name
    pub name: String,

    /// Visibility (public rooms are auto-joined; private rooms require
    /// accepted membership)
    pub visibility: Visibility,

    /// User who created the room; always counts as a room moderator
    pub creator_id: i64,
}

impl Room {
    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }
}

/// External room directory. Membership and moderator changes are owned by
/// the room-management surface; the core only reads them.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Look up a room by ID.
    async fn room(&self, room_id: i64) -> Result<Option<Room>, AppError>;

    /// Member user IDs of a room.
    async fn members_of(&self, room_id: i64) -> Result<Vec<i64>, AppError>;

    /// Promoted moderator user IDs of a room (the creator is implicit).
    async fn moderators_of(&self, room_id: i64) -> Result<Vec<i64>, AppError>;

    /// Whether a user has accepted membership in a room.
    async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Rooms a user belongs to (drives initial auto-subscribe).
    async fn rooms_of(&self, user_id: i64) -> Result<Vec<Room>, AppError>;
}
