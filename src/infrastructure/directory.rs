//! Room directory implementations.
//!
//! The production directory reads rooms, membership, and moderator sets
//! from PostgreSQL; all writes to those tables belong to the external
//! room-management surface. An in-memory directory backs the test suites.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::entities::{Room, RoomDirectory, Visibility};
use crate::shared::error::AppError;

/// PostgreSQL room directory.
pub struct PgRoomDirectory {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: i64,
    name: String,
    visibility: String,
    creator_id: i64,
}

impl RoomRow {
    fn into_room(self) -> Room {
        Room {
            id: self.id,
            name: self.name,
            visibility: Visibility::from_str(&self.visibility),
            creator_id: self.creator_id,
        }
    }
}

impl PgRoomDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomDirectory for PgRoomDirectory {
    async fn room(&self, room_id: i64) -> Result<Option<Room>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, visibility, creator_id FROM rooms WHERE id = $1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RoomRow::into_room))
    }

    async fn members_of(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT user_id FROM room_members WHERE room_id = $1")
                .bind(room_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn moderators_of(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT user_id FROM room_members WHERE room_id = $1 AND moderator = TRUE",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM room_members WHERE room_id = $1 AND user_id = $2",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(exists.is_some())
    }

    async fn rooms_of(&self, user_id: i64) -> Result<Vec<Room>, AppError> {
        let rows = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT r.id, r.name, r.visibility, r.creator_id
            FROM rooms r
            JOIN room_members m ON m.room_id = r.id
            WHERE m.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RoomRow::into_room).collect())
    }
}

pub mod memory {
    //! In-memory room directory for the test suites.

    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use parking_lot::RwLock;

    use crate::domain::entities::{Room, RoomDirectory, Visibility};
    use crate::shared::error::AppError;

    #[derive(Default)]
    struct RoomState {
        room: Option<Room>,
        members: HashSet<i64>,
        moderators: HashSet<i64>,
    }

    #[derive(Default)]
    pub struct InMemoryRoomDirectory {
        rooms: RwLock<HashMap<i64, RoomState>>,
    }

    impl InMemoryRoomDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_room(&self, id: i64, name: &str, visibility: Visibility, creator_id: i64) {
            let mut rooms = self.rooms.write();
            let state = rooms.entry(id).or_default();
            state.room = Some(Room {
                id,
                name: name.to_string(),
                visibility,
                creator_id,
            });
            state.members.insert(creator_id);
        }

        pub fn add_member(&self, room_id: i64, user_id: i64) {
            self.rooms
                .write()
                .entry(room_id)
                .or_default()
                .members
                .insert(user_id);
        }

        pub fn promote_moderator(&self, room_id: i64, user_id: i64) {
            let mut rooms = self.rooms.write();
            let state = rooms.entry(room_id).or_default();
            state.members.insert(user_id);
            state.moderators.insert(user_id);
        }
    }

    #[async_trait]
    impl RoomDirectory for InMemoryRoomDirectory {
        async fn room(&self, room_id: i64) -> Result<Option<Room>, AppError> {
            Ok(self
                .rooms
                .read()
                .get(&room_id)
                .and_then(|s| s.room.clone()))
        }

        async fn members_of(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
            Ok(self
                .rooms
                .read()
                .get(&room_id)
                .map(|s| s.members.iter().copied().collect())
                .unwrap_or_default())
        }

        async fn moderators_of(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
            Ok(self
                .rooms
                .read()
                .get(&room_id)
                .map(|s| s.moderators.iter().copied().collect())
                .unwrap_or_default())
        }

        async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
            Ok(self
                .rooms
                .read()
                .get(&room_id)
                .map(|s| s.members.contains(&user_id))
                .unwrap_or(false))
        }

        async fn rooms_of(&self, user_id: i64) -> Result<Vec<Room>, AppError> {
            Ok(self
                .rooms
                .read()
                .values()
                .filter(|s| s.members.contains(&user_id))
                .filter_map(|s| s.room.clone())
                .collect())
        }
    }
}
