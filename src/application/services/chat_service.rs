//! Chat service.
//!
//! Inbound message, typing, and room-subscription flows. Everything runs
//! through the enforcement filter before it can reach the broadcast bus.

use std::sync::Arc;

use chrono::Utc;

use crate::application::bus::RoomBus;
use crate::application::events::OutboundEvent;
use crate::application::filter::EnforcementFilter;
use crate::application::presence::PresenceStore;
use crate::application::services::notification_service::NotificationDispatcher;
use crate::domain::entities::{Message, Room, RoomDirectory, MAX_BODY_LENGTH};
use crate::domain::persistence::PersistenceSink;
use crate::domain::services::enforcement::{ActionKind, DenyReason};
use crate::shared::snowflake::SnowflakeGenerator;

/// Failure modes of inbound chat actions.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Unknown room, not subscribed, or a private room the user is not a
    /// member of. Private rooms are reported identically to unknown rooms.
    #[error("room not found")]
    RoomNotFound,

    #[error("message body exceeds {MAX_BODY_LENGTH} characters")]
    BodyTooLong,

    #[error(transparent)]
    Denied(#[from] DenyReason),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Wire-level reason string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "room-not-found",
            Self::BodyTooLong => "invalid-frame",
            Self::Denied(reason) => reason.code(),
            Self::Internal(_) => "internal",
        }
    }
}

/// Outcome of an accepted send.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message: Message,
    /// False when the broadcast succeeded but the durable write did not
    pub durable: bool,
}

/// Inbound chat flows: send, typing, join, leave.
pub struct ChatService {
    presence: Arc<PresenceStore>,
    bus: Arc<RoomBus>,
    filter: Arc<EnforcementFilter>,
    directory: Arc<dyn RoomDirectory>,
    sink: Arc<dyn PersistenceSink>,
    notifier: Arc<NotificationDispatcher>,
    ids: Arc<SnowflakeGenerator>,
}

impl ChatService {
    pub fn new(
        presence: Arc<PresenceStore>,
        bus: Arc<RoomBus>,
        filter: Arc<EnforcementFilter>,
        directory: Arc<dyn RoomDirectory>,
        sink: Arc<dyn PersistenceSink>,
        notifier: Arc<NotificationDispatcher>,
        ids: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            presence,
            bus,
            filter,
            directory,
            sink,
            notifier,
            ids,
        }
    }

    /// Accept, sequence, and broadcast a message. The durable write comes
    /// after the broadcast; a sink failure downgrades the outcome instead
    /// of retracting the already-delivered message.
    pub async fn send(
        &self,
        session_id: &str,
        sender_id: i64,
        room_id: i64,
        body: String,
        reply_to: Option<i64>,
    ) -> Result<SendOutcome, ChatError> {
        if !self.presence.is_subscribed(session_id, room_id) {
            return Err(ChatError::RoomNotFound);
        }
        self.filter.check(sender_id, room_id, ActionKind::Send)?;
        if body.chars().count() > MAX_BODY_LENGTH {
            return Err(ChatError::BodyTooLong);
        }

        let message = Message {
            id: self.ids.generate(),
            room_id,
            sender_id,
            body,
            sequence: 0,
            reply_to,
            deleted: false,
            created_at: Utc::now(),
        };

        let message = self.bus.publish_message(message).await;

        let durable = match self.sink.store_message(&message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    message_id = message.id,
                    room_id,
                    error = %e,
                    "Message broadcast but not persisted"
                );
                false
            }
        };

        self.notifier.on_message(&message).await;

        Ok(SendOutcome { message, durable })
    }

    /// Relay a typing indicator, best-effort.
    pub async fn typing(
        &self,
        session_id: &str,
        user_id: i64,
        room_id: i64,
        is_typing: bool,
    ) -> Result<(), ChatError> {
        if !self.presence.is_subscribed(session_id, room_id) {
            return Err(ChatError::RoomNotFound);
        }
        self.filter.check(user_id, room_id, ActionKind::Typing)?;

        self.bus
            .publish_lossy(
                room_id,
                OutboundEvent::Typing {
                    room_id,
                    user_id,
                    is_typing,
                },
            )
            .await;
        Ok(())
    }

    /// Subscribe a session to a room. Private rooms require accepted
    /// membership and are otherwise indistinguishable from unknown rooms.
    pub async fn join(&self, session_id: &str, user_id: i64, room_id: i64) -> Result<Room, ChatError> {
        let room = self
            .directory
            .room(room_id)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?
            .ok_or(ChatError::RoomNotFound)?;

        if room.is_private() {
            let member = self
                .directory
                .is_member(room_id, user_id)
                .await
                .map_err(|e| ChatError::Internal(e.to_string()))?;
            if !member {
                return Err(ChatError::RoomNotFound);
            }
        }

        self.filter.check(user_id, room_id, ActionKind::Join)?;
        self.presence.subscribe(session_id, room_id).await;
        self.broadcast_presence(room_id, user_id, true).await;
        Ok(room)
    }

    /// Unsubscribe a session from a room.
    pub async fn leave(&self, session_id: &str, user_id: i64, room_id: i64) -> Result<(), ChatError> {
        if !self.presence.unsubscribe(session_id, room_id).await {
            return Err(ChatError::RoomNotFound);
        }
        self.broadcast_presence(room_id, user_id, false).await;
        Ok(())
    }

    /// Subscribe a fresh session to the user's public rooms, skipping any
    /// room where enforcement denies the join. Private rooms always wait
    /// for an explicit `join`. Returns the subscribed room ids.
    pub async fn auto_subscribe(&self, session_id: &str, user_id: i64) -> Vec<i64> {
        let rooms = match self.directory.rooms_of(user_id).await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Room lookup failed during auto-subscribe");
                return Vec::new();
            }
        };

        let mut joined = Vec::new();
        for room in rooms {
            if room.is_private() {
                continue;
            }
            if self.filter.check(user_id, room.id, ActionKind::Join).is_err() {
                continue;
            }
            if self.presence.subscribe(session_id, room.id).await {
                self.broadcast_presence(room.id, user_id, true).await;
                joined.push(room.id);
            }
        }
        joined
    }

    /// Announce offline transitions after unregister, best-effort.
    pub async fn announce_offline(&self, user_id: i64, room_ids: &[i64]) {
        if self.presence.is_online(user_id) {
            // Another session keeps the user present
            return;
        }
        for room_id in room_ids {
            self.broadcast_presence(*room_id, user_id, false).await;
        }
    }

    async fn broadcast_presence(&self, room_id: i64, user_id: i64, online: bool) {
        self.bus
            .publish_lossy(
                room_id,
                OutboundEvent::Presence {
                    room_id,
                    user_id,
                    online,
                },
            )
            .await;
    }
}
