//! Moderation service.
//!
//! Executes moderation requests: scope authorization, target rank checks,
//! the fail-closed audit write, the sanction mutation, and the visible
//! effects (broadcasts, forced disconnects, notifications), in that order.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::application::bus::RoomBus;
use crate::application::events::{CloseReason, OutboundEvent};
use crate::application::presence::PresenceStore;
use crate::application::sanctions::{SanctionError, SanctionStore};
use crate::application::services::notification_service::NotificationDispatcher;
use crate::domain::entities::{
    AuditEntry, IdentityProvider, ModerationKind, Role, RoomDirectory, SanctionKind, Scope,
};
use crate::domain::persistence::PersistenceSink;
use crate::domain::services::enforcement::{self, AuthzError, DenyReason};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// A moderation action as requested over the wire.
#[derive(Debug, Clone)]
pub struct ModerationRequest {
    pub kind: ModerationKind,
    pub target_id: Option<i64>,
    pub message_id: Option<i64>,
    /// Absent means global scope
    pub room_id: Option<i64>,
    pub reason: String,
    /// Sanction lifetime in seconds; absent means indefinite
    pub duration_secs: Option<u64>,
}

/// Failure modes of moderation requests.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("insufficient scope for this action")]
    AuthorizationDenied,

    #[error("invalid moderation target")]
    InvalidTarget,

    #[error("room not found")]
    RoomNotFound,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("action could not be recorded: {0}")]
    Persistence(AppError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ModerationError {
    /// Wire-level reason string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthorizationDenied => "authorization-denied",
            Self::InvalidTarget => "invalid-target",
            Self::RoomNotFound => "room-not-found",
            Self::MissingField(_) => "invalid-frame",
            Self::Persistence(_) => "persistence-failure",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<AuthzError> for ModerationError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::AuthorizationDenied => Self::AuthorizationDenied,
            AuthzError::InvalidTarget => Self::InvalidTarget,
        }
    }
}

impl From<SanctionError> for ModerationError {
    fn from(e: SanctionError) -> Self {
        match e {
            SanctionError::NotFound => Self::InvalidTarget,
            SanctionError::Persistence(inner) => Self::Persistence(inner),
        }
    }
}

/// Executes moderation actions end to end.
pub struct ModerationService {
    presence: Arc<PresenceStore>,
    bus: Arc<RoomBus>,
    sanctions: Arc<SanctionStore>,
    directory: Arc<dyn RoomDirectory>,
    identity: Arc<dyn IdentityProvider>,
    sink: Arc<dyn PersistenceSink>,
    notifier: Arc<NotificationDispatcher>,
    ids: Arc<SnowflakeGenerator>,
    kick_cooldown: Duration,
}

impl ModerationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        presence: Arc<PresenceStore>,
        bus: Arc<RoomBus>,
        sanctions: Arc<SanctionStore>,
        directory: Arc<dyn RoomDirectory>,
        identity: Arc<dyn IdentityProvider>,
        sink: Arc<dyn PersistenceSink>,
        notifier: Arc<NotificationDispatcher>,
        ids: Arc<SnowflakeGenerator>,
        kick_cooldown_secs: u64,
    ) -> Self {
        Self {
            presence,
            bus,
            sanctions,
            directory,
            identity,
            sink,
            notifier,
            ids,
            kick_cooldown: Duration::seconds(kick_cooldown_secs as i64),
        }
    }

    /// Execute one moderation request on behalf of an authenticated actor.
    pub async fn execute(
        &self,
        actor_id: i64,
        actor_role: Role,
        request: ModerationRequest,
    ) -> Result<(), ModerationError> {
        let scope = self.resolve_scope(actor_id, actor_role, request.room_id).await?;

        match request.kind {
            ModerationKind::Mute => {
                self.issue_sanction(actor_id, actor_role, SanctionKind::Mute, scope, &request)
                    .await
            }
            ModerationKind::Ban => {
                self.issue_sanction(actor_id, actor_role, SanctionKind::Ban, scope, &request)
                    .await
            }
            ModerationKind::Kick => self.kick(actor_id, actor_role, scope, &request).await,
            ModerationKind::Warn => self.warn(actor_id, actor_role, scope, &request).await,
            ModerationKind::DeleteMessage => self.delete_message(actor_id, scope, &request).await,
            ModerationKind::Unmute => {
                self.lift_sanctions(actor_id, SanctionKind::Mute, scope, &request)
                    .await
            }
            ModerationKind::Unban => {
                self.lift_sanctions(actor_id, SanctionKind::Ban, scope, &request)
                    .await
            }
        }
    }

    /// Verify the room exists (when room-scoped) and that the actor's
    /// standing dominates the requested scope.
    async fn resolve_scope(
        &self,
        actor_id: i64,
        actor_role: Role,
        room_id: Option<i64>,
    ) -> Result<Scope, ModerationError> {
        let scope = match room_id {
            None => Scope::Global,
            Some(room_id) => Scope::Room(room_id),
        };

        let is_room_moderator = match scope {
            Scope::Global => false,
            Scope::Room(room_id) => {
                let room = self
                    .directory
                    .room(room_id)
                    .await
                    .map_err(|e| ModerationError::Internal(e.to_string()))?
                    .ok_or(ModerationError::RoomNotFound)?;
                if room.creator_id == actor_id {
                    true
                } else {
                    self.directory
                        .moderators_of(room_id)
                        .await
                        .map_err(|e| ModerationError::Internal(e.to_string()))?
                        .contains(&actor_id)
                }
            }
        };

        enforcement::authorize_scope(actor_role, is_room_moderator, &scope)?;
        Ok(scope)
    }

    /// Mute or ban: rank check, audit, sanction, broadcast, ban effects.
    async fn issue_sanction(
        &self,
        actor_id: i64,
        actor_role: Role,
        kind: SanctionKind,
        scope: Scope,
        request: &ModerationRequest,
    ) -> Result<(), ModerationError> {
        let target_id = request.target_id.ok_or(ModerationError::MissingField("target_id"))?;
        self.validate_target(actor_id, actor_role, target_id).await?;

        self.audit(actor_id, request.kind, Some(target_id), None, scope, &request.reason)
            .await?;

        let expires_at = request
            .duration_secs
            .map(|secs| Utc::now() + Duration::seconds(secs as i64));
        self.sanctions
            .issue(kind, scope, target_id, actor_id, request.reason.clone(), expires_at)
            .await?;

        self.broadcast_action(scope, request.kind, target_id, actor_id, &request.reason)
            .await;

        if kind == SanctionKind::Ban {
            match scope {
                Scope::Global => {
                    self.presence
                        .send_to_user(
                            target_id,
                            OutboundEvent::Error {
                                code: DenyReason::Banned.code().to_string(),
                                message: DenyReason::Banned.to_string(),
                            },
                        )
                        .await;
                    self.presence.force_close_user(
                        target_id,
                        CloseReason::Banned,
                        "you are banned",
                    );
                }
                Scope::Room(room_id) => {
                    self.presence.remove_user_from_room(target_id, room_id).await;
                    self.presence
                        .send_to_user(
                            target_id,
                            OutboundEvent::Error {
                                code: DenyReason::BannedRoom.code().to_string(),
                                message: DenyReason::BannedRoom.to_string(),
                            },
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    /// Kick: a short-lived room sanction that forces disconnect now and
    /// blocks re-join until the cool-down lapses.
    async fn kick(
        &self,
        actor_id: i64,
        actor_role: Role,
        scope: Scope,
        request: &ModerationRequest,
    ) -> Result<(), ModerationError> {
        let room_id = scope.room_id().ok_or(ModerationError::MissingField("room_id"))?;
        let target_id = request.target_id.ok_or(ModerationError::MissingField("target_id"))?;
        self.validate_target(actor_id, actor_role, target_id).await?;

        self.audit(actor_id, ModerationKind::Kick, Some(target_id), None, scope, &request.reason)
            .await?;

        let expires_at = Utc::now() + self.kick_cooldown;
        self.sanctions
            .issue(
                SanctionKind::Kick,
                scope,
                target_id,
                actor_id,
                request.reason.clone(),
                Some(expires_at),
            )
            .await?;

        self.broadcast_action(scope, ModerationKind::Kick, target_id, actor_id, &request.reason)
            .await;

        self.presence.remove_user_from_room(target_id, room_id).await;
        self.presence
            .force_close_user(target_id, CloseReason::Kicked, "you were kicked");
        Ok(())
    }

    /// Warn: audited, then persisted and delivered by the dispatcher.
    async fn warn(
        &self,
        actor_id: i64,
        actor_role: Role,
        scope: Scope,
        request: &ModerationRequest,
    ) -> Result<(), ModerationError> {
        let target_id = request.target_id.ok_or(ModerationError::MissingField("target_id"))?;
        self.validate_target(actor_id, actor_role, target_id).await?;

        self.audit(actor_id, ModerationKind::Warn, Some(target_id), None, scope, &request.reason)
            .await?;

        self.notifier
            .warn(target_id, actor_id, scope.room_id(), request.reason.clone())
            .await
            .map_err(ModerationError::Persistence)
    }

    /// Redact a message: the record keeps its id and sequence number,
    /// only the body goes. The durable update is keyed on the message AND
    /// the authorized room, so a moderator of one room cannot reach a
    /// message that lives in another.
    async fn delete_message(
        &self,
        actor_id: i64,
        scope: Scope,
        request: &ModerationRequest,
    ) -> Result<(), ModerationError> {
        let room_id = scope.room_id().ok_or(ModerationError::MissingField("room_id"))?;
        let message_id = request
            .message_id
            .ok_or(ModerationError::MissingField("message_id"))?;

        self.audit(
            actor_id,
            ModerationKind::DeleteMessage,
            request.target_id,
            Some(message_id),
            scope,
            &request.reason,
        )
        .await?;

        self.sink
            .mark_message_deleted(message_id, room_id, actor_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => ModerationError::InvalidTarget,
                other => ModerationError::Persistence(other),
            })?;

        self.bus
            .publish_system(room_id, OutboundEvent::MessageDeleted { room_id, message_id })
            .await;
        Ok(())
    }

    /// Unmute or unban: one audit entry covers every lifted record. Rank
    /// validation is skipped; removing a restriction needs scope only.
    async fn lift_sanctions(
        &self,
        actor_id: i64,
        kind: SanctionKind,
        scope: Scope,
        request: &ModerationRequest,
    ) -> Result<(), ModerationError> {
        let target_id = request.target_id.ok_or(ModerationError::MissingField("target_id"))?;

        let active = self.sanctions.find_active(target_id, scope, kind);
        if active.is_empty() {
            return Err(ModerationError::InvalidTarget);
        }

        self.audit(actor_id, request.kind, Some(target_id), None, scope, &request.reason)
            .await?;

        for sanction_id in active {
            self.sanctions.lift(sanction_id, target_id, scope).await?;
        }

        self.broadcast_action(scope, request.kind, target_id, actor_id, &request.reason)
            .await;
        Ok(())
    }

    /// Verify the target exists, is not the actor, and does not outrank
    /// the actor.
    async fn validate_target(
        &self,
        actor_id: i64,
        actor_role: Role,
        target_id: i64,
    ) -> Result<(), ModerationError> {
        let target_role = self
            .identity
            .role_of(target_id)
            .await
            .map_err(|e| ModerationError::Internal(e.to_string()))?
            .ok_or(ModerationError::InvalidTarget)?;
        enforcement::validate_target(actor_id, actor_role, target_id, target_role)?;
        Ok(())
    }

    /// The fail-closed audit write: nothing becomes observable unless the
    /// entry landed.
    async fn audit(
        &self,
        actor_id: i64,
        kind: ModerationKind,
        target_id: Option<i64>,
        message_id: Option<i64>,
        scope: Scope,
        reason: &str,
    ) -> Result<(), ModerationError> {
        let entry = AuditEntry {
            id: self.ids.generate(),
            actor_id,
            kind,
            target_id,
            message_id,
            scope,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        };
        self.sink
            .store_audit_entry(&entry)
            .await
            .map_err(ModerationError::Persistence)?;

        tracing::info!(
            audit_id = entry.id,
            actor_id,
            kind = %kind,
            scope = %scope,
            "Moderation action recorded"
        );
        Ok(())
    }

    /// Announce the action as a system event: to the room for room scope,
    /// to every room the target is currently present in for global scope.
    async fn broadcast_action(
        &self,
        scope: Scope,
        kind: ModerationKind,
        target_id: i64,
        actor_id: i64,
        reason: &str,
    ) {
        let event = OutboundEvent::Moderation {
            room_id: scope.room_id(),
            kind,
            target_id,
            actor_id,
            reason: reason.to_string(),
        };
        match scope {
            Scope::Room(room_id) => self.bus.publish_system(room_id, event).await,
            Scope::Global => {
                for room_id in self.presence.rooms_of_user(target_id) {
                    self.bus.publish_system(room_id, event.clone()).await;
                }
            }
        }
    }
}
