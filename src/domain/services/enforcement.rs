//! Moderation enforcement rules.
//!
//! Pure decision logic: standing-sanction resolution for inbound events and
//! authorization-scope checks for issuing moderation actions. The stateful
//! filter wrapping the sanction store lives in the application layer.

use crate::domain::entities::{Role, SanctionStatus, Scope};

/// Inbound action kinds subject to enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Send,
    Typing,
    Join,
}

/// Denial reason returned to the originating session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("you are banned")]
    Banned,

    #[error("you are banned from this room")]
    BannedRoom,

    #[error("you are muted")]
    Muted,

    #[error("you were kicked from this room")]
    Kicked,

    #[error("rate limited")]
    RateLimited,
}

impl DenyReason {
    /// Wire-level reason string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Banned => "banned",
            Self::BannedRoom => "banned-room",
            Self::Muted => "muted",
            Self::Kicked => "kicked",
            Self::RateLimited => "rate-limited",
        }
    }

    /// A global ban denial forces the session into `Closing`.
    pub fn closes_session(&self) -> bool {
        matches!(self, Self::Banned)
    }
}

/// Resolve standing sanction state against an inbound action.
///
/// Resolution order: global ban, room ban, mute (send only), kick re-join
/// block (join only). Typing and read actions stay permitted while muted.
/// The slot after the mute check is reserved for an inbound-flood guard;
/// no policy is attached yet.
pub fn resolve(
    global: SanctionStatus,
    room: SanctionStatus,
    rejoin_blocked: bool,
    action: ActionKind,
) -> Result<(), DenyReason> {
    if global == SanctionStatus::Banned {
        return Err(DenyReason::Banned);
    }
    if room == SanctionStatus::Banned {
        return Err(DenyReason::BannedRoom);
    }
    if action == ActionKind::Send
        && (global == SanctionStatus::Muted || room == SanctionStatus::Muted)
    {
        return Err(DenyReason::Muted);
    }
    if action == ActionKind::Join && rejoin_blocked {
        return Err(DenyReason::Kicked);
    }
    Ok(())
}

/// Failure modes when issuing a moderation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// The issuer's scope does not dominate the requested scope.
    #[error("insufficient scope for this action")]
    AuthorizationDenied,

    /// Self-sanction, or the target outranks the issuer.
    #[error("invalid sanction target")]
    InvalidTarget,
}

/// Check that the issuer's scope dominates the requested scope.
///
/// Global scope requires a staff or superuser role. Room scope requires
/// the room's creator, a promoted room moderator, or a global moderator.
pub fn authorize_scope(
    issuer_role: Role,
    is_room_moderator: bool,
    scope: &Scope,
) -> Result<(), AuthzError> {
    let allowed = match scope {
        Scope::Global => issuer_role.is_global_moderator(),
        Scope::Room(_) => is_room_moderator || issuer_role.is_global_moderator(),
    };
    if allowed {
        Ok(())
    } else {
        Err(AuthzError::AuthorizationDenied)
    }
}

/// Reject self-sanctions and targets that outrank the issuer.
pub fn validate_target(
    issuer_id: i64,
    issuer_role: Role,
    target_id: i64,
    target_role: Role,
) -> Result<(), AuthzError> {
    if target_id == issuer_id || target_role > issuer_role {
        return Err(AuthzError::InvalidTarget);
    }
    Ok(())
}
