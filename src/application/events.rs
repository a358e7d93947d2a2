//! Events flowing from the broadcast bus and dispatcher to live sessions.
//!
//! These are the internal vocabulary; the presentation layer converts them
//! to wire frames.

use crate::domain::entities::{Message, ModerationKind, Notification};

/// An event delivered to a session's outbound queue.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
    /// Handshake acknowledgement with the auto-subscribed room set
    Ready {
        session_id: String,
        user_id: i64,
        rooms: Vec<i64>,
    },

    /// An accepted, sequenced room message
    Message(Message),

    /// A moderation deletion; prior readers keep the sequence number
    MessageDeleted { room_id: i64, message_id: i64 },

    /// Typing indicator, best-effort and unsequenced
    Typing {
        room_id: i64,
        user_id: i64,
        is_typing: bool,
    },

    /// Online/offline transition, best-effort
    Presence {
        room_id: i64,
        user_id: i64,
        online: bool,
    },

    /// A notification for this session's user
    Notification(Notification),

    /// A moderation action broadcast as a system event
    Moderation {
        room_id: Option<i64>,
        kind: ModerationKind,
        target_id: i64,
        actor_id: i64,
        reason: String,
    },

    /// An error or denial frame addressed to one session
    Error { code: String, message: String },
}

impl OutboundEvent {
    /// Critical events queue with backpressure and are never dropped while
    /// the session is connected; the rest are lossy.
    pub fn is_critical(&self) -> bool {
        !matches!(self, Self::Typing { .. } | Self::Presence { .. })
    }
}

/// Reason a session is being force-closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Kicked,
    Banned,
}

impl CloseReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Kicked => "kicked",
            Self::Banned => "banned",
        }
    }
}

/// Control signals addressed to a session's event loop.
#[derive(Debug, Clone)]
pub enum SessionControl {
    /// Begin `Closing` immediately; the reason is surfaced as a final
    /// error frame before the socket closes.
    ForceClose { reason: CloseReason, message: String },
}
