//! WebSocket Session Management

use crate::domain::entities::Identity;

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Socket open, waiting for the auth frame
    Connecting,
    /// Identity resolved, not yet registered
    Authenticated,
    /// Registered and serving traffic
    Active,
    /// Tearing down; inbound frames are ignored
    Closing,
    Closed,
}

/// WebSocket session state
#[derive(Debug)]
pub struct SessionState {
    pub session_id: String,
    pub phase: SessionPhase,
    pub identity: Option<Identity>,
}

impl SessionState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            phase: SessionPhase::Connecting,
            identity: None,
        }
    }

    /// Record the resolved identity; only valid from `Connecting`.
    pub fn authenticate(&mut self, identity: Identity) {
        debug_assert_eq!(self.phase, SessionPhase::Connecting);
        self.identity = Some(identity);
        self.phase = SessionPhase::Authenticated;
    }

    /// Enter the serving phase after registration and the ready frame.
    pub fn activate(&mut self) {
        debug_assert_eq!(self.phase, SessionPhase::Authenticated);
        self.phase = SessionPhase::Active;
    }

    pub fn begin_close(&mut self) {
        self.phase = SessionPhase::Closing;
    }

    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn user_id(&self) -> Option<i64> {
        self.identity.as_ref().map(|i| i.user_id)
    }
}
