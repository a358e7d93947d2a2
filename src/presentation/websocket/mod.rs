//! WebSocket Gateway
//!
//! Real-time communication via WebSocket connections.

pub mod frames;
pub mod handler;
pub mod session;

pub use frames::{ClientFrame, ServerFrame};
pub use handler::ws_handler;
pub use session::{SessionPhase, SessionState};
