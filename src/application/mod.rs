//! # Application Layer
//!
//! Stateful coordination between the domain rules and the outside world:
//! the presence store, the broadcast bus, the sanction store, the
//! enforcement filter, and the services driving the chat and moderation
//! flows.

pub mod bus;
pub mod events;
pub mod filter;
pub mod presence;
pub mod sanctions;
pub mod services;

pub use bus::RoomBus;
pub use events::{CloseReason, OutboundEvent, SessionControl};
pub use filter::EnforcementFilter;
pub use presence::{PresenceStore, SessionHandle};
pub use sanctions::{SanctionError, SanctionStore};
pub use services::{
    ChatError, ChatService, ModerationError, ModerationRequest, ModerationService,
    NotificationDispatcher, SendOutcome,
};
