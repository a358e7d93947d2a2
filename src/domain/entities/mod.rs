//! # Domain Entities
//!
//! Core domain entities for the chat and moderation pipeline.
//!
//! ## Core Entities
//!
//! - **User / Identity**: identity and role as resolved at handshake
//! - **Room**: a chat room with membership and moderator sets
//! - **Message**: a text message with a per-room sequence number
//! - **Sanction**: a standing mute/ban or one-shot kick, global or room-scoped
//! - **AuditEntry**: immutable record of an accepted moderation action
//! - **Notification**: mention/reply/invite/warning computed by the dispatcher
//!
//! ## Collaborator Traits
//!
//! The identity provider and room directory traits are defined next to the
//! entities they resolve, following the dependency inversion principle;
//! implementations live in the infrastructure layer.

mod audit;
mod message;
mod notification;
mod room;
mod sanction;
mod user;

pub use audit::{AuditEntry, ModerationKind};
pub use message::{Message, MAX_BODY_LENGTH, REDACTED_BODY};
pub use notification::{Notification, NotificationKind};
pub use room::{Room, RoomDirectory, Visibility};
pub use sanction::{Sanction, SanctionKind, SanctionStatus, Scope};
pub use user::{Identity, IdentityProvider, Role, User};
