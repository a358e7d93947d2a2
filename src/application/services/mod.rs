//! Application services orchestrating the chat and moderation flows.

pub mod chat_service;
pub mod moderation_service;
pub mod notification_service;

pub use chat_service::{ChatError, ChatService, SendOutcome};
pub use moderation_service::{ModerationError, ModerationRequest, ModerationService};
pub use notification_service::NotificationDispatcher;
