//! # Domain Layer
//!
//! The domain layer contains the core business logic of the chat and
//! moderation pipeline. It is independent of any external frameworks or
//! infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (User, Room, Message, Sanction, ...)
//! - **services**: Pure enforcement and authorization rules
//! - **persistence**: The write-only sink trait for durable records
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Collaborator traits define external-interface contracts
//! - Entities reference each other by snowflake ID, never by ownership

pub mod entities;
pub mod persistence;
pub mod services;

pub use entities::*;
pub use persistence::PersistenceSink;
