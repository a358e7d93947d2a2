//! # Room Chat Server Library
//!
//! This crate provides a room-based real-time chat server with:
//! - WebSocket gateway for real-time communication
//! - Layered moderation enforcement (mutes, bans, kicks, warnings)
//! - Per-room total message ordering
//! - Append-only moderation audit log
//! - PostgreSQL for durable records
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core entities, enforcement rules, and collaborator traits
//! - **Application Layer**: Presence, broadcast bus, sanctions, and service flows
//! - **Infrastructure Layer**: Database-backed implementations and metrics
//! - **Presentation Layer**: WebSocket gateway and HTTP probes
//!
//! ## Module Structure
//!
//! ```text
//! roomchat/
//! +-- config/        Configuration management
//! +-- domain/        Domain entities, enforcement rules, and traits
//! +-- application/   Presence, broadcast bus, sanction store, services
//! +-- infrastructure/ Database implementations and metrics
//! +-- presentation/  WebSocket gateway and HTTP probes
//! +-- shared/        Common utilities (errors, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Stateful coordination and services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - WebSocket gateway and HTTP probes
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
