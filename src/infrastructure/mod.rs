//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - PostgreSQL persistence sink, identity provider, and room directory
//! - In-memory variants used by the test suites
//! - Prometheus metrics

pub mod directory;
pub mod identity;
pub mod metrics;
pub mod persistence;

pub use directory::PgRoomDirectory;
pub use identity::JwtIdentityProvider;
pub use persistence::PgPersistenceSink;
