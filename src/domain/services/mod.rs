//! Domain services for enforcement and authorization rules.

pub mod enforcement;

pub use enforcement::{ActionKind, AuthzError, DenyReason};
