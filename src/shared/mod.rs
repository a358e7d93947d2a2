//! Shared utilities used across all layers.

pub mod error;
pub mod snowflake;

pub use error::AppError;
pub use snowflake::SnowflakeGenerator;
