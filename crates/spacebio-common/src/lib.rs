//! spacebio-common — shared building blocks for the ingestion pipeline.
//! - Environment-driven configuration
//! - Retry policy for remote calls
//! - Text helpers (sanitize, truncate, durations)

pub mod config;
pub mod retry;
pub mod text;

pub use config::{Config, ConfigError};
pub use retry::RetryPolicy;
