//! Starter Pack Common Library
//!
//! Shared code for the starter pack services including:
//! - Bluesky XRPC client abstraction
//! - Ranking data model
//! - Error types and handling
//! - Configuration management
//! - Retry policy for remote calls
//! - Metrics and observability

pub mod bluesky;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod retry;

// Re-export commonly used types
pub use bluesky::BlueskyApi;
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{AccountMetrics, ScoredAccount, Snapshot};
pub use retry::RetryPolicy;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
