//! Network analysis pipeline
//!
//! - `follows`: paginate the seed account's follow graph
//! - `activity`: per-account posting and engagement metrics
//! - `scoring`: composite score from the metrics
//! - `network`: batched crawl and ranking

pub mod activity;
pub mod follows;
pub mod network;
pub mod scoring;

pub use activity::ActivityAnalyzer;
pub use follows::FollowsFetcher;
pub use network::{rank, NetworkAnalyzer};
pub use scoring::score;
