//! Ranking data model shared by the curator and its API
//!
//! All values are built once per refresh cycle and never mutated afterwards;
//! a new cycle produces new values and replaces the snapshot wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engagement statistics of one account, derived once per cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetrics {
    pub handle: String,
    pub display_name: String,
    pub description: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    /// Posts per day over the sampled feed window
    pub posting_rate: f64,
    /// Mean likes + reposts + replies per sampled post
    pub average_engagement: f64,
    pub last_active: DateTime<Utc>,
}

/// Account metrics together with the derived scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredAccount {
    #[serde(flatten)]
    pub metrics: AccountMetrics,
    pub follower_score: f64,
    pub posting_score: f64,
    pub engagement_score: f64,
    /// Weighted composite used for ranking
    pub score: f64,
}

impl ScoredAccount {
    pub fn handle(&self) -> &str {
        &self.metrics.handle
    }
}

/// The published ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub name: String,
    pub description: String,
    pub last_updated: DateTime<Utc>,
    /// Sorted by score, highest first
    pub users: Vec<ScoredAccount>,
}
