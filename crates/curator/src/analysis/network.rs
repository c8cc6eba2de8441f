//! Neighborhood crawl and ranking
//!
//! Follows of the seed account are analyzed in fixed-size batches: accounts
//! inside a batch run concurrently, batches run one after another with a
//! pause in between to stay under the network's rate limits.

use super::activity::ActivityAnalyzer;
use super::follows::FollowsFetcher;
use super::scoring::score;
use futures::future::join_all;
use starterpack_common::bluesky::BlueskyApi;
use starterpack_common::config::AppConfig;
use starterpack_common::errors::{AppError, Result};
use starterpack_common::models::{AccountMetrics, ScoredAccount};
use starterpack_common::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Crawl pacing and result size
#[derive(Debug, Clone, Copy)]
pub struct CrawlSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub top_n: usize,
}

impl From<&AppConfig> for CrawlSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch_size: config.crawl.analysis_batch_size,
            batch_delay: config.crawl.batch_delay(),
            top_n: config.pack.top_n,
        }
    }
}

/// Produces the ranked accounts for a seed
pub struct NetworkAnalyzer {
    api: Arc<dyn BlueskyApi>,
    follows: FollowsFetcher,
    activity: ActivityAnalyzer,
    settings: CrawlSettings,
}

impl NetworkAnalyzer {
    pub fn new(api: Arc<dyn BlueskyApi>, config: &AppConfig) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            follows: FollowsFetcher::new(api.clone(), retry, config.crawl.follows_page_size),
            activity: ActivityAnalyzer::new(
                api.clone(),
                retry,
                config.crawl.feed_limit,
                config.crawl.max_posts_per_day,
            ),
            settings: CrawlSettings::from(config),
            api,
        }
    }

    /// Crawl, score and rank the accounts `seed` follows
    #[instrument(skip(self))]
    pub async fn analyze(&self, seed: &str) -> Result<Vec<ScoredAccount>> {
        if self.api.session().await.is_none() {
            return Err(AppError::NotInitialized);
        }

        let handles = self.follows.fetch_all(seed).await;
        info!(count = handles.len(), "Found follows");

        let metrics = self.collect_metrics(&handles).await;
        info!(
            analyzed = metrics.len(),
            dropped = handles.len() - metrics.len().min(handles.len()),
            "Analyzed accounts"
        );

        Ok(rank(metrics, self.settings.top_n))
    }

    /// Analyze `handles` batch by batch, keyed by handle in first-seen order
    async fn collect_metrics(&self, handles: &[String]) -> Vec<AccountMetrics> {
        let batch_size = self.settings.batch_size.max(1);
        let batch_count = handles.len().div_ceil(batch_size);

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut collected: Vec<AccountMetrics> = Vec::new();

        for (i, batch) in handles.chunks(batch_size).enumerate() {
            let results = join_all(batch.iter().map(|handle| self.activity.analyze(handle))).await;

            for (handle, result) in batch.iter().zip(results) {
                let Some(metrics) = result else { continue };
                match index.get(handle) {
                    Some(&slot) => collected[slot] = metrics,
                    None => {
                        index.insert(handle.clone(), collected.len());
                        collected.push(metrics);
                    }
                }
            }

            info!(batch = i + 1, batches = batch_count, "Processed batch");
            if i + 1 < batch_count {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        collected
    }
}

/// Score every account, order by score (stable) and keep the first `top_n`
pub fn rank(metrics: Vec<AccountMetrics>, top_n: usize) -> Vec<ScoredAccount> {
    let mut scored: Vec<ScoredAccount> = metrics.into_iter().map(score).collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_n);
    scored
}
