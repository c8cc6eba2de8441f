//! Follow-graph pagination

use starterpack_common::bluesky::BlueskyApi;
use starterpack_common::errors::Result;
use starterpack_common::retry::RetryPolicy;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Collects every account a seed account follows
pub struct FollowsFetcher {
    api: Arc<dyn BlueskyApi>,
    retry: RetryPolicy,
    page_size: u32,
}

impl FollowsFetcher {
    pub fn new(api: Arc<dyn BlueskyApi>, retry: RetryPolicy, page_size: u32) -> Self {
        Self {
            api,
            retry,
            page_size,
        }
    }

    /// Handles followed by `seed`, deduplicated in first-seen order.
    ///
    /// Returns an empty list when a page still fails after retries.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self, seed: &str) -> Vec<String> {
        match self.paginate(seed).await {
            Ok(handles) => handles,
            Err(e) => {
                error!(seed = seed, error = %e, "Error fetching follows");
                Vec::new()
            }
        }
    }

    async fn paginate(&self, seed: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut handles = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .retry
                .run("app.bsky.graph.getFollows", || {
                    self.api.get_follows(seed, self.page_size, cursor.as_deref())
                })
                .await?;

            debug!(count = page.follows.len(), "Fetched follows page");
            for follow in page.follows {
                if seen.insert(follow.handle.clone()) {
                    handles.push(follow.handle);
                }
            }

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(handles)
    }
}
