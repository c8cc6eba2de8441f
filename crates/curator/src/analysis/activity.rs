//! Per-account activity metrics
//!
//! Combines an account's profile counters with a sample of its latest posts:
//! - posting rate over the sampled window (posts per day, capped)
//! - mean interactions per sampled post
//! - last activity time

use chrono::{DateTime, Utc};
use starterpack_common::bluesky::{BlueskyApi, FeedItem, ProfileView};
use starterpack_common::errors::Result;
use starterpack_common::metrics;
use starterpack_common::models::AccountMetrics;
use starterpack_common::retry::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, error, instrument};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Builds [`AccountMetrics`] for single accounts
pub struct ActivityAnalyzer {
    api: Arc<dyn BlueskyApi>,
    retry: RetryPolicy,
    feed_limit: u32,
    max_posts_per_day: f64,
}

impl ActivityAnalyzer {
    pub fn new(
        api: Arc<dyn BlueskyApi>,
        retry: RetryPolicy,
        feed_limit: u32,
        max_posts_per_day: f64,
    ) -> Self {
        Self {
            api,
            retry,
            feed_limit,
            max_posts_per_day,
        }
    }

    /// Metrics for `handle`, or `None` when the account could not be fetched
    #[instrument(skip(self))]
    pub async fn analyze(&self, handle: &str) -> Option<AccountMetrics> {
        match self.fetch(handle).await {
            Ok(account) => {
                metrics::record_account_analyzed(true);
                Some(account)
            }
            Err(e) => {
                error!(handle = handle, error = %e, "Error analyzing account");
                metrics::record_account_analyzed(false);
                None
            }
        }
    }

    async fn fetch(&self, handle: &str) -> Result<AccountMetrics> {
        let (profile, feed) = futures::try_join!(
            self.retry
                .run("app.bsky.actor.getProfile", || self.api.get_profile(handle)),
            self.retry.run("app.bsky.feed.getAuthorFeed", || {
                self.api.get_author_feed(handle, self.feed_limit)
            }),
        )?;

        let account = build_metrics(
            handle,
            profile,
            &feed.feed,
            self.max_posts_per_day,
            Utc::now(),
        );
        debug!(
            handle = handle,
            followers = account.follower_count,
            posting_rate = account.posting_rate,
            "Analyzed account"
        );
        Ok(account)
    }
}

/// Assemble metrics from fetched data; missing fields fall back to neutral values
pub fn build_metrics(
    handle: &str,
    profile: ProfileView,
    feed: &[FeedItem],
    max_posts_per_day: f64,
    now: DateTime<Utc>,
) -> AccountMetrics {
    let timestamps = post_timestamps(feed);

    AccountMetrics {
        handle: if profile.handle.is_empty() {
            handle.to_string()
        } else {
            profile.handle
        },
        display_name: profile
            .display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| handle.to_string()),
        description: profile.description.unwrap_or_default(),
        follower_count: profile.followers_count,
        following_count: profile.follows_count,
        post_count: profile.posts_count,
        posting_rate: posting_rate(&timestamps, max_posts_per_day),
        average_engagement: average_engagement(feed),
        last_active: timestamps.iter().max().copied().unwrap_or(now),
    }
}

/// Parseable `indexedAt` timestamps of the feed; the rest are dropped
pub fn post_timestamps(feed: &[FeedItem]) -> Vec<DateTime<Utc>> {
    feed.iter()
        .filter_map(|item| DateTime::parse_from_rfc3339(&item.post.indexed_at).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .collect()
}

/// Posts per day between the oldest and newest timestamp.
///
/// The elapsed window is at least one day and the result never exceeds `cap`.
pub fn posting_rate(timestamps: &[DateTime<Utc>], cap: f64) -> f64 {
    let (newest, oldest) = match (timestamps.iter().max(), timestamps.iter().min()) {
        (Some(newest), Some(oldest)) => (newest, oldest),
        _ => return 0.0,
    };
    if timestamps.len() == 1 {
        return 1.0_f64.min(cap);
    }

    let elapsed_days = (*newest - *oldest).num_seconds() as f64 / SECONDS_PER_DAY;
    let rate = timestamps.len() as f64 / elapsed_days.max(1.0);
    round2(rate.min(cap))
}

/// Mean likes + reposts + replies per post; 0 for an empty feed
pub fn average_engagement(feed: &[FeedItem]) -> f64 {
    if feed.is_empty() {
        return 0.0;
    }
    let total = feed
        .iter()
        .fold(0u64, |acc, item| acc.saturating_add(item.post.interactions()));
    round2(total as f64 / feed.len() as f64)
}

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{feed_item, profile, FakeBluesky};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn at(hours_ago: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::hours(hours_ago)
    }

    #[test]
    fn test_posting_rate_empty() {
        assert_eq!(posting_rate(&[], 50.0), 0.0);
    }

    #[test]
    fn test_posting_rate_single_post() {
        assert_eq!(posting_rate(&[Utc::now()], 50.0), 1.0);
    }

    #[test]
    fn test_posting_rate_uses_one_day_minimum() {
        let now = Utc::now();
        let timestamps: Vec<_> = (0..6).map(|h| at(h, now)).collect();
        assert_eq!(posting_rate(&timestamps, 50.0), 6.0);
    }

    #[test]
    fn test_posting_rate_over_several_days() {
        let now = Utc::now();
        let timestamps = vec![now, at(24, now), at(48, now), at(96, now)];
        // 4 posts over 4 days
        assert_eq!(posting_rate(&timestamps, 50.0), 1.0);
    }

    #[test]
    fn test_posting_rate_is_capped() {
        let now = Utc::now();
        let timestamps: Vec<_> = (0..1000)
            .map(|i| now - ChronoDuration::seconds(i * 3))
            .collect();
        assert_eq!(posting_rate(&timestamps, 50.0), 50.0);
    }

    #[test]
    fn test_posting_rate_ignores_order() {
        let now = Utc::now();
        let timestamps = vec![at(48, now), now, at(24, now)];
        assert_eq!(posting_rate(&timestamps, 50.0), 1.5);
    }

    #[test]
    fn test_average_engagement() {
        let feed = vec![
            feed_item(&Utc::now().to_rfc3339(), 3, 1, 1),
            feed_item(&Utc::now().to_rfc3339(), 0, 0, 0),
            feed_item(&Utc::now().to_rfc3339(), 1, 0, 0),
        ];
        assert_eq!(average_engagement(&feed), 2.0);
        assert_eq!(average_engagement(&[]), 0.0);
    }

    #[test]
    fn test_average_engagement_rounds() {
        let feed = vec![
            feed_item("", 1, 0, 0),
            feed_item("", 0, 0, 0),
            feed_item("", 0, 0, 0),
        ];
        assert_eq!(average_engagement(&feed), 0.33);
    }

    #[test]
    fn test_average_engagement_with_huge_counters() {
        let mut huge = feed_item("", 0, 0, 0);
        huge.post.like_count = u64::MAX;
        huge.post.repost_count = 1;
        let feed = vec![huge.clone(), huge, feed_item("", 5, 0, 0)];

        let average = average_engagement(&feed);

        assert!(average.is_finite());
        assert_eq!(average, round2(u64::MAX as f64 / 3.0));
    }

    #[test]
    fn test_unparseable_timestamps_are_discarded() {
        let feed = vec![
            feed_item("not a date", 0, 0, 0),
            feed_item("2024-05-01T10:00:00.000Z", 0, 0, 0),
            feed_item("", 0, 0, 0),
        ];
        assert_eq!(post_timestamps(&feed).len(), 1);
    }

    #[test]
    fn test_build_metrics_defaults() {
        let now = Utc::now();
        let bare = ProfileView {
            did: "did:plc:bare".into(),
            handle: "bare.dev".into(),
            ..Default::default()
        };

        let metrics = build_metrics("bare.dev", bare, &[], 50.0, now);

        assert_eq!(metrics.display_name, "bare.dev");
        assert_eq!(metrics.description, "");
        assert_eq!(metrics.follower_count, 0);
        assert_eq!(metrics.posting_rate, 0.0);
        assert_eq!(metrics.average_engagement, 0.0);
        assert_eq!(metrics.last_active, now);
    }

    #[test]
    fn test_last_active_is_newest_post() {
        let feed = vec![
            feed_item("2024-05-01T10:00:00Z", 0, 0, 0),
            feed_item("2024-05-03T10:00:00Z", 0, 0, 0),
            feed_item("2024-05-02T10:00:00Z", 0, 0, 0),
        ];

        let metrics = build_metrics("a.dev", profile("a.dev", 1), &feed, 50.0, Utc::now());

        assert_eq!(metrics.last_active.to_rfc3339(), "2024-05-03T10:00:00+00:00");
    }

    #[tokio::test]
    async fn test_analyze_returns_none_on_failure() {
        let api = Arc::new(FakeBluesky::new().with_failing_profile("broken.dev"));
        let analyzer = ActivityAnalyzer::new(api, RetryPolicy::new(2, Duration::ZERO), 50, 50.0);

        assert!(analyzer.analyze("broken.dev").await.is_none());
    }

    #[tokio::test]
    async fn test_analyze_uses_profile_and_feed() {
        let api = Arc::new(FakeBluesky::new().with_account("a.dev", 999, 1.0));
        let analyzer = ActivityAnalyzer::new(api, RetryPolicy::new(2, Duration::ZERO), 50, 50.0);

        let metrics = analyzer.analyze("a.dev").await.unwrap();

        assert_eq!(metrics.handle, "a.dev");
        assert_eq!(metrics.follower_count, 999);
        assert_eq!(metrics.posting_rate, 1.0);
        assert_eq!(metrics.average_engagement, 0.0);
    }
}
