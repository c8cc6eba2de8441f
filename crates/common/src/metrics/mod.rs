//! Metrics and observability utilities
//!
//! Prometheus-style metrics for the refresh cycle, the crawl and the HTTP API,
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all starter pack metrics
pub const METRICS_PREFIX: &str = "starterpack";

/// Buckets for a full refresh cycle (in seconds). A cycle over a few thousand
/// follows takes minutes because of the inter-batch pacing.
pub const CYCLE_BUCKETS: &[f64] = &[
    1.0,
    10.0,
    30.0,
    60.0,
    120.0,
    300.0,
    600.0,
    1200.0,
    1800.0,
    3600.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Cycle metrics
    describe_counter!(
        format!("{}_cycles_total", METRICS_PREFIX),
        Unit::Count,
        "Refresh cycles by outcome"
    );

    describe_histogram!(
        format!("{}_cycle_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Refresh cycle duration in seconds"
    );

    describe_gauge!(
        format!("{}_ranked_accounts", METRICS_PREFIX),
        Unit::Count,
        "Accounts in the current ranking"
    );

    // Crawl metrics
    describe_counter!(
        format!("{}_accounts_analyzed_total", METRICS_PREFIX),
        Unit::Count,
        "Accounts analyzed, by status"
    );

    describe_counter!(
        format!("{}_retry_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Failed remote call attempts, by operation"
    );

    // List metrics
    describe_counter!(
        format!("{}_list_members_added_total", METRICS_PREFIX),
        Unit::Count,
        "Members appended to the curated list"
    );

    describe_counter!(
        format!("{}_list_member_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Members that could not be appended to the curated list"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record the end of a refresh cycle
pub fn record_cycle(duration_secs: f64, outcome: &str, ranked: Option<usize>) {
    counter!(
        format!("{}_cycles_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_cycle_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    if let Some(count) = ranked {
        gauge!(format!("{}_ranked_accounts", METRICS_PREFIX)).set(count as f64);
    }
}

/// Record one account analysis
pub fn record_account_analyzed(success: bool) {
    let status = if success { "success" } else { "dropped" };

    counter!(
        format!("{}_accounts_analyzed_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a failed attempt of a retried remote call
pub fn record_retry(operation: &str) {
    counter!(
        format!("{}_retry_attempts_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record the outcome of a list reconciliation
pub fn record_list_sync(added: usize, failed: usize) {
    counter!(format!("{}_list_members_added_total", METRICS_PREFIX)).increment(added as u64);
    counter!(format!("{}_list_member_failures_total", METRICS_PREFIX)).increment(failed as u64);
}
