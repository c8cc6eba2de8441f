//! Configuration management for the starter pack services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Legacy `BLUESKY_USERNAME` / `BLUESKY_PASSWORD` credentials
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Bluesky connection and credentials
    #[serde(default)]
    pub bluesky: BlueskyConfig,

    /// Seed account and published list metadata
    #[serde(default)]
    pub pack: PackConfig,

    /// Crawl batching and pacing
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Retry policy for remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Refresh schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration for the HTTP API
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlueskyConfig {
    /// PDS / entryway base URL
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Login identifier of the controlling account (handle or email)
    #[serde(default)]
    pub identifier: String,

    /// App password of the controlling account
    #[serde(default, skip_serializing)]
    pub password: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_bluesky_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackConfig {
    /// Account whose follows form the analyzed neighborhood
    #[serde(default = "default_seed_handle")]
    pub seed_handle: String,

    /// Starter pack name shown by the API and HTML view
    #[serde(default = "default_pack_name")]
    pub name: String,

    /// Starter pack description shown by the API and HTML view
    #[serde(default = "default_pack_description")]
    pub description: String,

    /// Name of the curated list on the network
    #[serde(default = "default_list_name")]
    pub list_name: String,

    /// Description of the curated list on the network
    #[serde(default = "default_list_description")]
    pub list_description: String,

    /// Number of accounts kept in the ranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    /// Page size for follow and list-member pagination
    #[serde(default = "default_follows_page_size")]
    pub follows_page_size: u32,

    /// Number of recent feed items fetched per account
    #[serde(default = "default_feed_limit")]
    pub feed_limit: u32,

    /// Accounts analyzed concurrently per batch
    #[serde(default = "default_analysis_batch_size")]
    pub analysis_batch_size: usize,

    /// Accounts reconciled into the list per batch
    #[serde(default = "default_list_batch_size")]
    pub list_batch_size: usize,

    /// Pause between batches in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Upper bound for the posting rate (posts per day)
    #[serde(default = "default_max_posts_per_day")]
    pub max_posts_per_day: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts per remote call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds, multiplied by the attempt number
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Run the scheduled refresh at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Six-field cron expression (with seconds), evaluated in UTC
    #[serde(default = "default_cron")]
    pub cron: String,

    /// Run one refresh immediately at startup
    #[serde(default = "default_enabled")]
    pub run_on_startup: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name reported in the startup and shutdown logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second across the API
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_service_url() -> String { "https://bsky.social".to_string() }
fn default_bluesky_timeout() -> u64 { 30 }
fn default_seed_handle() -> String { "antfu.me".to_string() }
fn default_pack_name() -> String { "Top Tech Voices from @antfu.me Network".to_string() }
fn default_pack_description() -> String {
    "Top 150 most active and influential users followed by @antfu.me".to_string()
}
fn default_list_name() -> String { "Top Tech Voices".to_string() }
fn default_list_description() -> String {
    "Top 150 most active and influential tech voices from @antfu.me network, automatically curated."
        .to_string()
}
fn default_top_n() -> usize { 150 }
fn default_follows_page_size() -> u32 { 100 }
fn default_feed_limit() -> u32 { 50 }
fn default_analysis_batch_size() -> usize { 5 }
fn default_list_batch_size() -> usize { 10 }
fn default_batch_delay_ms() -> u64 { 1000 }
fn default_max_posts_per_day() -> f64 { 50.0 }
fn default_max_attempts() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 1000 }
fn default_cron() -> String { "0 0 2 * * *".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "starterpack-curator".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__PACK__SEED_HANDLE=example.com
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
            )

            // Credentials under their historical names win over everything else
            .set_override_option("bluesky.identifier", std::env::var("BLUESKY_USERNAME").ok())?
            .set_override_option("bluesky.password", std::env::var("BLUESKY_PASSWORD").ok())?

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// True when credentials for the controlling account were supplied
    pub fn has_credentials(&self) -> bool {
        !self.bluesky.identifier.is_empty() && !self.bluesky.password.is_empty()
    }
}

impl CrawlConfig {
    /// Pause between batches as Duration
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl RetryConfig {
    /// Base retry delay as Duration
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            identifier: String::new(),
            password: String::new(),
            timeout_secs: default_bluesky_timeout(),
        }
    }
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            seed_handle: default_seed_handle(),
            name: default_pack_name(),
            description: default_pack_description(),
            list_name: default_list_name(),
            list_description: default_list_description(),
            top_n: default_top_n(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            follows_page_size: default_follows_page_size(),
            feed_limit: default_feed_limit(),
            analysis_batch_size: default_analysis_batch_size(),
            list_batch_size: default_list_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            max_posts_per_day: default_max_posts_per_day(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cron: default_cron(),
            run_on_startup: default_enabled(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            bluesky: BlueskyConfig::default(),
            pack: PackConfig::default(),
            crawl: CrawlConfig::default(),
            retry: RetryConfig::default(),
            schedule: ScheduleConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
