use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Orgsweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub listing: ListingConfig,
    #[serde(default)]
    pub details: Option<DetailsConfig>,
}

/// Pacing and request settings shared by every job
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Pause between completed units (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log a progress line every N units
    #[serde(rename = "progress-interval", default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl CrawlerConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            politeness_delay_ms: default_politeness_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            progress_interval: default_progress_interval(),
        }
    }
}

/// Retry budget and backoff schedule
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Fetch attempts per unit for transient and permanent HTTP failures
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait after the n-th failed attempt; the last entry repeats
    #[serde(rename = "backoff-ms", default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,

    /// Fixed wait after a rate-limited response
    #[serde(rename = "rate-limit-wait-ms", default = "default_rate_limit_wait_ms")]
    pub rate_limit_wait_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            rate_limit_wait_ms: default_rate_limit_wait_ms(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Tabular output backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Listing crawl: one unit per catalog page
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Catalog index URL, without the page parameter
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Query parameter carrying the page number
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    #[serde(rename = "first-page", default)]
    pub first_page: u64,

    #[serde(rename = "last-page")]
    pub last_page: u64,

    /// Output file (CSV file or SQLite database)
    pub output: String,

    /// Checkpoint file
    pub checkpoint: String,
}

/// Detail crawl: one unit per row of the listing output
#[derive(Debug, Clone, Deserialize)]
pub struct DetailsConfig {
    pub output: String,
    pub checkpoint: String,
}

fn default_politeness_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_progress_interval() -> u64 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> Vec<u64> {
    vec![30_000, 60_000, 180_000]
}

fn default_rate_limit_wait_ms() -> u64 {
    30_000
}

fn default_page_param() -> String {
    "p".to_string()
}
