use crate::discovery::HeaderField;
use serde::Deserialize;

/// Main configuration structure for Spider-Discovery
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    /// Additional headers attached to every seed and discovered resource
    #[serde(default, rename = "request-header")]
    pub request_headers: Vec<HeaderEntry>,
    #[serde(default, rename = "seed")]
    pub seeds: Vec<SeedEntry>,
}

impl Config {
    /// The configured additional headers as record header fields
    pub fn request_header_fields(&self) -> Vec<HeaderField> {
        self.request_headers
            .iter()
            .map(|h| HeaderField::new(h.name.as_str(), h.value.as_str()))
            .collect()
    }
}

/// Crawler behavior configuration
///
/// Every limit the dispatch core enforces comes from here; the core itself
/// has no built-in defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from seed resources
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of tasks queued or running at once
    #[serde(rename = "max-outstanding-tasks")]
    pub max_outstanding_tasks: usize,

    /// Number of fetches allowed to run concurrently
    #[serde(rename = "worker-pool-size")]
    pub worker_pool_size: usize,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(rename = "politeness-delay")]
    pub politeness_delay_ms: u64,

    /// What `submit` does once `max-outstanding-tasks` is reached
    #[serde(default)]
    pub backpressure: Backpressure,

    /// Host patterns (e.g. "example.com" or "*.example.com") a resource must
    /// match to be fetched; empty allows every host
    #[serde(default, rename = "allowed-hosts")]
    pub allowed_hosts: Vec<String>,
}

/// Submission policy when the dispatcher is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backpressure {
    /// Wait for an outstanding task to finish
    #[default]
    Block,
    /// Fail the submission immediately
    Reject,
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

/// An additional request header
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// A resource the crawl starts from
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub uri: String,

    #[serde(default = "default_seed_method")]
    pub method: String,

    #[serde(default)]
    pub body: String,
}

fn default_seed_method() -> String {
    "GET".to_string()
}
