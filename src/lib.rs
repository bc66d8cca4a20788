//! Spider-Discovery: resource discovery and crawl-task deduplication
//!
//! This crate implements the core of a crawler's discovery pipeline: immutable
//! descriptions of resources found while parsing fetched pages, a canonicalizer
//! that derives order-insensitive identities from them, a visited set that
//! guarantees at-most-once scheduling, and a bounded dispatcher that fetches
//! accepted resources and feeds newly found ones back into the controller.

pub mod config;
pub mod crawler;
pub mod discovery;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Spider-Discovery operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

/// Reasons the dispatcher refuses a task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatcher has been shut down")]
    ShutDown,

    #[error("maximum of {limit} outstanding tasks reached")]
    QueueFull { limit: usize },

    #[error("record for {uri} is marked as ignored")]
    Ignored { uri: String },
}

/// Failures reported by a fetch collaborator
///
/// These are data-level failures: they are recorded against the task that
/// produced them and never abort the crawl.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout for {uri}")]
    Timeout { uri: String },

    #[error("Connection failed for {uri}: {message}")]
    Connect { uri: String, message: String },

    #[error("HTTP {status} for {uri}")]
    Status { uri: String, status: u16 },

    #[error("Invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    #[error("Transport error for {uri}: {message}")]
    Transport { uri: String, message: String },

    #[error("Task cancelled before fetching {uri}")]
    Cancelled { uri: String },
}

/// Result type alias for Spider-Discovery operations
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, crawl_until, CrawlController, CrawlStats, TaskDispatcher, VisitedSet};
pub use discovery::{canonicalize, CanonicalKey, DiscoveryListener, DiscoveryRecord, HeaderField};
pub use state::{RecordState, TaskStatus};
