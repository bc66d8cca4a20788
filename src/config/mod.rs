//! Configuration module for Spider-Discovery
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use spider_discovery::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.worker_pool_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Backpressure, Config, CrawlerConfig, HeaderEntry, SeedEntry, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
