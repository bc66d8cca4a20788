use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses and validates a configuration file
///
/// # Errors
///
/// * `ConfigError::Io` - The file could not be read
/// * `ConfigError::Parse` - The file is not valid TOML for a `Config`
/// * `ConfigError::Validation` / `InvalidUrl` / `InvalidPattern` - A value is out of range
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use spider_discovery::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Workers: {}", config.crawler.worker_pool_size);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    parse_config(&std::fs::read_to_string(path)?)
}

/// Hex-encoded SHA-256 of the configuration file content
///
/// Logged at startup so a crawl run can be tied to the exact configuration it used.
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    Ok(hash_content(&std::fs::read_to_string(path)?))
}

/// Loads a configuration together with the hash of the exact bytes parsed
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

fn parse_config(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
