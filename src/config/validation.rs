use crate::config::types::{Config, CrawlerConfig, HeaderEntry, SeedEntry, UserAgentConfig};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Upper bound on the worker pool; more concurrent fetches than this is a typo
const MAX_WORKER_POOL_SIZE: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_request_headers(&config.request_headers)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if config.worker_pool_size < 1 || config.worker_pool_size > MAX_WORKER_POOL_SIZE {
        return Err(ConfigError::Validation(format!(
            "worker_pool_size must be between 1 and {}, got {}",
            MAX_WORKER_POOL_SIZE, config.worker_pool_size
        )));
    }

    if config.max_outstanding_tasks < config.worker_pool_size {
        return Err(ConfigError::Validation(format!(
            "max_outstanding_tasks ({}) must be at least worker_pool_size ({})",
            config.max_outstanding_tasks, config.worker_pool_size
        )));
    }

    for pattern in &config.allowed_hosts {
        validate_host_pattern(pattern)?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Header names must be usable on the wire
fn validate_request_headers(headers: &[HeaderEntry]) -> ConfigResult<()> {
    for header in headers {
        if header.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "request-header name cannot be blank".to_string(),
            ));
        }

        if reqwest::header::HeaderName::from_bytes(header.name.as_bytes()).is_err() {
            return Err(ConfigError::Validation(format!(
                "request-header name '{}' is not a valid HTTP header name",
                header.name
            )));
        }
    }
    Ok(())
}

/// Validates seed entries
fn validate_seeds(seeds: &[SeedEntry]) -> ConfigResult<()> {
    for seed in seeds {
        let url = Url::parse(&seed.uri).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed.uri, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use the http or https scheme",
                seed.uri
            )));
        }

        if seed.method.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Seed '{}' has an empty method",
                seed.uri
            )));
        }
    }

    Ok(())
}

/// Validates a host pattern (supports a leading "*." wildcard)
fn validate_host_pattern(pattern: &str) -> ConfigResult<()> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    let host = pattern.strip_prefix("*.").unwrap_or(pattern);

    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(format!(
            "Host pattern '{}' has no host after the wildcard",
            pattern
        )));
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> ConfigResult<()> {
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ConfigError::Validation(format!("Invalid email format: '{}'", email)))?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
