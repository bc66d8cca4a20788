//! Fetch collaborator
//!
//! The dispatch core only depends on the `Fetcher` trait. `HttpFetcher` is
//! the reqwest-backed implementation used by the binary and the integration
//! tests, including:
//! - Building HTTP clients with proper user agent strings
//! - Applying the record's method, headers and body
//! - Error classification (timeouts, connection failures, HTTP status)

use crate::config::UserAgentConfig;
use crate::discovery::{DiscoveryRecord, HeaderField};
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client, Method};
use std::time::Duration;

/// A request derived from an accepted discovery record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    pub uri: String,
    pub body: String,
    pub headers: Vec<HeaderField>,
}

impl FetchRequest {
    pub fn from_record(record: &DiscoveryRecord) -> Self {
        Self {
            method: record.method().to_ascii_uppercase(),
            uri: record.uri().to_string(),
            body: record.body().to_string(),
            headers: record.request_headers().to_vec(),
        }
    }
}

/// A successfully fetched response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Final URI after redirects
    pub uri: String,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value (empty if absent)
    pub content_type: String,
    /// Response body
    pub body: String,
}

/// Performs the fetch for a dispatched task
///
/// Implementations own their timeout and cancellation behavior; a timeout
/// is reported as `FetchError::Timeout` and only fails that one task.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use spider_discovery::config::UserAgentConfig;
/// use spider_discovery::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SpiderDiscovery".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Format: CrawlerName/Version (+ContactURL; ContactEmail)
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| FetchError::InvalidMethod(request.method.clone()))?;

        let mut builder = self.client.request(method, &request.uri);

        let mut has_content_type = false;
        for field in &request.headers {
            has_content_type |= field.name.eq_ignore_ascii_case(header::CONTENT_TYPE.as_str());
            builder = builder.header(field.name.as_str(), field.value.as_str());
        }

        if !request.body.is_empty() {
            if !has_content_type {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            }
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&request.uri, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                uri: request.uri.clone(),
                status: status.as_u16(),
            });
        }

        let uri = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(&request.uri, e))?;

        Ok(FetchResponse {
            uri,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(uri: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            uri: uri.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Connect {
            uri: uri.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Transport {
            uri: uri.to_string(),
            message: error.to_string(),
        }
    }
}
