//! Discovery records and their builder
//!
//! A `DiscoveryRecord` describes one candidate resource found while parsing a
//! fetched response. Records are immutable once built; parsers produce them
//! through `DiscoveryRecordBuilder`, either from scratch or seeded from a
//! template record.

use crate::crawler::FetchResponse;
use crate::{Result, SpiderError};
use std::fmt;
use std::sync::Arc;

/// Default method for new records
pub const DEFAULT_METHOD: &str = "GET";

/// A single additional request header
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Headers with a blank name carry no identity and are never sent
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for HeaderField {
    fn from((name, value): (N, V)) -> Self {
        Self::new(name, value)
    }
}

/// An immutable description of a resource found during parsing
#[derive(Clone)]
pub struct DiscoveryRecord {
    source: Option<Arc<FetchResponse>>,
    depth: u32,
    method: String,
    uri: String,
    body: String,
    should_ignore: bool,
    request_headers: Vec<HeaderField>,
}

impl DiscoveryRecord {
    /// Returns a builder with default values (GET, depth 0, empty URI)
    pub fn builder() -> DiscoveryRecordBuilder {
        DiscoveryRecordBuilder::new()
    }

    /// Returns a builder seeded with every field of `template`
    ///
    /// The header list is copied, so variants built from the returned builder
    /// never share header storage with the template.
    pub fn builder_from(template: &DiscoveryRecord) -> DiscoveryRecordBuilder {
        DiscoveryRecordBuilder {
            source: template.source.clone(),
            depth: template.depth,
            method: template.method.clone(),
            uri: template.uri.clone(),
            body: template.body.clone(),
            should_ignore: template.should_ignore,
            request_headers: template.request_headers.to_vec(),
        }
    }

    /// The response in which this resource was found, if any
    pub fn source(&self) -> Option<&FetchResponse> {
        self.source.as_deref()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Request body; empty for GET-style resources
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether the resource was found but must not be fetched
    pub fn should_ignore(&self) -> bool {
        self.should_ignore
    }

    pub fn request_headers(&self) -> &[HeaderField] {
        &self.request_headers
    }
}

impl PartialEq for DiscoveryRecord {
    /// Two records are equal when every field except the source matches
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth
            && self.method == other.method
            && self.uri == other.uri
            && self.body == other.body
            && self.should_ignore == other.should_ignore
            && self.request_headers == other.request_headers
    }
}

impl Eq for DiscoveryRecord {}

impl fmt::Debug for DiscoveryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryRecord")
            .field("source", &self.source.as_ref().map(|s| s.uri.as_str()))
            .field("depth", &self.depth)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("body", &self.body)
            .field("should_ignore", &self.should_ignore)
            .field("request_headers", &self.request_headers)
            .finish()
    }
}

impl fmt::Display for DiscoveryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (depth {})", self.method, self.uri, self.depth)
    }
}

/// Builder for `DiscoveryRecord`
#[derive(Clone)]
pub struct DiscoveryRecordBuilder {
    source: Option<Arc<FetchResponse>>,
    depth: u32,
    method: String,
    uri: String,
    body: String,
    should_ignore: bool,
    request_headers: Vec<HeaderField>,
}

impl DiscoveryRecordBuilder {
    fn new() -> Self {
        Self {
            source: None,
            depth: 0,
            method: DEFAULT_METHOD.to_string(),
            uri: String::new(),
            body: String::new(),
            should_ignore: false,
            request_headers: Vec::new(),
        }
    }

    /// Sets the response in which the resource was found
    pub fn source(mut self, source: Option<Arc<FetchResponse>>) -> Self {
        self.source = source;
        self
    }

    /// Sets the crawl depth
    ///
    /// # Errors
    ///
    /// `SpiderError::InvalidArgument` if `depth` is negative or does not fit
    /// in a `u32`.
    pub fn depth(mut self, depth: i64) -> Result<Self> {
        if depth < 0 {
            return Err(SpiderError::InvalidArgument(format!(
                "depth must not be negative, got {}",
                depth
            )));
        }
        self.depth = u32::try_from(depth).map_err(|_| {
            SpiderError::InvalidArgument(format!("depth {} is out of range", depth))
        })?;
        Ok(self)
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn should_ignore(mut self, should_ignore: bool) -> Self {
        self.should_ignore = should_ignore;
        self
    }

    /// Replaces the request headers, dropping entries with a blank name
    pub fn request_headers<I, H>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<HeaderField>,
    {
        self.request_headers = headers
            .into_iter()
            .map(Into::into)
            .filter(HeaderField::is_valid)
            .collect();
        self
    }

    /// Builds a new record; the builder stays usable
    pub fn build(&self) -> DiscoveryRecord {
        DiscoveryRecord {
            source: self.source.clone(),
            depth: self.depth,
            method: self.method.clone(),
            uri: self.uri.clone(),
            body: self.body.clone(),
            should_ignore: self.should_ignore,
            request_headers: self.request_headers.clone(),
        }
    }
}
