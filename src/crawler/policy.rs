//! Admission and politeness policies
//!
//! Depth cutoffs and host scope are admission predicates the controller
//! consults before deduplication, so a refused record never occupies a dedup
//! slot. Per-host politeness is a separate policy the dispatcher asks for a
//! delay before each fetch.

use crate::config::CrawlerConfig;
use crate::discovery::DiscoveryRecord;
use crate::state::HostState;
use crate::url::{extract_host, matches_host_pattern};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Reject(String),
}

/// Decides whether a record may be scheduled at all
pub trait AdmissionPolicy: Send + Sync {
    fn admit(&self, record: &DiscoveryRecord) -> Admission;
}

/// Refuses records deeper than the configured maximum
#[derive(Debug, Clone, Copy)]
pub struct MaxDepth(pub u32);

impl AdmissionPolicy for MaxDepth {
    fn admit(&self, record: &DiscoveryRecord) -> Admission {
        if record.depth() > self.0 {
            Admission::Reject(format!(
                "depth {} exceeds maximum {}",
                record.depth(),
                self.0
            ))
        } else {
            Admission::Admit
        }
    }
}

/// Refuses records whose host matches none of the allowed patterns
///
/// An empty pattern list allows every host.
#[derive(Debug, Clone, Default)]
pub struct HostScope {
    patterns: Vec<String>,
}

impl HostScope {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }
}

impl AdmissionPolicy for HostScope {
    fn admit(&self, record: &DiscoveryRecord) -> Admission {
        if self.patterns.is_empty() {
            return Admission::Admit;
        }

        match extract_host(record.uri()) {
            Some(host) if self.patterns.iter().any(|p| matches_host_pattern(p, &host)) => {
                Admission::Admit
            }
            Some(host) => Admission::Reject(format!("host {} is out of scope", host)),
            None => Admission::Reject(format!("no host in {:?}", record.uri())),
        }
    }
}

/// Runs policies in order; the first rejection wins
#[derive(Default)]
pub struct AdmissionChain {
    policies: Vec<Box<dyn AdmissionPolicy>>,
}

impl AdmissionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth limit plus host scope, as configured
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new()
            .with(MaxDepth(config.max_depth))
            .with(HostScope::new(config.allowed_hosts.clone()))
    }

    pub fn with(mut self, policy: impl AdmissionPolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl AdmissionPolicy for AdmissionChain {
    fn admit(&self, record: &DiscoveryRecord) -> Admission {
        for policy in &self.policies {
            if let Admission::Reject(reason) = policy.admit(record) {
                return Admission::Reject(reason);
            }
        }
        Admission::Admit
    }
}

/// Decides how long a request must wait before contacting its host
pub trait PolitenessPolicy: Send + Sync {
    /// Claims the next request slot for the URI and returns the wait
    fn reserve(&self, uri: &str) -> Duration;
}

/// Spaces out requests to the same host by a fixed delay
#[derive(Debug)]
pub struct Politeness {
    delay: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl Politeness {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Number of requests started against `host` so far
    pub fn request_count(&self, host: &str) -> u32 {
        self.hosts
            .lock()
            .map(|hosts| hosts.get(host).map_or(0, |s| s.request_count))
            .unwrap_or(0)
    }
}

impl PolitenessPolicy for Politeness {
    /// URIs without a host never wait.
    fn reserve(&self, uri: &str) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }
        let Some(host) = extract_host(uri) else {
            return Duration::ZERO;
        };

        let mut hosts = self
            .hosts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        hosts
            .entry(host)
            .or_insert_with(HostState::new)
            .reserve(self.delay, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(uri: &str, depth: i64) -> DiscoveryRecord {
        DiscoveryRecord::builder()
            .uri(uri)
            .depth(depth)
            .unwrap()
            .build()
    }

    #[test]
    fn test_max_depth() {
        let policy = MaxDepth(2);
        assert_eq!(policy.admit(&record("https://a.com/", 0)), Admission::Admit);
        assert_eq!(policy.admit(&record("https://a.com/", 2)), Admission::Admit);
        assert!(matches!(
            policy.admit(&record("https://a.com/", 3)),
            Admission::Reject(_)
        ));
    }

    #[test]
    fn test_host_scope() {
        let scope = HostScope::new(vec!["*.example.com".to_string()]);
        assert_eq!(
            scope.admit(&record("https://blog.example.com/", 0)),
            Admission::Admit
        );
        assert!(matches!(
            scope.admit(&record("https://other.com/", 0)),
            Admission::Reject(_)
        ));
        assert!(matches!(
            scope.admit(&record("", 0)),
            Admission::Reject(_)
        ));
    }

    #[test]
    fn test_empty_scope_admits_everything() {
        let scope = HostScope::default();
        assert_eq!(scope.admit(&record("https://any.org/", 0)), Admission::Admit);
    }

    #[test]
    fn test_chain_first_rejection_wins() {
        let chain = AdmissionChain::new()
            .with(MaxDepth(1))
            .with(HostScope::new(vec!["example.com".to_string()]));
        assert_eq!(chain.len(), 2);

        assert_eq!(chain.admit(&record("https://example.com/", 1)), Admission::Admit);

        match chain.admit(&record("https://other.com/", 5)) {
            Admission::Reject(reason) => assert!(reason.contains("depth")),
            Admission::Admit => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_politeness_reserves_per_host() {
        let politeness = Politeness::new(Duration::from_secs(1));

        assert_eq!(politeness.reserve("https://a.com/1"), Duration::ZERO);
        assert!(politeness.reserve("https://a.com/2") > Duration::from_millis(900));
        assert_eq!(politeness.reserve("https://b.com/1"), Duration::ZERO);
        assert_eq!(politeness.reserve("mailto:x@a.com"), Duration::ZERO);

        assert_eq!(politeness.request_count("a.com"), 2);
        assert_eq!(politeness.request_count("b.com"), 1);
    }

    #[test]
    fn test_zero_delay_politeness() {
        let politeness = Politeness::new(Duration::ZERO);
        assert_eq!(politeness.reserve("https://a.com/1"), Duration::ZERO);
        assert_eq!(politeness.reserve("https://a.com/2"), Duration::ZERO);
    }
}
