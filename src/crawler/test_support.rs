//! Fakes shared by the crawler unit tests

use crate::config::{Backpressure, CrawlerConfig};
use crate::crawler::dispatcher::DiscoverySink;
use crate::crawler::fetcher::{FetchRequest, FetchResponse, Fetcher};
use crate::discovery::DiscoveryRecord;
use crate::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

pub fn crawler_config(workers: usize, outstanding: usize, backpressure: Backpressure) -> CrawlerConfig {
    CrawlerConfig {
        max_depth: 10,
        max_outstanding_tasks: outstanding,
        worker_pool_size: workers,
        politeness_delay_ms: 0,
        backpressure,
        allowed_hosts: vec![],
    }
}

pub fn html(uri: &str, body: &str) -> FetchResponse {
    FetchResponse {
        uri: uri.to_string(),
        status: 200,
        content_type: "text/html".to_string(),
        body: body.to_string(),
    }
}

/// Serves canned responses and remembers every request it saw
///
/// Unknown URIs get an empty HTML page. A gated fetcher holds every fetch
/// until `open_gate` lets it through.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, Result<FetchResponse, FetchError>>,
    requests: Mutex<Vec<FetchRequest>>,
    gate: Option<Semaphore>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn page(mut self, uri: &str, body: &str) -> Self {
        self.pages.insert(uri.to_string(), Ok(html(uri, body)));
        self
    }

    pub fn failing(mut self, uri: &str, error: FetchError) -> Self {
        self.pages.insert(uri.to_string(), Err(error));
        self
    }

    pub fn open_gate(&self, fetches: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(fetches);
        }
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Yields until at least `n` fetches have started
    pub async fn wait_for_requests(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.request_count() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetches did not start in time");
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.pages
            .get(&request.uri)
            .cloned()
            .unwrap_or_else(|| Ok(html(&request.uri, "<html></html>")))
    }
}

/// Collects whatever the dispatcher feeds back
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<DiscoveryRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<DiscoveryRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscoverySink for RecordingSink {
    async fn feed(&self, record: DiscoveryRecord) {
        self.records.lock().unwrap().push(record);
    }
}
