//! Crawl controller
//!
//! The controller is the single consumer of discoveries. For every record it:
//! 1. Fans the record out to registered listeners
//! 2. Settles ignored records without touching the visited set
//! 3. Applies admission policies (depth, host scope)
//! 4. Claims the record's canonical key in the visited set
//! 5. Submits newly claimed records to the dispatcher
//!
//! Records discovered by finished tasks come back through the same path, so
//! dedup holds across the whole crawl graph.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::dedup::VisitedSet;
use crate::crawler::dispatcher::{DiscoverySink, DispatcherStats, TaskDispatcher, TaskHandle};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::ParserChain;
use crate::crawler::policy::{Admission, AdmissionChain, AdmissionPolicy};
use crate::discovery::{canonicalize, CanonicalKey, DiscoveryListener, DiscoveryRecord};
use crate::state::RecordState;
use crate::DispatchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// What the controller decided for one record
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub state: RecordState,
    /// Canonical key, for records that reached deduplication
    pub key: Option<CanonicalKey>,
    /// Handle of the task created for a dispatched record
    pub task: Option<TaskHandle>,
}

impl RecordOutcome {
    fn settled(state: RecordState, key: Option<CanonicalKey>) -> Self {
        Self {
            state,
            key,
            task: None,
        }
    }
}

/// Snapshot of a crawl run's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    /// Records received, whatever their fate
    pub discovered: u64,
    pub ignored: u64,
    /// Duplicates of an already scheduled key
    pub dropped: u64,
    /// Refused by an admission policy or by the dispatcher
    pub rejected: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub in_flight: usize,
    pub unique_keys: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RecordCounters {
    discovered: AtomicU64,
    ignored: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    dispatched: AtomicU64,
}

impl RecordCounters {
    fn count(&self, state: RecordState) {
        let counter = match state {
            RecordState::Found => &self.discovered,
            RecordState::Ignored => &self.ignored,
            RecordState::Dropped => &self.dropped,
            RecordState::Rejected => &self.rejected,
            RecordState::Dispatched => &self.dispatched,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

enum Screening {
    Settled(RecordOutcome),
    Claimed(CanonicalKey),
}

struct ControllerInner {
    visited: VisitedSet,
    dispatcher: TaskDispatcher,
    admission: Box<dyn AdmissionPolicy>,
    listeners: RwLock<Vec<Arc<dyn DiscoveryListener>>>,
    counters: RecordCounters,
    started_at: DateTime<Utc>,
}

/// Receives discoveries and schedules each canonical resource at most once
///
/// Cloning yields another handle to the same run.
#[derive(Clone)]
pub struct CrawlController {
    inner: Arc<ControllerInner>,
}

impl CrawlController {
    /// Creates a controller for a new crawl run with an empty visited set
    pub fn new(config: &CrawlerConfig, fetcher: Arc<dyn Fetcher>, parsers: ParserChain) -> Self {
        Self::with_parts(
            VisitedSet::new(),
            TaskDispatcher::new(config, fetcher, parsers),
            AdmissionChain::from_config(config),
        )
    }

    /// Creates a controller from explicit collaborators
    ///
    /// Passing a clone of an earlier run's `VisitedSet` continues that run's
    /// dedup state.
    pub fn with_parts(
        visited: VisitedSet,
        dispatcher: TaskDispatcher,
        admission: impl AdmissionPolicy + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                visited,
                dispatcher,
                admission: Box::new(admission),
                listeners: RwLock::new(Vec::new()),
                counters: RecordCounters::default(),
                started_at: Utc::now(),
            }),
        }
    }

    /// Registers a listener that sees every record, in discovery order
    pub fn add_listener(&self, listener: Arc<dyn DiscoveryListener>) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    /// Decides the fate of one record and dispatches it if it is new
    pub async fn notify(&self, record: DiscoveryRecord) -> RecordOutcome {
        let key = match self.screen(&record) {
            Screening::Settled(outcome) => return outcome,
            Screening::Claimed(key) => key,
        };

        let result = self.inner.dispatcher.submit(record, self.sink()).await;
        self.settle(key, result)
    }

    /// Turns the configured seeds into depth-0 records and notifies them
    pub async fn seed(&self, config: &Config) -> Vec<RecordOutcome> {
        let headers = config.request_header_fields();

        let mut outcomes = Vec::with_capacity(config.seeds.len());
        for seed in &config.seeds {
            let record = DiscoveryRecord::builder()
                .method(seed.method.as_str())
                .uri(seed.uri.as_str())
                .body(seed.body.as_str())
                .request_headers(headers.iter().cloned())
                .build();
            tracing::info!("Seeding {}", record);
            outcomes.push(self.notify(record).await);
        }
        outcomes
    }

    /// Waits until every dispatched task and everything it led to is done
    pub async fn run_until_idle(&self) -> CrawlStats {
        self.inner.dispatcher.wait_idle().await;
        self.stats()
    }

    /// Stops the run
    ///
    /// New discoveries are rejected, queued tasks are cancelled and running
    /// fetches finish. The visited set is left intact.
    pub fn stop(&self) {
        tracing::info!("Stopping crawl");
        self.inner.dispatcher.shutdown();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.dispatcher.is_shut_down()
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.inner.visited
    }

    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.inner.dispatcher
    }

    pub fn stats(&self) -> CrawlStats {
        let c = &self.inner.counters;
        let DispatcherStats {
            succeeded,
            failed,
            cancelled,
            in_flight,
            ..
        } = self.inner.dispatcher.stats();

        CrawlStats {
            discovered: c.discovered.load(Ordering::Relaxed),
            ignored: c.ignored.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            dispatched: c.dispatched.load(Ordering::Relaxed),
            succeeded,
            failed,
            cancelled,
            in_flight,
            unique_keys: self.inner.visited.len(),
            started_at: self.inner.started_at,
        }
    }

    fn sink(&self) -> Arc<dyn DiscoverySink> {
        Arc::new(self.clone())
    }

    /// Everything that happens before dispatch; never blocks
    fn screen(&self, record: &DiscoveryRecord) -> Screening {
        self.inner.counters.count(RecordState::Found);
        self.fan_out(record);

        if record.should_ignore() {
            tracing::debug!("Ignoring {}", record);
            self.inner.counters.count(RecordState::Ignored);
            return Screening::Settled(RecordOutcome::settled(RecordState::Ignored, None));
        }

        if let Admission::Reject(reason) = self.inner.admission.admit(record) {
            tracing::debug!("Not admitting {}: {}", record, reason);
            self.inner.counters.count(RecordState::Rejected);
            return Screening::Settled(RecordOutcome::settled(RecordState::Rejected, None));
        }

        let key = canonicalize(record);
        if !self.inner.visited.try_insert(key) {
            tracing::trace!("Dropping duplicate {} ({})", record, key);
            self.inner.counters.count(RecordState::Dropped);
            return Screening::Settled(RecordOutcome::settled(RecordState::Dropped, Some(key)));
        }

        Screening::Claimed(key)
    }

    /// Records the dispatcher's answer for a claimed key
    ///
    /// A refused submission keeps its key; the resource is not retried later
    /// in the same run.
    fn settle(&self, key: CanonicalKey, result: Result<TaskHandle, DispatchError>) -> RecordOutcome {
        match result {
            Ok(task) => {
                self.inner.counters.count(RecordState::Dispatched);
                RecordOutcome {
                    state: RecordState::Dispatched,
                    key: Some(key),
                    task: Some(task),
                }
            }
            Err(_) => {
                self.inner.counters.count(RecordState::Rejected);
                RecordOutcome::settled(RecordState::Rejected, Some(key))
            }
        }
    }

    fn fan_out(&self, record: &DiscoveryRecord) {
        let listeners = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for listener in listeners.iter() {
            listener.on_discovery(record);
        }
    }
}

/// Synchronous entry point for parsers
///
/// Uses `TaskDispatcher::try_submit`, so a full budget under
/// `Backpressure::Block` queues the task rather than blocking the parser. Once
/// the dispatcher's waiting room is full too, records are rejected.
impl DiscoveryListener for CrawlController {
    fn on_discovery(&self, record: &DiscoveryRecord) {
        if let Screening::Claimed(key) = self.screen(record) {
            let result = self.inner.dispatcher.try_submit(record.clone(), self.sink());
            self.settle(key, result);
        }
    }
}

#[async_trait]
impl DiscoverySink for CrawlController {
    async fn feed(&self, record: DiscoveryRecord) {
        self.notify(record).await;
    }
}
