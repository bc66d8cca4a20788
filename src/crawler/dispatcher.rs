//! Bounded task dispatcher
//!
//! Every accepted record becomes one spawned task that holds a slot in the
//! outstanding-task budget from submission until its fetch and parse are done.
//! Only `worker-pool-size` tasks fetch at a time; the rest wait for a worker.
//! A task that owes its host a politeness delay sleeps it off without holding
//! a worker, so other hosts keep fetching meanwhile.
//!
//! Tasks created by `try_submit` while the budget is full wait in a separate
//! room of the same size. With both full, `try_submit` reports `QueueFull`, so
//! at most twice `max-outstanding-tasks` tasks ever exist.
//!
//! A task releases both of its slots before feeding the records it discovered
//! back into the sink. Feeding may block on a full budget, and a task that
//! still held a slot while doing so could starve the pool.

use crate::config::{Backpressure, CrawlerConfig};
use crate::crawler::fetcher::{FetchRequest, Fetcher};
use crate::crawler::parser::ParserChain;
use crate::crawler::policy::{Politeness, PolitenessPolicy};
use crate::discovery::{DiscoveryBatch, DiscoveryRecord};
use crate::state::TaskStatus;
use crate::{DispatchError, FetchError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Receives records discovered by finished tasks
///
/// The crawl controller is the production sink; feeding a record there runs
/// the same dedup and admission path as any other discovery.
#[async_trait]
pub trait DiscoverySink: Send + Sync {
    async fn feed(&self, record: DiscoveryRecord);
}

/// Latest known state of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub status: TaskStatus,
    /// Set when the task failed or was cancelled
    pub error: Option<FetchError>,
    /// Records the parser chain reported for the fetched response
    pub discovered: usize,
}

impl TaskReport {
    fn queued() -> Self {
        Self {
            status: TaskStatus::Queued,
            error: None,
            discovered: 0,
        }
    }
}

/// Handle to a submitted task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    uri: String,
    report: watch::Receiver<TaskReport>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn status(&self) -> TaskStatus {
        self.report.borrow().status
    }

    pub fn report(&self) -> TaskReport {
        self.report.borrow().clone()
    }

    /// Waits until the task reaches a terminal status
    pub async fn wait(&self) -> TaskReport {
        let mut report = self.report.clone();
        if let Ok(done) = report.wait_for(|r| r.status.is_terminal()).await {
            return done.clone();
        }
        let last = report.borrow().clone();
        last
    }
}

/// Counters since the dispatcher was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub submitted: u64,
    pub rejected: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub in_flight: usize,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

struct DispatcherInner {
    fetcher: Arc<dyn Fetcher>,
    parsers: ParserChain,
    politeness: Arc<dyn PolitenessPolicy>,
    outstanding: Arc<Semaphore>,
    waiting: Arc<Semaphore>,
    workers: Arc<Semaphore>,
    max_outstanding: usize,
    backpressure: Backpressure,
    shut_down: AtomicBool,
    active: AtomicUsize,
    idle: Notify,
    next_id: AtomicU64,
    counters: Counters,
}

/// Fixed-size worker pool that fetches accepted records
#[derive(Clone)]
pub struct TaskDispatcher {
    inner: Arc<DispatcherInner>,
}

impl TaskDispatcher {
    /// Creates a dispatcher spacing requests by the configured politeness delay
    pub fn new(config: &CrawlerConfig, fetcher: Arc<dyn Fetcher>, parsers: ParserChain) -> Self {
        let politeness = Politeness::new(Duration::from_millis(config.politeness_delay_ms));
        Self::with_politeness(config, fetcher, parsers, Arc::new(politeness))
    }

    /// Creates a dispatcher that asks `politeness` how long each fetch waits
    pub fn with_politeness(
        config: &CrawlerConfig,
        fetcher: Arc<dyn Fetcher>,
        parsers: ParserChain,
        politeness: Arc<dyn PolitenessPolicy>,
    ) -> Self {
        let max_outstanding = config.max_outstanding_tasks.max(1);
        let workers = config.worker_pool_size.max(1);

        Self {
            inner: Arc::new(DispatcherInner {
                fetcher,
                parsers,
                politeness,
                outstanding: Arc::new(Semaphore::new(max_outstanding)),
                waiting: Arc::new(Semaphore::new(max_outstanding)),
                workers: Arc::new(Semaphore::new(workers)),
                max_outstanding,
                backpressure: config.backpressure,
                shut_down: AtomicBool::new(false),
                active: AtomicUsize::new(0),
                idle: Notify::new(),
                next_id: AtomicU64::new(1),
                counters: Counters::default(),
            }),
        }
    }

    /// Submits a record, honoring the configured backpressure policy
    ///
    /// With `Backpressure::Block` this waits for an outstanding slot; with
    /// `Backpressure::Reject` it fails with `QueueFull` instead. Must be called
    /// from within a Tokio runtime.
    pub async fn submit(
        &self,
        record: DiscoveryRecord,
        sink: Arc<dyn DiscoverySink>,
    ) -> Result<TaskHandle, DispatchError> {
        self.check_accepting(&record)?;

        let permit = match self.inner.backpressure {
            Backpressure::Block => Arc::clone(&self.inner.outstanding)
                .acquire_owned()
                .await
                .map_err(|_| self.rejected(&record, DispatchError::ShutDown))?,
            Backpressure::Reject => Arc::clone(&self.inner.outstanding)
                .try_acquire_owned()
                .map_err(|e| self.rejected(&record, self.reservation_error(e)))?,
        };

        let (handle, guard) = self.new_task(&record);
        tokio::spawn(run_task(guard, record, sink, permit));
        Ok(handle)
    }

    /// Submits a record without ever waiting
    ///
    /// Under `Backpressure::Reject` a full budget fails with `QueueFull`. Under
    /// `Backpressure::Block` the task is still created, in the `Queued` state,
    /// if the waiting room has space, and starts once an outstanding slot
    /// frees up; it counts towards `in_flight` and `wait_idle` while it waits.
    /// A full waiting room fails with `QueueFull` too.
    pub fn try_submit(
        &self,
        record: DiscoveryRecord,
        sink: Arc<dyn DiscoverySink>,
    ) -> Result<TaskHandle, DispatchError> {
        self.check_accepting(&record)?;

        match Arc::clone(&self.inner.outstanding).try_acquire_owned() {
            Ok(permit) => {
                let (handle, guard) = self.new_task(&record);
                tokio::spawn(run_task(guard, record, sink, permit));
                Ok(handle)
            }
            Err(TryAcquireError::NoPermits) if self.inner.backpressure == Backpressure::Block => {
                let seat = Arc::clone(&self.inner.waiting)
                    .try_acquire_owned()
                    .map_err(|e| self.rejected(&record, self.reservation_error(e)))?;

                let (handle, guard) = self.new_task(&record);
                tracing::debug!("Task {} waiting for an outstanding slot", handle.id);
                let outstanding = Arc::clone(&self.inner.outstanding);
                tokio::spawn(async move {
                    let acquired = outstanding.acquire_owned().await;
                    drop(seat);
                    match acquired {
                        Ok(permit) => run_task(guard, record, sink, permit).await,
                        Err(_) => cancel(&guard, &record),
                    }
                });
                Ok(handle)
            }
            Err(e) => Err(self.rejected(&record, self.reservation_error(e))),
        }
    }

    /// Stops accepting submissions and cancels tasks still waiting for a worker
    ///
    /// Fetches already running are left to finish.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(
            "Dispatcher shutting down with {} tasks outstanding",
            self.in_flight()
        );
        self.inner.outstanding.close();
        self.inner.waiting.close();
        self.inner.workers.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Resolves once no task is queued, running or feeding back discoveries
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Number of tasks that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> DispatcherStats {
        let c = &self.inner.counters;
        DispatcherStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }

    fn check_accepting(&self, record: &DiscoveryRecord) -> Result<(), DispatchError> {
        if self.is_shut_down() {
            return Err(self.rejected(record, DispatchError::ShutDown));
        }
        if record.should_ignore() {
            return Err(self.rejected(
                record,
                DispatchError::Ignored {
                    uri: record.uri().to_string(),
                },
            ));
        }
        Ok(())
    }

    fn reservation_error(&self, error: TryAcquireError) -> DispatchError {
        match error {
            TryAcquireError::Closed => DispatchError::ShutDown,
            TryAcquireError::NoPermits => DispatchError::QueueFull {
                limit: self.inner.max_outstanding,
            },
        }
    }

    fn rejected(&self, record: &DiscoveryRecord, error: DispatchError) -> DispatchError {
        self.inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Rejected {}: {}", record, error);
        error
    }

    fn new_task(&self, record: &DiscoveryRecord) -> (TaskHandle, TaskGuard) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (report_tx, report_rx) = watch::channel(TaskReport::queued());

        self.inner.active.fetch_add(1, Ordering::SeqCst);
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Task {} queued for {}", id, record);

        let handle = TaskHandle {
            id,
            uri: record.uri().to_string(),
            report: report_rx,
        };
        let guard = TaskGuard {
            inner: Arc::clone(&self.inner),
            id,
            report: report_tx,
        };
        (handle, guard)
    }
}

/// Publishes a task's terminal report and keeps the outstanding count honest
///
/// Dropped without a terminal report only if the task panicked; it is then
/// reported as failed.
struct TaskGuard {
    inner: Arc<DispatcherInner>,
    id: u64,
    report: watch::Sender<TaskReport>,
}

impl TaskGuard {
    fn mark_running(&self) {
        self.report.send_modify(|r| r.status = TaskStatus::Running);
    }

    fn finish(&self, report: TaskReport) {
        let counter = match report.status {
            TaskStatus::Succeeded => &self.inner.counters.succeeded,
            TaskStatus::Cancelled => &self.inner.counters.cancelled,
            _ => &self.inner.counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.report.send_replace(report);
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let finished = self.report.borrow().status.is_terminal();
        if !finished {
            tracing::error!("Task {} ended without a result", self.id);
            self.finish(TaskReport {
                status: TaskStatus::Failed,
                error: None,
                discovered: 0,
            });
        }

        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

fn cancel(guard: &TaskGuard, record: &DiscoveryRecord) {
    tracing::debug!("Task {} cancelled before fetching {}", guard.id, record.uri());
    guard.finish(TaskReport {
        status: TaskStatus::Cancelled,
        error: Some(FetchError::Cancelled {
            uri: record.uri().to_string(),
        }),
        discovered: 0,
    });
}

/// Takes a worker slot once the URI's host may be contacted
///
/// The politeness slot is reserved while holding a worker, so the fetch never
/// starts before it; any delay is slept off with the worker given back.
/// Returns `None` once the dispatcher has shut down.
async fn acquire_worker(inner: &DispatcherInner, uri: &str) -> Option<OwnedSemaphorePermit> {
    let worker = Arc::clone(&inner.workers).acquire_owned().await.ok()?;
    let wait = inner.politeness.reserve(uri);
    if wait.is_zero() {
        return Some(worker);
    }

    drop(worker);
    tracing::trace!("Politeness delay of {:?} before {}", wait, uri);
    tokio::time::sleep(wait).await;
    Arc::clone(&inner.workers).acquire_owned().await.ok()
}

async fn run_task(
    guard: TaskGuard,
    record: DiscoveryRecord,
    sink: Arc<dyn DiscoverySink>,
    outstanding: OwnedSemaphorePermit,
) {
    let inner = Arc::clone(&guard.inner);

    let worker = match acquire_worker(&inner, record.uri()).await {
        Some(permit) => permit,
        None => {
            drop(outstanding);
            cancel(&guard, &record);
            return;
        }
    };

    guard.mark_running();

    let request = FetchRequest::from_record(&record);
    let outcome = match inner.fetcher.fetch(&request).await {
        Ok(response) => {
            let response = Arc::new(response);
            let batch = DiscoveryBatch::new();
            inner.parsers.parse(&response, record.depth(), &batch);
            Ok(batch.into_records())
        }
        Err(error) => Err(error),
    };

    drop(worker);
    drop(outstanding);

    match outcome {
        Ok(children) => {
            let discovered = children.len();
            tracing::debug!(
                "Task {} fetched {} and found {} resources",
                guard.id,
                record.uri(),
                discovered
            );
            for child in children {
                sink.feed(child).await;
            }
            guard.finish(TaskReport {
                status: TaskStatus::Succeeded,
                error: None,
                discovered,
            });
        }
        Err(error) => {
            tracing::warn!("Task {} failed: {}", guard.id, error);
            guard.finish(TaskReport {
                status: TaskStatus::Failed,
                error: Some(error),
                discovered: 0,
            });
        }
    }
}
