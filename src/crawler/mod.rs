//! Crawler module: deduplication, dispatch and the crawl loop
//!
//! This module contains the crawl-task core, including:
//! - The visited set guaranteeing at-most-once scheduling
//! - Admission and politeness policies
//! - The bounded task dispatcher and its fetch collaborator
//! - The parser chain that turns responses into new discoveries
//! - The controller tying them together

mod controller;
mod dedup;
mod dispatcher;
mod fetcher;
mod parser;
mod policy;

#[cfg(test)]
mod test_support;

pub use controller::{CrawlController, CrawlStats, RecordOutcome};
pub use dedup::VisitedSet;
pub use dispatcher::{DiscoverySink, DispatcherStats, TaskDispatcher, TaskHandle, TaskReport};
pub use fetcher::{
    build_http_client, user_agent_string, FetchRequest, FetchResponse, Fetcher, HttpFetcher,
};
pub use parser::{HtmlLinkParser, ParserChain, ResourceParser};
pub use policy::{
    Admission, AdmissionChain, AdmissionPolicy, HostScope, MaxDepth, Politeness, PolitenessPolicy,
};

use crate::config::{validate, Config};
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Runs a complete crawl operation, stopping early on Ctrl-C
///
/// This is the main entry point for starting a crawl. See [`crawl_until`].
pub async fn crawl(config: Config) -> Result<CrawlStats> {
    crawl_until(config, interrupted()).await
}

/// Runs a crawl until the graph is exhausted or `stop` resolves
///
/// It will:
/// 1. Validate the configuration
/// 2. Build the HTTP fetcher and the HTML parser chain
/// 3. Seed the controller with the configured resources
/// 4. Report progress until the crawl graph is exhausted
/// 5. Stop once `stop` resolves, letting running fetches finish
///
/// # Returns
///
/// * `Ok(CrawlStats)` - Counters for the finished run
/// * `Err(SpiderError)` - The configuration is invalid or the HTTP client could not be built
pub async fn crawl_until(config: Config, stop: impl Future<Output = ()>) -> Result<CrawlStats> {
    validate(&config)?;

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.user_agent)?);
    let parsers =
        ParserChain::new().with(HtmlLinkParser::with_request_headers(config.request_header_fields()));
    let controller = CrawlController::new(&config.crawler, fetcher, parsers);

    let seeded = controller.seed(&config).await;
    tracing::info!(
        "Seeded {} resources, {} dispatched",
        seeded.len(),
        seeded.iter().filter(|o| o.state.is_dispatched()).count()
    );

    let mut progress = tokio::time::interval(PROGRESS_INTERVAL);
    progress.tick().await;

    let finished = controller.run_until_idle();
    tokio::pin!(finished);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            stats = &mut finished => {
                tracing::info!(
                    "Crawl completed: {} dispatched, {} succeeded, {} failed in {}s",
                    stats.dispatched,
                    stats.succeeded,
                    stats.failed,
                    (chrono::Utc::now() - stats.started_at).num_seconds()
                );
                return Ok(stats);
            }
            _ = progress.tick() => {
                let stats = controller.stats();
                tracing::info!(
                    "Progress: {} dispatched, {} in flight, {} dropped as duplicates",
                    stats.dispatched,
                    stats.in_flight,
                    stats.dropped
                );
            }
            _ = &mut stop, if !controller.is_stopped() => {
                tracing::warn!("Stop requested, waiting for running fetches to finish");
                controller.stop();
            }
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
