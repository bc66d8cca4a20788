//! Spider-Discovery main entry point
//!
//! Command-line interface for running a deduplicating crawl from a TOML
//! configuration file.

use anyhow::Context;
use clap::Parser;
use spider_discovery::config::{load_config_with_hash, Config};
use spider_discovery::crawler::{crawl, user_agent_string, CrawlStats};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Spider-Discovery: a deduplicating resource crawler
///
/// Crawls from the configured seeds, following links and forms while
/// scheduling every canonical request at most once.
#[derive(Parser, Debug)]
#[command(name = "spider-discovery")]
#[command(version)]
#[command(about = "A deduplicating resource crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        print_plan(&config);
        return Ok(());
    }

    tracing::info!(
        "Starting crawl with {} seeds, {} workers, depth limit {}",
        config.seeds.len(),
        config.crawler.worker_pool_size,
        config.crawler.max_depth
    );

    let stats = crawl(config).await.context("Crawl failed")?;
    print_stats(&stats);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("spider_discovery=info,warn"),
            1 => EnvFilter::new("spider_discovery=debug,info"),
            2 => EnvFilter::new("spider_discovery=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: shows the validated configuration and seeds
fn print_plan(config: &Config) {
    println!("=== Spider-Discovery Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Worker pool size: {}", config.crawler.worker_pool_size);
    println!(
        "  Max outstanding tasks: {}",
        config.crawler.max_outstanding_tasks
    );
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    println!("  Backpressure: {:?}", config.crawler.backpressure);
    if config.crawler.allowed_hosts.is_empty() {
        println!("  Allowed hosts: any");
    } else {
        println!("  Allowed hosts: {}", config.crawler.allowed_hosts.join(", "));
    }

    println!("\nUser Agent: {}", user_agent_string(&config.user_agent));

    println!("\nRequest Headers ({}):", config.request_headers.len());
    for header in &config.request_headers {
        println!("  {}: {}", header.name, header.value);
    }

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        if seed.body.is_empty() {
            println!("  - {} {}", seed.method, seed.uri);
        } else {
            println!("  - {} {} ({} byte body)", seed.method, seed.uri, seed.body.len());
        }
    }

    println!("\n✓ Configuration is valid");
}

fn print_stats(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");
    println!("Started:      {}", stats.started_at.to_rfc3339());
    println!("Discovered:   {}", stats.discovered);
    println!("Dispatched:   {}", stats.dispatched);
    println!("  Succeeded:  {}", stats.succeeded);
    println!("  Failed:     {}", stats.failed);
    println!("  Cancelled:  {}", stats.cancelled);
    println!("Duplicates:   {}", stats.dropped);
    println!("Ignored:      {}", stats.ignored);
    println!("Rejected:     {}", stats.rejected);
    println!("Unique keys:  {}", stats.unique_keys);
}
