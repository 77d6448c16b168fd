//! Orchestrator binary (§4.6): assembles configuration, connects to the
//! Coordination Store, clears stale locks, spawns parser processes and
//! fetcher worker tasks, then runs the monitoring loop until a stop
//! condition or shutdown signal fires.

mod cli;
mod stats;
mod supervisor;
mod ui;
mod worker;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use webcrawler_core::{
    CoordinationStore, CrawlerConfig, FrontierManager, HttpFetcher, PolitenessEnforcer, RedisStore,
    SCHEMA_VERSION,
};

use crate::cli::Cli;
use crate::stats::CrawlerStats;
use crate::worker::WorkerContext;

/// Monitoring loop tick interval (§4.6: "once per short interval, e.g., 5s").
const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// How long the domain-ready queue must stay empty before "frontier fully
/// empty across all domains" is treated as a global stop condition.
const EMPTY_FRONTIER_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::setup_logging(cli.verbose);
    let dashboard = cli.dashboard;
    let config_path = cli.config.clone();
    let config = cli.into_config()?;

    if !config.resume {
        config.validate_new_crawl()?;
    }
    let config = Arc::new(config);

    // The fetcher pool is I/O-bound (§5: workers spend their time suspended
    // on the coordination store, disk and HTTP), so `max_workers` is sized
    // far above the CPU core count by default; a worker count near or
    // below it is almost certainly a misconfiguration, not a tuning choice.
    let cpus = num_cpus::get();
    if config.max_workers <= cpus {
        tracing::warn!(
            max_workers = config.max_workers,
            cpus,
            "worker count is at or below the CPU core count; this crawler is I/O-bound and typically wants hundreds of workers"
        );
    }

    init_storage_dirs(&config).await?;

    tracing::info!(url = %config.redis_url(), "connecting to coordination store");
    let store: Arc<dyn CoordinationStore> = Arc::new(RedisStore::connect(&config.redis_url()).await?);

    reconcile_schema_version(store.as_ref()).await?;

    let cleared = clear_stale_locks(store.as_ref()).await?;
    tracing::info!(cleared, "cleared stale domain write locks from a prior run");

    let fetcher = Arc::new(HttpFetcher::new(&config.user_agent())?);

    let politeness = Arc::new(PolitenessEnforcer::new(
        store.clone(),
        fetcher.clone() as Arc<dyn webcrawler_core::Fetcher>,
        &config,
    ));
    politeness.initialize(config.exclude_file.as_deref()).await?;

    let frontier = Arc::new(FrontierManager::new(store.clone(), politeness.clone(), &config));
    frontier
        .initialize(config.resume, config.seed_file.as_deref())
        .await?;

    let parser_binary = locate_sibling_binary("webcrawler-parser");
    let mut parsers = supervisor::spawn_parsers(
        config.parser_processes,
        &parser_binary,
        config_path.as_ref(),
        &config.cs_host,
        config.cs_port,
    )?;

    let stats = CrawlerStats::new();

    let mut worker_handles = Vec::with_capacity(config.max_workers);
    for worker_id in 0..config.max_workers {
        let ctx = WorkerContext {
            store: store.clone(),
            frontier: frontier.clone(),
            fetcher: fetcher.clone() as Arc<dyn webcrawler_core::Fetcher>,
            stats: stats.clone(),
            config: config.clone(),
        };
        worker_handles.push(tokio::spawn(worker::run(worker_id, ctx)));
    }
    tracing::info!(count = config.max_workers, "spawned fetcher worker tasks");

    let dashboard_handle = if dashboard {
        Some(tokio::spawn(ui::run_dashboard(stats.clone())))
    } else {
        None
    };

    run_monitoring_loop(
        &config,
        store.as_ref(),
        frontier.as_ref(),
        &stats,
        &mut parsers,
        &parser_binary,
        config_path.as_ref(),
    )
    .await;

    tracing::info!("shutdown requested; waiting for workers to finish their current iteration");
    stats.request_shutdown();
    futures::future::join_all(worker_handles).await;
    if let Some(handle) = dashboard_handle {
        let _ = handle.await;
    }
    for parser in parsers {
        parser.terminate().await;
    }

    let elapsed = stats.start_time.elapsed();
    tracing::info!(
        pages_fetched = stats.pages_fetched_count(),
        pages_errored = stats.pages_errored.load(Ordering::Relaxed),
        runtime_secs = elapsed.as_secs(),
        "crawl finished"
    );

    Ok(())
}

async fn init_storage_dirs(config: &CrawlerConfig) -> std::io::Result<()> {
    tokio::fs::create_dir_all(config.data_dir.join("frontiers")).await?;
    tokio::fs::create_dir_all(config.data_dir.join("content")).await?;
    Ok(())
}

/// §4.6 step 3: set the schema version if absent; warn (do not exit) on mismatch.
async fn reconcile_schema_version(store: &dyn CoordinationStore) -> anyhow::Result<()> {
    store.set_schema_version_if_absent(SCHEMA_VERSION).await?;
    if let Some(existing) = store.get_schema_version().await? {
        if existing != SCHEMA_VERSION {
            tracing::warn!(
                existing,
                expected = SCHEMA_VERSION,
                "coordination store schema version mismatch; no auto-migration will run"
            );
        }
    }
    Ok(())
}

/// §4.6 step 4: sweep `lock:domain:*`, assuming any holder from a prior
/// run is dead.
async fn clear_stale_locks(store: &dyn CoordinationStore) -> anyhow::Result<usize> {
    let keys = store.list_domain_locks().await?;
    for key in &keys {
        if let Some(domain) = key.strip_prefix("lock:domain:") {
            store.force_clear_domain_lock(domain).await?;
        }
    }
    Ok(keys.len())
}

#[allow(clippy::too_many_arguments)]
async fn run_monitoring_loop(
    config: &CrawlerConfig,
    store: &dyn CoordinationStore,
    frontier: &FrontierManager,
    stats: &Arc<CrawlerStats>,
    parsers: &mut Vec<supervisor::ParserProcess>,
    parser_binary: &PathBuf,
    config_path: Option<&PathBuf>,
) {
    let run_start = Instant::now();
    let mut empty_since: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(MONITOR_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal");
                stats.request_shutdown();
                return;
            }
        }

        if stats.shutdown_requested() {
            return;
        }

        // Publish gauges (§4.6 monitoring loop).
        stats.sample_process_metrics();
        let handoff_depth = store.handoff_len().await.unwrap_or(0);
        stats.handoff_depth.store(handoff_depth, Ordering::Relaxed);
        tracing::info!(
            pages_fetched = stats.pages_fetched_count(),
            pages_errored = stats.pages_errored.load(Ordering::Relaxed),
            handoff_depth,
            active_workers = stats.active_workers.load(Ordering::Relaxed),
            rss_bytes = stats.rss_bytes.load(Ordering::Relaxed),
            fd_count = stats.fd_count.load(Ordering::Relaxed),
            "monitoring tick"
        );

        supervisor::restart_dead(
            parsers,
            parser_binary,
            config_path,
            &config.cs_host,
            config.cs_port,
        );

        if let Some(max_pages) = config.max_pages {
            if stats.pages_fetched_count() >= max_pages {
                tracing::info!(max_pages, "max_pages stop condition reached");
                return;
            }
        }
        if let Some(max_duration) = config.max_duration_secs {
            if run_start.elapsed().as_secs() >= max_duration {
                tracing::info!(max_duration, "max_duration stop condition reached");
                return;
            }
        }

        match frontier.is_empty().await {
            Ok(true) => {
                let since = *empty_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= EMPTY_FRONTIER_GRACE {
                    tracing::info!("frontier empty across all domains for a sustained window; stopping");
                    return;
                }
            }
            Ok(false) => empty_since = None,
            Err(e) => tracing::warn!(error = %e, "failed to check frontier emptiness"),
        }
    }
}

/// The parser binary ships alongside the orchestrator binary in the same
/// target directory; resolved relative to the running executable so this
/// works regardless of the current working directory.
fn locate_sibling_binary(name: &str) -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|dir| dir.join(name)))
        .unwrap_or_else(|| PathBuf::from(name))
}
