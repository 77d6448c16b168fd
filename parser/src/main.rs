//! Parser-consumer process binary (§4.5): a standalone OS process that
//! drains the fetch handoff queue, invokes the HTML parser, saves text
//! bodies, writes visited records, and hands discovered links back to the
//! Frontier Manager. Spawned and supervised by the orchestrator (§4.6);
//! has no shared memory with it or with sibling parser processes.

mod cli;
mod consumer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use webcrawler_core::{CoordinationStore, FilesystemStorage, FrontierManager, HttpFetcher, PolitenessEnforcer, RedisStore};

use crate::cli::Cli;
use crate::consumer::ConsumerContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::setup_logging(cli.verbose);
    let process_index = cli.process_index;
    let config = cli.into_config()?;

    tracing::info!(process_index, url = %config.redis_url(), "parser process connecting to coordination store");
    let store: Arc<dyn CoordinationStore> = Arc::new(RedisStore::connect(&config.redis_url()).await?);

    let fetcher = Arc::new(HttpFetcher::new(&config.user_agent())?);
    let politeness = Arc::new(PolitenessEnforcer::new(
        store.clone(),
        fetcher as Arc<dyn webcrawler_core::Fetcher>,
        &config,
    ));
    let frontier = Arc::new(FrontierManager::new(store.clone(), politeness, &config));

    let storage = Arc::new(FilesystemStorage::new(&config.data_dir));
    storage.ensure_dirs().await?;

    let shutdown = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(config.parser_concurrency);
    for task_id in 0..config.parser_concurrency {
        let ctx = ConsumerContext {
            store: store.clone(),
            frontier: frontier.clone(),
            storage: storage.clone() as Arc<dyn webcrawler_core::Storage>,
            shutdown: shutdown.clone(),
        };
        handles.push(tokio::spawn(consumer::run(task_id, ctx)));
    }
    tracing::info!(
        process_index,
        concurrency = config.parser_concurrency,
        "spawned parser consumer tasks"
    );

    tokio::signal::ctrl_c().await.ok();
    tracing::info!(process_index, "parser process received shutdown signal; draining");
    shutdown.store(true, Ordering::Relaxed);

    futures::future::join_all(handles).await;

    tracing::info!(process_index, "parser process exiting");
    Ok(())
}
