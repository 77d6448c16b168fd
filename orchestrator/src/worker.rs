//! A single fetcher worker task (§4.4). The orchestrator spawns
//! `max_workers` of these as cooperative tokio tasks sharing one runtime;
//! none of them parse HTML or read robots directly — all politeness and
//! parsing is delegated to the `FrontierManager`/`PolitenessEnforcer` and
//! the separate parser processes.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use webcrawler_core::{CoordinationStore, CrawlerConfig, FetchPayload, Fetcher, FrontierManager};

use crate::stats::CrawlerStats;

/// Randomized sleep bounds for the "no URL ready" backoff (§4.4 step 1,
/// §9: "avoid thundering herd on an empty ready queue").
const EMPTY_QUEUE_BACKOFF_MIN_MS: u64 = 50;
const EMPTY_QUEUE_BACKOFF_MAX_MS: u64 = 500;

/// Randomized sleep bounds for soft/hard backpressure (§4.4 step 2).
const SOFT_BACKPRESSURE_MIN_SECS: u64 = 5;
const SOFT_BACKPRESSURE_MAX_SECS: u64 = 10;
const HARD_BACKPRESSURE_MIN_SECS: u64 = 20;
const HARD_BACKPRESSURE_MAX_SECS: u64 = 30;

pub struct WorkerContext {
    pub store: Arc<dyn CoordinationStore>,
    pub frontier: Arc<FrontierManager>,
    pub fetcher: Arc<dyn Fetcher>,
    pub stats: Arc<CrawlerStats>,
    pub config: Arc<CrawlerConfig>,
}

/// Runs one fetcher worker's loop until a global stop condition fires
/// (§4.4 step 6) or shutdown is requested.
pub async fn run(worker_id: usize, ctx: WorkerContext) {
    loop {
        if should_stop(&ctx) {
            tracing::debug!(worker_id, "stopping condition met; worker exiting");
            return;
        }

        let next = match ctx.frontier.get_next_url().await {
            Ok(Some(next)) => next,
            Ok(None) => {
                sleep_randomized(EMPTY_QUEUE_BACKOFF_MIN_MS, EMPTY_QUEUE_BACKOFF_MAX_MS).await;
                continue;
            }
            Err(e) => {
                tracing::warn!(worker_id, error = %e, "frontier error fetching next URL");
                sleep_randomized(EMPTY_QUEUE_BACKOFF_MIN_MS, EMPTY_QUEUE_BACKOFF_MAX_MS).await;
                continue;
            }
        };

        if !apply_backpressure(&ctx).await {
            // Hard backpressure: restart the loop iteration without fetching (§4.4 step 2).
            // The popped URL is lost from this call's perspective, but it remains
            // recorded in the frontier file; at-least-once semantics (§7) mean a
            // later pass over the domain's backlog is acceptable, not required here
            // since the domain was already re-enqueued by get_next_url.
            continue;
        }

        ctx.stats.active_workers.fetch_add(1, Ordering::Relaxed);
        fetch_one(&ctx, &next).await;
        ctx.stats.active_workers.fetch_sub(1, Ordering::Relaxed);
    }
}

fn should_stop(ctx: &WorkerContext) -> bool {
    if ctx.stats.shutdown_requested() {
        return true;
    }
    if let Some(max_pages) = ctx.config.max_pages {
        if ctx.stats.pages_fetched_count() >= max_pages {
            return true;
        }
    }
    false
}

/// §4.4 step 2: soft/hard backpressure against the fetch handoff queue.
/// Returns `false` if the caller should skip fetching this iteration.
async fn apply_backpressure(ctx: &WorkerContext) -> bool {
    loop {
        let depth = ctx.store.handoff_len().await.unwrap_or(0);
        ctx.stats.handoff_depth.store(depth, Ordering::Relaxed);

        if depth as usize > ctx.config.handoff_hard_threshold {
            sleep_randomized_secs(HARD_BACKPRESSURE_MIN_SECS, HARD_BACKPRESSURE_MAX_SECS).await;
            return false;
        }
        if depth as usize > ctx.config.handoff_soft_threshold {
            sleep_randomized_secs(SOFT_BACKPRESSURE_MIN_SECS, SOFT_BACKPRESSURE_MAX_SECS).await;
            continue;
        }
        return true;
    }
}

async fn fetch_one(ctx: &WorkerContext, next: &webcrawler_core::frontier::NextUrl) {
    let outcome = ctx.fetcher.fetch(&next.url, false).await;

    let has_usable_body = outcome
        .text_content
        .as_ref()
        .map(|b| !b.is_empty())
        .unwrap_or(false);

    if has_usable_body && outcome.error.is_none() {
        let payload = FetchPayload {
            initial_url: outcome.initial_url.clone(),
            final_url: outcome.final_url.clone(),
            status: outcome.status_code,
            domain: next.domain.clone(),
            depth: next.depth,
            fetched_at: chrono::Utc::now().timestamp(),
            content_type: outcome.content_type.clone(),
            raw_body: outcome.text_content.clone().unwrap_or_default(),
        };
        match payload.to_json() {
            Ok(json) => {
                if let Err(e) = ctx.store.handoff_push(&json).await {
                    tracing::warn!(url = %next.url, error = %e, "failed to push fetch payload to handoff queue");
                } else {
                    ctx.stats.record_fetch();
                }
            }
            Err(e) => tracing::warn!(url = %next.url, error = %e, "failed to serialize fetch payload"),
        }
        return;
    }

    // §4.4 step 5: errors (timeouts, DNS, non-2xx without useful body) are
    // recorded as a visited record with the error status; the worker moves on.
    let record = webcrawler_core::VisitedRecord {
        url: next.url.clone(),
        url_sha256: webcrawler_core::storage::visited_key(&next.url),
        domain: next.domain.clone(),
        status_code: if outcome.status_code == 0 {
            None
        } else {
            Some(outcome.status_code)
        },
        fetched_at: chrono::Utc::now().timestamp(),
        content_path: None,
        content_hash: None,
        redirected_to: if outcome.final_url != outcome.initial_url {
            Some(outcome.final_url.clone())
        } else {
            None
        },
        error: outcome.error.clone(),
    };
    if let Err(e) = ctx.store.put_visited(&record).await {
        tracing::warn!(url = %next.url, error = %e, "failed to record visited error");
    }
    if let Some(err) = &outcome.error {
        ctx.stats.record_error(format!("{}: {err}", next.url));
    }
}

async fn sleep_randomized(min_ms: u64, max_ms: u64) {
    let ms = rand::thread_rng().gen_range(min_ms..=max_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

async fn sleep_randomized_secs(min_secs: u64, max_secs: u64) {
    let secs = rand::thread_rng().gen_range(min_secs..=max_secs);
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
