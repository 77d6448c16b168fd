//! A single parser-consumer task (§4.5). Each parser OS process runs
//! `parser_concurrency` of these, draining the shared fetch handoff queue
//! and cooperating with the Frontier Manager over the Coordination Store
//! and disk exactly as fetcher workers do — no shared memory is required.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use webcrawler_core::{CoordinationStore, FetchPayload, FrontierManager, Storage, VisitedRecord};

/// Randomized poll backoff used to approximate "pop with blocking timeout"
/// (§4.5 step 1) against a Coordination Store list primitive that only
/// exposes a non-blocking pop (§6.1).
const POLL_MIN_MS: u64 = 100;
const POLL_MAX_MS: u64 = 400;

pub struct ConsumerContext {
    pub store: Arc<dyn CoordinationStore>,
    pub frontier: Arc<FrontierManager>,
    pub storage: Arc<dyn Storage>,
    pub shutdown: Arc<AtomicBool>,
}

pub async fn run(task_id: usize, ctx: ConsumerContext) {
    loop {
        if ctx.shutdown.load(Ordering::Relaxed) {
            tracing::debug!(task_id, "shutdown requested; consumer task exiting");
            return;
        }

        let raw = match ctx.store.handoff_pop().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                sleep_randomized().await;
                continue;
            }
            Err(e) => {
                tracing::warn!(task_id, error = %e, "coordination store error popping handoff queue");
                sleep_randomized().await;
                continue;
            }
        };

        let payload = match FetchPayload::from_json(&raw) {
            Ok(payload) => payload,
            Err(e) => {
                // Data-shape error (§7): log and skip, never fatal.
                tracing::warn!(task_id, error = %e, "malformed fetch handoff payload; skipping");
                continue;
            }
        };

        process_payload(&ctx, payload).await;
    }
}

async fn process_payload(ctx: &ConsumerContext, payload: FetchPayload) {
    let parsed = webcrawler_core::parser::parse(payload.raw_body.as_bytes(), &payload.final_url);

    let content_path = match &parsed.extracted_text {
        Some(text) if !text.is_empty() => ctx.storage.save_text(&payload.initial_url, text).await,
        _ => None,
    };

    let record = VisitedRecord {
        url: payload.initial_url.clone(),
        url_sha256: webcrawler_core::storage::visited_key(&payload.initial_url),
        domain: payload.domain.clone(),
        status_code: Some(payload.status),
        fetched_at: payload.fetched_at,
        content_path,
        content_hash: parsed
            .extracted_text
            .as_ref()
            .map(|t| webcrawler_core::storage::visited_key(t)),
        redirected_to: if payload.final_url != payload.initial_url {
            Some(payload.final_url.clone())
        } else {
            None
        },
        error: None,
    };
    if let Err(e) = ctx.store.put_visited(&record).await {
        tracing::warn!(url = %payload.initial_url, error = %e, "failed to write visited record");
    }

    if !parsed.discovered_links.is_empty() {
        match ctx
            .frontier
            .add_urls(&parsed.discovered_links, payload.depth + 1)
            .await
        {
            Ok(added) => {
                tracing::debug!(
                    url = %payload.initial_url,
                    discovered = parsed.discovered_links.len(),
                    added,
                    "handed discovered links back to frontier manager"
                );
            }
            Err(e) => {
                tracing::warn!(url = %payload.initial_url, error = %e, "failed to add discovered links");
            }
        }
    }
}

async fn sleep_randomized() {
    let ms = rand::thread_rng().gen_range(POLL_MIN_MS..=POLL_MAX_MS);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
