//! In-process gauges for the monitoring loop (§4.6: "Publish gauges: pages
//! crawled, handoff depth, active workers, process RSS, FD count").
//!
//! Generalized from the teacher's `ui::CrawlerStats`: pages-written became
//! pages-fetched-with-error, a queue-size gauge tracks the fetch handoff
//! queue rather than a single in-memory channel, and RSS/FD readings come
//! from `/proc` rather than being left unset.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub struct CrawlerStats {
    pub pages_fetched: AtomicU64,
    pub pages_errored: AtomicU64,
    pub handoff_depth: AtomicU64,
    pub active_workers: AtomicUsize,
    pub rss_bytes: AtomicU64,
    pub fd_count: AtomicU64,
    pub errors: Mutex<VecDeque<String>>,
    pub rate_history: Mutex<VecDeque<u64>>,
    pub start_time: Instant,
    pub shutdown: AtomicBool,
}

impl CrawlerStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pages_fetched: AtomicU64::new(0),
            pages_errored: AtomicU64::new(0),
            handoff_depth: AtomicU64::new(0),
            active_workers: AtomicUsize::new(0),
            rss_bytes: AtomicU64::new(0),
            fd_count: AtomicU64::new(0),
            errors: Mutex::new(VecDeque::with_capacity(10)),
            rate_history: Mutex::new(VecDeque::with_capacity(60)),
            start_time: Instant::now(),
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn record_fetch(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, message: String) {
        self.pages_errored.fetch_add(1, Ordering::Relaxed);
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        if errors.len() >= 10 {
            errors.pop_front();
        }
        errors.push_back(message);
    }

    pub fn add_rate_sample(&self, rate: u64) {
        let mut history = self.rate_history.lock().unwrap_or_else(|e| e.into_inner());
        if history.len() >= 60 {
            history.pop_front();
        }
        history.push_back(rate);
    }

    pub fn pages_fetched_count(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Reads this process's resident set size and open-fd count from
    /// `/proc/self/*`. Best-effort: any failure leaves the previous
    /// reading in place (this is a monitoring gauge, never load-bearing).
    pub fn sample_process_metrics(&self) {
        if let Some(rss) = read_rss_bytes() {
            self.rss_bytes.store(rss, Ordering::Relaxed);
        }
        if let Some(fds) = count_open_fds() {
            self.fd_count.store(fds, Ordering::Relaxed);
        }
    }
}

fn read_rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

fn count_open_fds() -> Option<u64> {
    let entries = std::fs::read_dir("/proc/self/fd").ok()?;
    Some(entries.count() as u64)
}
