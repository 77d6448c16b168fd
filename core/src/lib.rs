//! Coordination engine core for a polite, high-throughput, single-machine
//! web crawler: frontier management, politeness enforcement, scheduling
//! contracts and the deduplication layer (§1–§6 of the design).
//!
//! This crate is deliberately silent on process lifecycle (`webcrawler-orchestrator`)
//! and on draining the fetch handoff queue (`webcrawler-parser`); it exposes the
//! types and operations both binaries share.

pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod frontier;
pub mod handoff;
pub mod parser;
pub mod politeness;
pub mod robots;
pub mod storage;
pub mod store;

pub use config::CrawlerConfig;
pub use error::{ConfigError, FetchError, FrontierError, PolitenessError, StoreError};
pub use fetcher::{FetchOutcome, Fetcher, HttpFetcher};
pub use frontier::{FrontierManager, NextUrl};
pub use handoff::FetchPayload;
pub use politeness::PolitenessEnforcer;
pub use storage::{FilesystemStorage, Storage};
pub use store::memory_store::MemoryStore;
pub use store::redis_store::RedisStore;
pub use store::{CoordinationStore, DomainRecord, LockToken, VisitedRecord};

/// Current Coordination Store schema version (§3.1, §4.6 step 3).
pub const SCHEMA_VERSION: u32 = 1;
