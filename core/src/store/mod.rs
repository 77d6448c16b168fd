//! The Coordination Store contract (§6.1, §6.4): the single source of
//! truth every component uses for shared metadata, queues, the seen-set
//! and locks. The core depends only on the `CoordinationStore` trait;
//! [`redis_store::RedisStore`] and [`memory_store::MemoryStore`] are the
//! two implementations shipped with this repo.

pub mod memory_store;
pub mod redis_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A domain record (§3.1). Field names match the Coordination Store
/// keyspace's `domain:{domain}` hash exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainRecord {
    pub file_path: String,
    pub frontier_offset: u64,
    pub frontier_size: u64,
    /// Unix seconds; earliest time a fetch for this domain may start.
    pub next_fetch_time: i64,
    /// Cached robots.txt body, truncated to `ROBOTS_TXT_MAX_CHARS`. Empty
    /// means "no rules / allow all".
    pub robots_txt: String,
    /// Unix seconds; expiry of the cached robots body.
    pub robots_expires: i64,
    pub is_excluded: bool,
    pub is_seeded: bool,
}

impl DomainRecord {
    pub fn new(file_path: String) -> Self {
        Self {
            file_path,
            frontier_offset: 0,
            frontier_size: 0,
            next_fetch_time: 0,
            robots_txt: String::new(),
            robots_expires: 0,
            is_excluded: false,
            is_seeded: false,
        }
    }
}

/// A visited record (§3.1), keyed by `visited:{first-16-hex-of-sha256(url)}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitedRecord {
    pub url: String,
    pub url_sha256: String,
    pub domain: String,
    pub status_code: Option<u16>,
    pub fetched_at: i64,
    pub content_path: Option<String>,
    pub content_hash: Option<String>,
    pub redirected_to: Option<String>,
    pub error: Option<String>,
}

/// Token returned on successful lock acquisition; must be presented to
/// release the lock so a caller can never release someone else's lock
/// (§9 design note on the domain write lock).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(pub String);

/// The Coordination Store's primitives (§6.1): hash map, atomic ordered
/// list, approximate-membership filter, TTL'd set-if-absent key, glob
/// enumeration. Every method is async because every call is a suspension
/// point (§5).
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    // -- schema version --------------------------------------------------
    async fn get_schema_version(&self) -> Result<Option<u32>, StoreError>;
    async fn set_schema_version_if_absent(&self, version: u32) -> Result<(), StoreError>;

    // -- domain records ---------------------------------------------------
    async fn get_domain(&self, domain: &str) -> Result<Option<DomainRecord>, StoreError>;
    async fn put_domain(&self, domain: &str, record: &DomainRecord) -> Result<(), StoreError>;
    async fn delete_all_domains(&self) -> Result<(), StoreError>;

    // -- domain-ready queue (list) ----------------------------------------
    async fn queue_push_domain(&self, domain: &str) -> Result<(), StoreError>;
    async fn queue_pop_domain(&self) -> Result<Option<String>, StoreError>;
    async fn queue_len(&self) -> Result<u64, StoreError>;
    async fn queue_clear(&self) -> Result<(), StoreError>;

    // -- fetch handoff queue (list of JSON payloads) ----------------------
    async fn handoff_push(&self, payload_json: &str) -> Result<(), StoreError>;
    async fn handoff_pop(&self) -> Result<Option<String>, StoreError>;
    async fn handoff_len(&self) -> Result<u64, StoreError>;

    // -- seen-set (approximate membership filter) -------------------------
    /// Creates the filter with the given target capacity and false-positive
    /// rate if it does not already exist. Idempotent.
    async fn bloom_reserve(&self, capacity: u64, fpr: f64) -> Result<(), StoreError>;
    async fn bloom_exists(&self) -> Result<bool, StoreError>;
    /// Non-mutating membership check, used as a cheap pre-filter.
    async fn bloom_check(&self, item: &str) -> Result<bool, StoreError>;
    /// Adds items, returning one boolean per item: `true` if the item was
    /// newly added (not previously present). This is the authoritative
    /// "was new" signal (§9 open question, resolved conservatively).
    async fn bloom_add_multi(&self, items: &[String]) -> Result<Vec<bool>, StoreError>;

    // -- visited records ---------------------------------------------------
    async fn put_visited(&self, record: &VisitedRecord) -> Result<(), StoreError>;
    async fn get_visited(&self, url_sha256: &str) -> Result<Option<VisitedRecord>, StoreError>;

    // -- per-domain write lock (TTL'd set-if-absent) ----------------------
    /// Attempts to acquire `lock:domain:{domain}` with the given TTL.
    /// Returns a token on success; the token must be passed to
    /// `release_domain_lock` so only the owner can release it.
    async fn acquire_domain_lock(
        &self,
        domain: &str,
        ttl_secs: u64,
    ) -> Result<Option<LockToken>, StoreError>;
    async fn release_domain_lock(
        &self,
        domain: &str,
        token: &LockToken,
    ) -> Result<(), StoreError>;
    /// Enumerates all `lock:domain:*` keys (startup zombie-lock sweep, §4.6).
    async fn list_domain_locks(&self) -> Result<Vec<String>, StoreError>;
    async fn force_clear_domain_lock(&self, domain: &str) -> Result<(), StoreError>;
}
