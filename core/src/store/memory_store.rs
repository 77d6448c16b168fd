//! In-memory `CoordinationStore`, used by the test suite and suitable for
//! single-process development runs without a Redis + RedisBloom
//! deployment. Internally mirrors the Redis keyspace (§6.4) with plain
//! Rust collections behind one `tokio::sync::Mutex`; contention is
//! negligible compared to I/O, matching the guidance in §9 for
//! process-local bounded caches.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use growable_bloom_filter::GrowableBloom;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{CoordinationStore, DomainRecord, LockToken, VisitedRecord};

struct Inner {
    schema_version: Option<u32>,
    domains: HashMap<String, DomainRecord>,
    ready_queue: VecDeque<String>,
    handoff_queue: VecDeque<String>,
    bloom: Option<GrowableBloom>,
    visited: HashMap<String, VisitedRecord>,
    locks: HashMap<String, (String, std::time::Instant, std::time::Duration)>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                schema_version: None,
                domains: HashMap::new(),
                ready_queue: VecDeque::new(),
                handoff_queue: VecDeque::new(),
                bloom: None,
                visited: HashMap::new(),
                locks: HashMap::new(),
            }),
        }
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get_schema_version(&self) -> Result<Option<u32>, StoreError> {
        Ok(self.inner.lock().await.schema_version)
    }

    async fn set_schema_version_if_absent(&self, version: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.schema_version.is_none() {
            inner.schema_version = Some(version);
        }
        Ok(())
    }

    async fn get_domain(&self, domain: &str) -> Result<Option<DomainRecord>, StoreError> {
        Ok(self.inner.lock().await.domains.get(domain).cloned())
    }

    async fn put_domain(&self, domain: &str, record: &DomainRecord) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .domains
            .insert(domain.to_string(), record.clone());
        Ok(())
    }

    async fn delete_all_domains(&self) -> Result<(), StoreError> {
        self.inner.lock().await.domains.clear();
        Ok(())
    }

    async fn queue_push_domain(&self, domain: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .ready_queue
            .push_back(domain.to_string());
        Ok(())
    }

    async fn queue_pop_domain(&self) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().await.ready_queue.pop_front())
    }

    async fn queue_len(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().await.ready_queue.len() as u64)
    }

    async fn queue_clear(&self) -> Result<(), StoreError> {
        self.inner.lock().await.ready_queue.clear();
        Ok(())
    }

    async fn handoff_push(&self, payload_json: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .handoff_queue
            .push_back(payload_json.to_string());
        Ok(())
    }

    async fn handoff_pop(&self) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().await.handoff_queue.pop_front())
    }

    async fn handoff_len(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().await.handoff_queue.len() as u64)
    }

    async fn bloom_reserve(&self, capacity: u64, fpr: f64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.bloom.is_none() {
            inner.bloom = Some(GrowableBloom::new(fpr, capacity as usize));
            tracing::info!(capacity, fpr, "created in-memory seen-set bloom filter");
        }
        Ok(())
    }

    async fn bloom_exists(&self) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.bloom.is_some())
    }

    async fn bloom_check(&self, item: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .bloom
            .as_ref()
            .map(|b| b.contains(item))
            .unwrap_or(false))
    }

    async fn bloom_add_multi(&self, items: &[String]) -> Result<Vec<bool>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(bloom) = inner.bloom.as_mut() else {
            // Bloom-filter absence: treated as "all URLs new" (§4.1 failure semantics).
            return Ok(vec![true; items.len()]);
        };
        Ok(items.iter().map(|item| !bloom.insert(item)).collect())
    }

    async fn put_visited(&self, record: &VisitedRecord) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .visited
            .insert(record.url_sha256.clone(), record.clone());
        Ok(())
    }

    async fn get_visited(&self, url_sha256: &str) -> Result<Option<VisitedRecord>, StoreError> {
        Ok(self.inner.lock().await.visited.get(url_sha256).cloned())
    }

    async fn acquire_domain_lock(
        &self,
        domain: &str,
        ttl_secs: u64,
    ) -> Result<Option<LockToken>, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = std::time::Instant::now();
        if let Some((_, acquired_at, ttl)) = inner.locks.get(domain) {
            if now.duration_since(*acquired_at) < *ttl {
                return Ok(None);
            }
        }
        let token: String = {
            use rand::Rng;
            rand::thread_rng()
                .sample_iter(&rand::distributions::Alphanumeric)
                .take(24)
                .map(char::from)
                .collect()
        };
        inner.locks.insert(
            domain.to_string(),
            (token.clone(), now, std::time::Duration::from_secs(ttl_secs)),
        );
        Ok(Some(LockToken(token)))
    }

    async fn release_domain_lock(&self, domain: &str, token: &LockToken) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some((held_token, _, _)) = inner.locks.get(domain) {
            if held_token == &token.0 {
                inner.locks.remove(domain);
            }
        }
        Ok(())
    }

    async fn list_domain_locks(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .locks
            .keys()
            .map(|d| format!("lock:domain:{d}"))
            .collect())
    }

    async fn force_clear_domain_lock(&self, domain: &str) -> Result<(), StoreError> {
        self.inner.lock().await.locks.remove(domain);
        Ok(())
    }
}
