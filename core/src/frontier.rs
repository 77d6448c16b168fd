//! The Frontier Manager (§4.1): adds URLs to per-domain Frontier Files,
//! hands out the next eligible URL, maintains the domain-ready queue, and
//! owns the per-domain write locks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use md5::{Digest, Md5};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;

use crate::config::{CrawlerConfig, DOMAIN_LOCK_TTL_SECS};
use crate::domain::{extract_domain, has_non_text_extension, normalize_url};
use crate::error::FrontierError;
use crate::politeness::PolitenessEnforcer;
use crate::store::{CoordinationStore, DomainRecord, LockToken};

const WRITE_LOCK_MAX_RETRIES: u32 = 5;
const WRITE_LOCK_BASE_BACKOFF_MS: u64 = 50;

/// A single URL handed out by `get_next_url` (§4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextUrl {
    pub url: String,
    pub domain: String,
    pub depth: u32,
}

pub struct FrontierManager {
    store: Arc<dyn CoordinationStore>,
    politeness: Arc<PolitenessEnforcer>,
    data_dir: PathBuf,
    bloom_capacity: u64,
    bloom_fpr: f64,
    /// Process-local read locks (§3.1): serialize concurrent readers of the
    /// same domain's frontier file *within this process*. Cross-process
    /// readers are intentionally not mutually exclusive (§5). Modeled on
    /// the teacher's `Arc<Mutex<HashMap<...>>>` bookkeeping maps.
    read_locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FrontierManager {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        politeness: Arc<PolitenessEnforcer>,
        config: &CrawlerConfig,
    ) -> Self {
        Self {
            store,
            politeness,
            data_dir: config.data_dir.clone(),
            bloom_capacity: config.bloom_capacity,
            bloom_fpr: config.bloom_fpr,
            read_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// §4.1 `initialize`.
    pub async fn initialize(&self, resume: bool, seed_file: Option<&Path>) -> Result<(), FrontierError> {
        if !self.store.bloom_exists().await? {
            self.store
                .bloom_reserve(self.bloom_capacity, self.bloom_fpr)
                .await?;
        }

        if resume && self.store.queue_len().await? > 0 {
            tracing::info!("resuming: frontier non-empty, leaving state intact");
            return Ok(());
        }

        tracing::info!("initializing fresh crawl: wiping domain records and frontier files");
        self.reset_all().await?;

        if let Some(path) = seed_file {
            let seeds = crate::config::read_line_list(path).map_err(|e| FrontierError::Io {
                domain: "<seed file>".to_string(),
                source: e,
            })?;

            // Mark every seed domain `is_seeded` *before* calling `add_urls`:
            // the add path runs the seed URLs through the same politeness
            // check as any other URL, and `seeded_urls_only` mode treats an
            // unseeded domain as blocked (politeness.rs). Setting the flag
            // afterward would filter every seed out of its own frontier.
            for seed in &seeds {
                if let Some(domain) = normalize_url(seed).as_deref().and_then(extract_domain) {
                    let mut record = self
                        .store
                        .get_domain(&domain)
                        .await?
                        .unwrap_or_else(|| DomainRecord::new(self.frontier_file_path(&domain)));
                    record.is_seeded = true;
                    self.store.put_domain(&domain, &record).await?;
                }
            }

            let added = self.add_urls(&seeds, 0).await?;
            tracing::info!(seed_count = seeds.len(), added, "loaded seed URLs");
        }

        Ok(())
    }

    /// Wipes domain records, the domain-ready queue, and all frontier files
    /// (§3.3 "destroyed only by explicit new-crawl reset").
    pub async fn reset_all(&self) -> Result<(), FrontierError> {
        self.store.delete_all_domains().await?;
        self.store.queue_clear().await?;
        let frontiers_dir = self.data_dir.join("frontiers");
        if frontiers_dir.exists() {
            tokio::fs::remove_dir_all(&frontiers_dir)
                .await
                .map_err(|e| FrontierError::Io {
                    domain: "<frontiers dir>".to_string(),
                    source: e,
                })?;
        }
        Ok(())
    }

    pub async fn is_empty(&self) -> Result<bool, FrontierError> {
        Ok(self.store.queue_len().await? == 0)
    }

    /// §6.3: `frontiers/{first-2-hex-of-md5(domain)}/{domain}.frontier`.
    fn frontier_file_path(&self, domain: &str) -> String {
        let digest = Md5::digest(domain.as_bytes());
        let shard = format!("{:02x}", digest[0]);
        self.data_dir
            .join("frontiers")
            .join(&shard)
            .join(format!("{domain}.frontier"))
            .to_string_lossy()
            .to_string()
    }

    fn read_lock_for(&self, domain: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.read_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// §4.1 `add_urls`.
    pub async fn add_urls(&self, urls: &[String], depth: u32) -> Result<usize, FrontierError> {
        // Normalize and filter (§4.1.1): reject empties, malformed, and
        // non-text extensions.
        let mut by_domain: std::collections::HashMap<String, Vec<String>> =
            std::collections::HashMap::new();
        for raw in urls {
            let Some(normalized) = normalize_url(raw) else {
                continue;
            };
            if has_non_text_extension(&normalized) {
                continue;
            }
            let Some(domain) = extract_domain(&normalized) else {
                continue;
            };
            by_domain.entry(domain).or_default().push(normalized);
        }

        if by_domain.is_empty() {
            return Ok(0);
        }

        // Bulk-test candidates against the seen set, keep only not-seen.
        let mut candidates: Vec<String> = by_domain.values().flatten().cloned().collect();
        candidates.dedup();
        let mut not_seen = std::collections::HashSet::new();
        for chunk in candidates.chunks(1000) {
            for (url, seen) in chunk.iter().zip(self.bloom_check_batch(chunk).await?) {
                if !seen {
                    not_seen.insert(url.clone());
                }
            }
        }

        let mut total_added = 0usize;
        for (domain, domain_urls) in by_domain {
            let mut surviving: Vec<String> = Vec::new();
            for url in domain_urls {
                if !not_seen.contains(&url) {
                    continue;
                }
                if !self.politeness.is_url_allowed(&url).await {
                    continue;
                }
                surviving.push(url);
            }
            if surviving.is_empty() {
                continue;
            }

            match self.add_urls_for_domain(&domain, surviving, depth).await {
                Ok(added) => total_added += added,
                Err(FrontierError::LockContention(_)) => {
                    tracing::warn!(domain, "write-lock contention exceeded retry budget; skipping domain for this call");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(domain, error = %e, "failed to append to frontier; leaving coordination store unchanged");
                    continue;
                }
            }
        }

        Ok(total_added)
    }

    async fn bloom_check_batch(&self, items: &[String]) -> Result<Vec<bool>, FrontierError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.store.bloom_check(item).await?);
        }
        Ok(out)
    }

    async fn add_urls_for_domain(
        &self,
        domain: &str,
        candidates: Vec<String>,
        depth: u32,
    ) -> Result<usize, FrontierError> {
        let token = self.acquire_write_lock_with_retry(domain).await?;
        let result = self.append_locked(domain, candidates, depth).await;
        // Best-effort release: an expired lock will be reclaimed by TTL
        // regardless, so a release failure here is not escalated.
        if let Err(e) = self.store.release_domain_lock(domain, &token).await {
            tracing::debug!(domain, error = %e, "failed to release domain write lock (will expire via TTL)");
        }
        result
    }

    async fn append_locked(
        &self,
        domain: &str,
        candidates: Vec<String>,
        depth: u32,
    ) -> Result<usize, FrontierError> {
        // The seen-set's add-and-check is the authoritative "was new"
        // signal (§9 open question, resolved conservatively): the bulk
        // pre-check above is only an optimization to avoid taking the
        // write lock for batches that turn out to be entirely duplicates.
        let add_flags = self.store.bloom_add_multi(&candidates).await?;
        let new_urls: Vec<String> = candidates
            .into_iter()
            .zip(add_flags)
            .filter_map(|(url, is_new)| is_new.then_some(url))
            .collect();
        if new_urls.is_empty() {
            return Ok(0);
        }

        let file_path = self.frontier_file_path(domain);
        if let Some(parent) = Path::new(&file_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FrontierError::Io {
                    domain: domain.to_string(),
                    source: e,
                })?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await
            .map_err(|e| FrontierError::Io {
                domain: domain.to_string(),
                source: e,
            })?;

        let mut buf = String::new();
        for url in &new_urls {
            buf.push_str(url);
            buf.push('|');
            buf.push_str(&depth.to_string());
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| FrontierError::Io {
                domain: domain.to_string(),
                source: e,
            })?;
        file.flush().await.map_err(|e| FrontierError::Io {
            domain: domain.to_string(),
            source: e,
        })?;

        let new_size = file
            .metadata()
            .await
            .map_err(|e| FrontierError::Io {
                domain: domain.to_string(),
                source: e,
            })?
            .len();

        let mut record = self
            .store
            .get_domain(domain)
            .await?
            .unwrap_or_else(|| DomainRecord::new(file_path.clone()));
        let is_seeded = record.is_seeded;
        let is_excluded = record.is_excluded;
        record.file_path = file_path;
        record.frontier_size = new_size;
        // frontier_offset stays at its prior value (initialized to 0 if unset).
        record.is_seeded = is_seeded;
        record.is_excluded = is_excluded;
        self.store.put_domain(domain, &record).await?;
        self.store.queue_push_domain(domain).await?;

        Ok(new_urls.len())
    }

    async fn acquire_write_lock_with_retry(&self, domain: &str) -> Result<LockToken, FrontierError> {
        let mut attempt = 0u32;
        loop {
            if let Some(token) = self
                .store
                .acquire_domain_lock(domain, DOMAIN_LOCK_TTL_SECS)
                .await?
            {
                return Ok(token);
            }
            attempt += 1;
            if attempt >= WRITE_LOCK_MAX_RETRIES {
                return Err(FrontierError::LockContention(domain.to_string()));
            }
            let backoff = WRITE_LOCK_BASE_BACKOFF_MS * 2u64.pow(attempt);
            let jitter = rand::random::<u64>() % WRITE_LOCK_BASE_BACKOFF_MS;
            tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
        }
    }

    /// §4.1 `get_next_url`.
    pub async fn get_next_url(&self) -> Result<Option<NextUrl>, FrontierError> {
        let Some(domain) = self.store.queue_pop_domain().await? else {
            return Ok(None);
        };

        if !self.politeness.can_fetch_domain_now(&domain).await {
            self.store.queue_push_domain(&domain).await?;
            return Ok(None);
        }

        match self.read_next_usable_url(&domain).await {
            Ok(Some((url, depth))) => {
                if let Err(e) = self.politeness.record_fetch_attempt(&domain).await {
                    tracing::warn!(domain, error = %e, "failed to record fetch attempt; politeness delay not updated");
                }
                self.store.queue_push_domain(&domain).await?;
                Ok(Some(NextUrl { url, domain, depth }))
            }
            Ok(None) => {
                // File yielded no usable URL this call; the domain may
                // still gain entries later via add_urls, which re-enqueues
                // it, so we simply drop it here rather than re-enqueuing
                // immediately (that would spin).
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(domain, error = %e, "frontier read error; domain will be retried");
                self.store.queue_push_domain(&domain).await?;
                Ok(None)
            }
        }
    }

    /// §4.1.2: reads from a domain's frontier file, skipping disallowed or
    /// non-text entries within the same read-lock session until a usable
    /// URL is found or the file is exhausted.
    async fn read_next_usable_url(&self, domain: &str) -> Result<Option<(String, u32)>, FrontierError> {
        let lock = self.read_lock_for(domain);
        let _guard = lock.lock().await;

        let Some(record) = self.store.get_domain(domain).await? else {
            return Ok(None);
        };
        if record.frontier_offset >= record.frontier_size {
            return Ok(None);
        }

        let mut file = tokio::fs::File::open(&record.file_path)
            .await
            .map_err(|e| FrontierError::Io {
                domain: domain.to_string(),
                source: e,
            })?;
        file.seek(std::io::SeekFrom::Start(record.frontier_offset))
            .await
            .map_err(|e| FrontierError::Io {
                domain: domain.to_string(),
                source: e,
            })?;

        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut offset = record.frontier_offset;
        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await.map_err(|e| FrontierError::Io {
                domain: domain.to_string(),
                source: e,
            })?;
            if bytes_read == 0 {
                // EOF without a hit: persist the advanced offset.
                self.advance_offset(domain, record.frontier_size).await?;
                return Ok(None);
            }

            offset += bytes_read as u64;
            let offset_after = offset;
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                continue;
            }

            let Some((url, depth_str)) = trimmed.split_once('|') else {
                // Data-shape error (§7): skip the malformed line, offset already advanced.
                self.advance_offset(domain, offset_after).await?;
                continue;
            };
            let depth: u32 = depth_str.parse().unwrap_or(0);

            if has_non_text_extension(url) {
                self.advance_offset(domain, offset_after).await?;
                continue;
            }

            if !self.politeness.is_url_allowed(url).await {
                self.advance_offset(domain, offset_after).await?;
                continue;
            }

            self.advance_offset(domain, offset_after).await?;
            return Ok(Some((url.to_string(), depth)));
        }
    }

    async fn advance_offset(&self, domain: &str, new_offset: u64) -> Result<(), FrontierError> {
        let mut record = match self.store.get_domain(domain).await? {
            Some(r) => r,
            None => return Ok(()),
        };
        record.frontier_offset = record.frontier_offset.max(new_offset).min(record.frontier_size);
        self.store.put_domain(domain, &record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FetchOutcome, Fetcher};
    use crate::store::memory_store::MemoryStore;

    struct AllowAllFetcher;

    #[async_trait::async_trait]
    impl Fetcher for AllowAllFetcher {
        async fn fetch(&self, url: &str, _is_robots_txt: bool) -> FetchOutcome {
            FetchOutcome {
                initial_url: url.to_string(),
                final_url: url.to_string(),
                status_code: 404,
                text_content: None,
                content_type: None,
                error: Some("no robots.txt".to_string()),
            }
        }
    }

    fn test_config(dir: &std::path::Path) -> CrawlerConfig {
        CrawlerConfig {
            seed_file: None,
            email: "test@example.com".to_string(),
            data_dir: dir.to_path_buf(),
            exclude_file: None,
            max_workers: 10,
            parser_processes: 1,
            max_pages: None,
            max_duration_secs: None,
            resume: false,
            seeded_urls_only: false,
            cs_host: "localhost".to_string(),
            cs_port: 6379,
            cs_db: 0,
            cs_password: None,
            handoff_soft_threshold: 5000,
            handoff_hard_threshold: 20000,
            bloom_capacity: 1000,
            bloom_fpr: 0.01,
            parser_concurrency: 4,
        }
    }

    async fn new_manager(dir: &std::path::Path) -> FrontierManager {
        let store = Arc::new(MemoryStore::new());
        store.bloom_reserve(1000, 0.01).await.unwrap();
        let config = test_config(dir);
        let politeness = Arc::new(PolitenessEnforcer::new(
            store.clone(),
            Arc::new(AllowAllFetcher),
            &config,
        ));
        FrontierManager::new(store, politeness, &config)
    }

    #[tokio::test]
    async fn add_then_get_next_round_trips_a_url() {
        let dir = tempfile::tempdir().unwrap();
        let fm = new_manager(dir.path()).await;

        let added = fm
            .add_urls(&["https://a.example/page1".to_string()], 0)
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert!(!fm.is_empty().await.unwrap());

        let next = fm.get_next_url().await.unwrap().expect("a URL should be ready");
        assert_eq!(next.url, "https://a.example/page1");
        assert_eq!(next.domain, "a.example");
        assert_eq!(next.depth, 0);
    }

    #[tokio::test]
    async fn duplicate_urls_are_added_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let fm = new_manager(dir.path()).await;

        let urls = vec![
            "https://a.example/page1".to_string(),
            "https://a.example/page1".to_string(),
        ];
        let added = fm.add_urls(&urls, 0).await.unwrap();
        assert_eq!(added, 1);

        let added_again = fm
            .add_urls(&["https://a.example/page1".to_string()], 0)
            .await
            .unwrap();
        assert_eq!(added_again, 0);
    }

    #[tokio::test]
    async fn non_text_extensions_never_reach_the_frontier_file() {
        let dir = tempfile::tempdir().unwrap();
        let fm = new_manager(dir.path()).await;

        let added = fm
            .add_urls(&["https://a.example/photo.jpg".to_string()], 0)
            .await
            .unwrap();
        assert_eq!(added, 0);
        assert!(fm.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn reset_all_clears_queue_and_frontier_files() {
        let dir = tempfile::tempdir().unwrap();
        let fm = new_manager(dir.path()).await;
        fm.add_urls(&["https://a.example/page1".to_string()], 0)
            .await
            .unwrap();
        assert!(!fm.is_empty().await.unwrap());

        fm.reset_all().await.unwrap();
        assert!(fm.is_empty().await.unwrap());
        assert!(!dir.path().join("frontiers").exists());
    }
}
