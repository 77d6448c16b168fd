//! The Politeness Enforcer (§4.2): robots.txt handling, crawl-delay
//! accounting, exclusion lists, and the three-tier robots cache (§4.2.1).

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::config::{CrawlerConfig, ROBOTS_CACHE_TTL_SECS, ROBOTS_TXT_MAX_CHARS};
use crate::domain::extract_domain;
use crate::error::PolitenessError;
use crate::fetcher::Fetcher;
use crate::robots::RobotsRules;
use crate::store::{CoordinationStore, DomainRecord};

const ROBOTS_CACHE_CAPACITY: usize = 500_000;
const EXCLUSION_CACHE_CAPACITY: usize = 100_000;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct PolitenessEnforcer {
    store: Arc<dyn CoordinationStore>,
    fetcher: Arc<dyn Fetcher>,
    user_agent: String,
    min_crawl_delay_secs: u64,
    seeded_urls_only: bool,
    robots_cache: Mutex<LruCache<String, Arc<RobotsRules>>>,
    /// Caches the final domain-level allow/disallow decision (exclusion
    /// list membership combined with the seeded-urls-only gate), avoiding
    /// a Coordination Store round trip on the hot path (§4.2.1).
    domain_block_cache: Mutex<LruCache<String, bool>>,
}

impl PolitenessEnforcer {
    pub fn new(store: Arc<dyn CoordinationStore>, fetcher: Arc<dyn Fetcher>, config: &CrawlerConfig) -> Self {
        Self {
            store,
            fetcher,
            user_agent: config.user_agent(),
            min_crawl_delay_secs: crate::config::MIN_CRAWL_DELAY_SECS,
            seeded_urls_only: config.seeded_urls_only,
            robots_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(ROBOTS_CACHE_CAPACITY).unwrap(),
            )),
            domain_block_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(EXCLUSION_CACHE_CAPACITY).unwrap(),
            )),
        }
    }

    /// Loads the exclusion file (if any), marking each listed domain as
    /// excluded in the Coordination Store (§4.2 `initialize`).
    pub async fn initialize(&self, exclude_file: Option<&std::path::Path>) -> Result<(), PolitenessError> {
        let Some(path) = exclude_file else {
            return Ok(());
        };
        let domains = crate::config::read_line_list(path).map_err(|e| {
            tracing::warn!(error = %e, "failed to read exclusion file; continuing with no exclusions");
            PolitenessError::Fetch(e.to_string())
        })?;

        for domain in domains {
            let domain = domain.to_ascii_lowercase();
            let mut record = self
                .store
                .get_domain(&domain)
                .await?
                .unwrap_or_else(|| DomainRecord::new(String::new()));
            record.is_excluded = true;
            self.store.put_domain(&domain, &record).await?;
        }
        Ok(())
    }

    /// §4.2 `is_url_allowed`.
    pub async fn is_url_allowed(&self, url: &str) -> bool {
        let Some(domain) = extract_domain(url) else {
            return true;
        };

        if self.domain_blocked(&domain).await {
            return false;
        }

        let rules = match self.robots_rules(&domain).await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::debug!(domain, error = %e, "robots lookup failed; treating as allow-all");
                return true;
            }
        };

        let path = url::Url::parse(url)
            .map(|u| {
                let mut p = u.path().to_string();
                if let Some(q) = u.query() {
                    p.push('?');
                    p.push_str(q);
                }
                p
            })
            .unwrap_or_else(|_| "/".to_string());

        rules.is_allowed(&self.user_agent, &path)
    }

    async fn domain_blocked(&self, domain: &str) -> bool {
        if let Some(cached) = self.domain_block_cache.lock().await.get(domain).copied() {
            return cached;
        }

        let blocked = match self.store.get_domain(domain).await {
            Ok(Some(record)) => {
                record.is_excluded || (self.seeded_urls_only && !record.is_seeded)
            }
            Ok(None) => self.seeded_urls_only,
            Err(e) => {
                // CS errors on exclusion lookup default to "not excluded" (§4.2 failure semantics).
                tracing::warn!(domain, error = %e, "coordination store error checking exclusion; defaulting to allowed");
                false
            }
        };

        self.domain_block_cache
            .lock()
            .await
            .put(domain.to_string(), blocked);
        blocked
    }

    /// §4.2.1: three-tier robots.txt cache.
    async fn robots_rules(&self, domain: &str) -> Result<Arc<RobotsRules>, PolitenessError> {
        if let Some(rules) = self.robots_cache.lock().await.get(domain) {
            return Ok(rules.clone());
        }

        if let Some(record) = self.store.get_domain(domain).await? {
            if record.robots_expires > now() {
                let rules = Arc::new(RobotsRules::parse(&record.robots_txt));
                self.robots_cache
                    .lock()
                    .await
                    .put(domain.to_string(), rules.clone());
                return Ok(rules);
            }
        }

        let body = self.fetch_robots_body(domain).await;
        let mut record = self
            .store
            .get_domain(domain)
            .await?
            .unwrap_or_else(|| DomainRecord::new(String::new()));
        record.robots_txt = body.clone();
        record.robots_expires = now() + ROBOTS_CACHE_TTL_SECS;
        self.store.put_domain(domain, &record).await?;

        let rules = Arc::new(RobotsRules::parse(&body));
        self.robots_cache
            .lock()
            .await
            .put(domain.to_string(), rules.clone());
        Ok(rules)
    }

    /// Tries `https://{domain}/robots.txt`, falling back to `http://` on
    /// any non-200-with-body response. NUL bytes and parser errors are
    /// both folded into an empty ("allow all") body (§4.2.1).
    async fn fetch_robots_body(&self, domain: &str) -> String {
        for scheme in ["https", "http"] {
            let url = format!("{scheme}://{domain}/robots.txt");
            let outcome = self.fetcher.fetch(&url, true).await;
            if outcome.status_code == 200 {
                if let Some(mut body) = outcome.text_content {
                    if body.contains('\0') {
                        body = String::new();
                    }
                    body.truncate(body.char_indices().nth(ROBOTS_TXT_MAX_CHARS).map(|(i, _)| i).unwrap_or(body.len()));
                    return body;
                }
            }
        }
        String::new()
    }

    /// §4.2 `can_fetch_domain_now`.
    pub async fn can_fetch_domain_now(&self, domain: &str) -> bool {
        match self.store.get_domain(domain).await {
            Ok(Some(record)) => now() >= record.next_fetch_time,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(domain, error = %e, "coordination store error checking next_fetch_time; allowing fetch");
                true
            }
        }
    }

    /// §4.2 `record_fetch_attempt`.
    pub async fn record_fetch_attempt(&self, domain: &str) -> Result<(), PolitenessError> {
        let delay = self.get_crawl_delay(domain).await;
        let mut record = self
            .store
            .get_domain(domain)
            .await?
            .unwrap_or_else(|| DomainRecord::new(String::new()));
        record.next_fetch_time = now() + delay as i64;
        self.store.put_domain(domain, &record).await?;
        Ok(())
    }

    /// §4.2 `get_crawl_delay`: `max(rule_delay, MIN_CRAWL_DELAY)`.
    pub async fn get_crawl_delay(&self, domain: &str) -> u64 {
        let rule_delay = match self.robots_rules(domain).await {
            Ok(rules) => rules.crawl_delay(&self.user_agent).unwrap_or(0.0),
            Err(_) => 0.0,
        };
        (rule_delay.ceil() as u64).max(self.min_crawl_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchOutcome;
    use crate::store::memory_store::MemoryStore;

    struct StubFetcher {
        robots_body: String,
    }

    #[async_trait::async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str, _is_robots_txt: bool) -> FetchOutcome {
            FetchOutcome {
                initial_url: url.to_string(),
                final_url: url.to_string(),
                status_code: if url.starts_with("https") { 200 } else { 404 },
                text_content: Some(self.robots_body.clone()),
                content_type: Some("text/plain".to_string()),
                error: None,
            }
        }
    }

    fn test_config() -> CrawlerConfig {
        CrawlerConfig {
            seed_file: None,
            email: "test@example.com".to_string(),
            data_dir: std::path::PathBuf::from("/tmp/test"),
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

    #[tokio::test]
    async fn disallowed_path_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(StubFetcher {
            robots_body: "User-agent: *\nDisallow: /private\n".to_string(),
        });
        let pe = PolitenessEnforcer::new(store, fetcher, &test_config());

        assert!(!pe.is_url_allowed("http://a.example/private/x").await);
        assert!(pe.is_url_allowed("http://a.example/public").await);
    }

    #[tokio::test]
    async fn crawl_delay_floor_is_enforced() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(StubFetcher {
            robots_body: "User-agent: *\nCrawl-delay: 1\n".to_string(),
        });
        let pe = PolitenessEnforcer::new(store, fetcher, &test_config());
        let delay = pe.get_crawl_delay("a.example").await;
        assert_eq!(delay, crate::config::MIN_CRAWL_DELAY_SECS);
    }

    #[tokio::test]
    async fn excluded_domain_is_never_allowed() {
        let store = Arc::new(MemoryStore::new());
        let mut record = DomainRecord::new(String::new());
        record.is_excluded = true;
        store.put_domain("blocked.example", &record).await.unwrap();
        let fetcher = Arc::new(StubFetcher {
            robots_body: String::new(),
        });
        let pe = PolitenessEnforcer::new(store, fetcher, &test_config());
        assert!(!pe.is_url_allowed("http://blocked.example/x").await);
    }
}
