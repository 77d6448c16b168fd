//! Redis-backed `CoordinationStore`. Uses a multiplexed, auto-reconnecting
//! connection manager (`redis::aio::ConnectionManager`) so that every
//! `&self` method can issue commands without holding its own lock — the
//! connection itself is cheap to clone and safe for concurrent use.
//!
//! The approximate-membership filter is delegated to RedisBloom's
//! `BF.*` commands. Any Coordination Store implementation exposing that
//! command family satisfies the contract; plain Redis without the
//! RedisBloom module does not, and `bloom_reserve` will surface that as a
//! `StoreError::Command`.

use async_trait::async_trait;
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::StoreError;
use crate::store::{CoordinationStore, DomainRecord, LockToken, VisitedRecord};

const DOMAIN_LOCK_RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    fn domain_key(domain: &str) -> String {
        format!("domain:{domain}")
    }

    fn lock_key(domain: &str) -> String {
        format!("lock:domain:{domain}")
    }

    fn visited_key(url_sha256: &str) -> String {
        format!("visited:{url_sha256}")
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn get_schema_version(&self) -> Result<Option<u32>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get("schema_version").await?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    async fn set_schema_version_if_absent(&self, version: u32) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: bool = conn
            .set_nx("schema_version", version.to_string())
            .await?;
        Ok(())
    }

    async fn get_domain(&self, domain: &str) -> Result<Option<DomainRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let key = Self::domain_key(domain);
        let fields: Vec<(String, String)> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let mut record = DomainRecord::new(String::new());
        for (field, value) in fields {
            match field.as_str() {
                "file_path" => record.file_path = value,
                "frontier_offset" => record.frontier_offset = value.parse().unwrap_or(0),
                "frontier_size" => record.frontier_size = value.parse().unwrap_or(0),
                "next_fetch_time" => record.next_fetch_time = value.parse().unwrap_or(0),
                "robots_txt" => record.robots_txt = value,
                "robots_expires" => record.robots_expires = value.parse().unwrap_or(0),
                "is_excluded" => record.is_excluded = value == "1",
                "is_seeded" => record.is_seeded = value == "1",
                _ => {}
            }
        }
        Ok(Some(record))
    }

    async fn put_domain(&self, domain: &str, record: &DomainRecord) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = Self::domain_key(domain);
        let pairs: Vec<(&str, String)> = vec![
            ("file_path", record.file_path.clone()),
            ("frontier_offset", record.frontier_offset.to_string()),
            ("frontier_size", record.frontier_size.to_string()),
            ("next_fetch_time", record.next_fetch_time.to_string()),
            ("robots_txt", record.robots_txt.clone()),
            ("robots_expires", record.robots_expires.to_string()),
            ("is_excluded", if record.is_excluded { "1" } else { "0" }.to_string()),
            ("is_seeded", if record.is_seeded { "1" } else { "0" }.to_string()),
        ];
        let _: () = conn.hset_multiple(&key, &pairs).await?;
        Ok(())
    }

    async fn delete_all_domains(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let keys = scan_keys(&mut conn, "domain:*").await?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }
        Ok(())
    }

    async fn queue_push_domain(&self, domain: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.rpush("domains:queue", domain).await?;
        Ok(())
    }

    async fn queue_pop_domain(&self) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let domain: Option<String> = conn.lpop("domains:queue", None).await?;
        Ok(domain)
    }

    async fn queue_len(&self) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen("domains:queue").await?;
        Ok(len)
    }

    async fn queue_clear(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del("domains:queue").await?;
        Ok(())
    }

    async fn handoff_push(&self, payload_json: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.rpush("fetch:queue", payload_json).await?;
        Ok(())
    }

    async fn handoff_pop(&self) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.lpop("fetch:queue", None).await?;
        Ok(payload)
    }

    async fn handoff_len(&self) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen("fetch:queue").await?;
        Ok(len)
    }

    async fn bloom_reserve(&self, capacity: u64, fpr: f64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let exists = self.bloom_exists().await?;
        if exists {
            return Ok(());
        }
        let result: redis::RedisResult<String> = redis::cmd("BF.RESERVE")
            .arg("seen:bloom")
            .arg(fpr)
            .arg(capacity)
            .query_async(&mut conn)
            .await;
        match result {
            Ok(_) => {
                tracing::info!(capacity, fpr, "created seen-set bloom filter");
                Ok(())
            }
            Err(e) => Err(StoreError::Command(e.to_string())),
        }
    }

    async fn bloom_exists(&self) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists("seen:bloom").await?;
        Ok(exists)
    }

    async fn bloom_check(&self, item: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let present: bool = redis::cmd("BF.EXISTS")
            .arg("seen:bloom")
            .arg(item)
            .query_async(&mut conn)
            .await?;
        Ok(present)
    }

    async fn bloom_add_multi(&self, items: &[String]) -> Result<Vec<bool>, StoreError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("BF.MADD");
        cmd.arg("seen:bloom");
        for item in items {
            cmd.arg(item);
        }
        let flags: Vec<i64> = cmd.query_async(&mut conn).await?;
        Ok(flags.into_iter().map(|f| f != 0).collect())
    }

    async fn put_visited(&self, record: &VisitedRecord) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = Self::visited_key(&record.url_sha256);
        let pairs: Vec<(&str, String)> = vec![
            ("url", record.url.clone()),
            ("url_sha256", record.url_sha256.clone()),
            ("domain", record.domain.clone()),
            (
                "status_code",
                record.status_code.map(|c| c.to_string()).unwrap_or_default(),
            ),
            ("fetched_at", record.fetched_at.to_string()),
            ("content_path", record.content_path.clone().unwrap_or_default()),
            ("content_hash", record.content_hash.clone().unwrap_or_default()),
            ("redirected_to", record.redirected_to.clone().unwrap_or_default()),
            ("error", record.error.clone().unwrap_or_default()),
        ];
        let _: () = conn.hset_multiple(&key, &pairs).await?;
        Ok(())
    }

    async fn get_visited(&self, url_sha256: &str) -> Result<Option<VisitedRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let key = Self::visited_key(url_sha256);
        let fields: Vec<(String, String)> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let mut map = std::collections::HashMap::new();
        for (k, v) in fields {
            map.insert(k, v);
        }
        let non_empty = |k: &str| map.get(k).filter(|v| !v.is_empty()).cloned();
        Ok(Some(VisitedRecord {
            url: map.get("url").cloned().unwrap_or_default(),
            url_sha256: map.get("url_sha256").cloned().unwrap_or_default(),
            domain: map.get("domain").cloned().unwrap_or_default(),
            status_code: non_empty("status_code").and_then(|v| v.parse().ok()),
            fetched_at: map.get("fetched_at").and_then(|v| v.parse().ok()).unwrap_or(0),
            content_path: non_empty("content_path"),
            content_hash: non_empty("content_hash"),
            redirected_to: non_empty("redirected_to"),
            error: non_empty("error"),
        }))
    }

    async fn acquire_domain_lock(
        &self,
        domain: &str,
        ttl_secs: u64,
    ) -> Result<Option<LockToken>, StoreError> {
        let mut conn = self.conn.clone();
        let token: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        let key = Self::lock_key(domain);
        let set: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(set.map(|_| LockToken(token)))
    }

    async fn release_domain_lock(&self, domain: &str, token: &LockToken) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = Self::lock_key(domain);
        let script = redis::Script::new(DOMAIN_LOCK_RELEASE_SCRIPT);
        let _: i64 = script
            .key(key)
            .arg(&token.0)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_domain_locks(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        scan_keys(&mut conn, "lock:domain:*").await
    }

    async fn force_clear_domain_lock(&self, domain: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = Self::lock_key(domain);
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// `SCAN`-based glob enumeration (§6.1's "Key enumeration by glob"), safer
/// than `KEYS` under concurrent load even though the lock sweep only runs
/// once at startup.
async fn scan_keys(conn: &mut ConnectionManager, pattern: &str) -> Result<Vec<String>, StoreError> {
    let mut cursor: u64 = 0;
    let mut found = Vec::new();
    loop {
        let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(200)
            .query_async(conn)
            .await?;
        found.extend(batch);
        if next_cursor == 0 {
            break;
        }
        cursor = next_cursor;
    }
    Ok(found)
}
