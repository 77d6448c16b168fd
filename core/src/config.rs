use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Single-source-of-truth configuration record (§4.6 step 1, §6.5).
///
/// Loaded by the orchestrator from an optional TOML file and overlaid with
/// CLI flags; both binaries and the library itself only ever see this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Path to a newline-separated seed URL file. Required for a new crawl.
    pub seed_file: Option<PathBuf>,

    /// Contact email incorporated into the crawler's User-Agent string.
    pub email: String,

    /// Root directory for frontier files and saved content.
    pub data_dir: PathBuf,

    /// Optional newline-separated list of excluded domains.
    pub exclude_file: Option<PathBuf>,

    /// Number of concurrent fetcher tasks in the orchestrator process.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Number of parser OS processes to spawn.
    #[serde(default = "default_parser_processes")]
    pub parser_processes: usize,

    /// Optional stop condition: total pages fetched.
    pub max_pages: Option<u64>,

    /// Optional stop condition: wall-clock seconds since start.
    pub max_duration_secs: Option<u64>,

    /// If true and the frontier is non-empty, `initialize` leaves state intact.
    #[serde(default)]
    pub resume: bool,

    /// If true, `is_url_allowed` rejects any URL whose domain is not seeded.
    #[serde(default)]
    pub seeded_urls_only: bool,

    /// Coordination store connection.
    pub cs_host: String,
    #[serde(default = "default_cs_port")]
    pub cs_port: u16,
    #[serde(default)]
    pub cs_db: i64,
    pub cs_password: Option<String>,

    /// Soft/hard backpressure thresholds against the fetch handoff queue (§9).
    #[serde(default = "default_soft_backpressure")]
    pub handoff_soft_threshold: usize,
    #[serde(default = "default_hard_backpressure")]
    pub handoff_hard_threshold: usize,

    /// Bloom filter sizing (§3.1, §9): target capacity and false-positive rate.
    #[serde(default = "default_bloom_capacity")]
    pub bloom_capacity: u64,
    #[serde(default = "default_bloom_fpr")]
    pub bloom_fpr: f64,

    /// Cooperative tasks per parser process draining the handoff queue (§4.5).
    #[serde(default = "default_parser_concurrency")]
    pub parser_concurrency: usize,
}

fn default_max_workers() -> usize {
    500
}

fn default_parser_processes() -> usize {
    2
}

fn default_parser_concurrency() -> usize {
    50
}

fn default_cs_port() -> u16 {
    6379
}

fn default_soft_backpressure() -> usize {
    5_000
}

fn default_hard_backpressure() -> usize {
    20_000
}

fn default_bloom_capacity() -> u64 {
    160_000_000
}

fn default_bloom_fpr() -> f64 {
    0.001
}

/// Minimum inter-fetch interval for any single domain (glossary: MIN_CRAWL_DELAY).
pub const MIN_CRAWL_DELAY_SECS: u64 = 70;

/// TTL on a per-domain write lock (§3.1, §9).
pub const DOMAIN_LOCK_TTL_SECS: u64 = 60;

/// TTL on a cached robots.txt entry in the Coordination Store (§4.2.1 tier 3).
pub const ROBOTS_CACHE_TTL_SECS: i64 = 24 * 60 * 60;

/// Cap on a cached robots.txt body (§3.1).
pub const ROBOTS_TXT_MAX_CHARS: usize = 200_000;

impl CrawlerConfig {
    /// Loads a config from a TOML file. Missing optional fields fall back
    /// to the `#[serde(default)]` values above.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validates the configuration options required for a brand-new crawl.
    /// Configuration errors are fatal (§7): callers should exit before
    /// spawning any worker or parser process.
    pub fn validate_new_crawl(&self) -> Result<(), ConfigError> {
        if !self.resume && self.seed_file.is_none() {
            return Err(ConfigError::MissingRequired("seed_file"));
        }
        if self.email.trim().is_empty() {
            return Err(ConfigError::MissingRequired("email"));
        }
        Ok(())
    }

    /// User-Agent string used by the Fetcher and Politeness Enforcer.
    pub fn user_agent(&self) -> String {
        format!(
            "Mozilla/5.0 (compatible; PoliteCrawler/1.0; +mailto:{})",
            self.email
        )
    }

    /// Redis connection URL assembled from the discrete `cs_*` fields.
    pub fn redis_url(&self) -> String {
        match &self.cs_password {
            Some(pw) => format!(
                "redis://:{pw}@{host}:{port}/{db}",
                pw = pw,
                host = self.cs_host,
                port = self.cs_port,
                db = self.cs_db
            ),
            None => format!(
                "redis://{host}:{port}/{db}",
                host = self.cs_host,
                port = self.cs_port,
                db = self.cs_db
            ),
        }
    }
}

/// Reads a newline-separated list of non-empty, non-comment lines.
/// Used for both the seed file and the exclusion file (§6.5).
pub fn read_line_list(path: &std::path::Path) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
