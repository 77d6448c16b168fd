//! Command-line flags layered on top of an optional TOML config file
//! (§4.6 step 1, §6.5), matching the split the teacher's `sumi-ripple`
//! binary uses between a config path and override flags.

use std::path::PathBuf;

use clap::Parser;
use webcrawler_core::config::ConfigError;
use webcrawler_core::CrawlerConfig;

#[derive(Parser, Debug)]
#[command(name = "webcrawler-orchestrator")]
#[command(about = "Process orchestrator for the polite crawler core", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file. Values here are overridden by
    /// any CLI flag below that is explicitly set.
    #[arg(long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to a newline-separated seed URL file.
    #[arg(long)]
    pub seed_file: Option<PathBuf>,

    /// Contact email incorporated into the User-Agent.
    #[arg(long)]
    pub email: Option<String>,

    /// Root directory for frontier files and saved content.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Optional newline-separated list of excluded domains.
    #[arg(long)]
    pub exclude_file: Option<PathBuf>,

    /// Number of concurrent fetcher tasks.
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Number of parser OS processes to spawn.
    #[arg(long)]
    pub parser_processes: Option<usize>,

    /// Stop once this many pages have been fetched.
    #[arg(long)]
    pub max_pages: Option<u64>,

    /// Stop after this many seconds of wall-clock runtime.
    #[arg(long)]
    pub max_duration_secs: Option<u64>,

    /// Resume an existing crawl instead of wiping frontier state.
    #[arg(long, conflicts_with = "reset")]
    pub resume: bool,

    /// Wipe the Coordination Store and frontier files before starting.
    #[arg(long, conflicts_with = "resume")]
    pub reset: bool,

    /// Disallow any URL whose domain was not explicitly seeded.
    #[arg(long)]
    pub seeded_urls_only: bool,

    /// Coordination store (Redis) host.
    #[arg(long)]
    pub cs_host: Option<String>,

    /// Coordination store (Redis) port.
    #[arg(long)]
    pub cs_port: Option<u16>,

    /// Render a live terminal dashboard instead of plain log lines.
    #[arg(long)]
    pub dashboard: bool,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Assembles a `CrawlerConfig`: starts from the TOML file (if given),
    /// then overlays any CLI flag the operator actually set.
    pub fn into_config(self) -> Result<CrawlerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => CrawlerConfig::from_file(path)?,
            None => default_config(),
        };

        if self.seed_file.is_some() {
            config.seed_file = self.seed_file;
        }
        if let Some(email) = self.email {
            config.email = email;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if self.exclude_file.is_some() {
            config.exclude_file = self.exclude_file;
        }
        if let Some(n) = self.max_workers {
            config.max_workers = n;
        }
        if let Some(n) = self.parser_processes {
            config.parser_processes = n;
        }
        if self.max_pages.is_some() {
            config.max_pages = self.max_pages;
        }
        if self.max_duration_secs.is_some() {
            config.max_duration_secs = self.max_duration_secs;
        }
        if self.resume {
            config.resume = true;
        }
        if self.reset {
            config.resume = false;
        }
        if self.seeded_urls_only {
            config.seeded_urls_only = true;
        }
        if let Some(host) = self.cs_host {
            config.cs_host = host;
        }
        if let Some(port) = self.cs_port {
            config.cs_port = port;
        }

        Ok(config)
    }
}

fn default_config() -> CrawlerConfig {
    CrawlerConfig {
        seed_file: None,
        email: String::new(),
        data_dir: PathBuf::from("./crawl-data"),
        exclude_file: None,
        max_workers: 500,
        parser_processes: 2,
        max_pages: None,
        max_duration_secs: None,
        resume: false,
        seeded_urls_only: false,
        cs_host: "127.0.0.1".to_string(),
        cs_port: 6379,
        cs_db: 0,
        cs_password: None,
        handoff_soft_threshold: 5_000,
        handoff_hard_threshold: 20_000,
        bloom_capacity: 160_000_000,
        bloom_fpr: 0.001,
        parser_concurrency: 50,
    }
}

pub fn setup_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;
    let filter = match verbose {
        0 => EnvFilter::new("webcrawler_orchestrator=info,webcrawler_core=info,warn"),
        1 => EnvFilter::new("webcrawler_orchestrator=debug,webcrawler_core=debug,info"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
