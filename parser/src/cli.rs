//! Command-line flags for a parser-consumer process (§4.5). The
//! orchestrator spawns one of these per `parser_processes`, passing the
//! same config file (if any) plus the Coordination Store connection
//! details it resolved itself.

use std::path::PathBuf;

use clap::Parser;
use webcrawler_core::config::ConfigError;
use webcrawler_core::CrawlerConfig;

#[derive(Parser, Debug)]
#[command(name = "webcrawler-parser")]
#[command(about = "Parser-consumer process: drains the fetch handoff queue", long_about = None)]
pub struct Cli {
    /// Path to the same TOML configuration file the orchestrator used.
    #[arg(long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Contact email incorporated into the User-Agent (used for robots fetches).
    #[arg(long)]
    pub email: Option<String>,

    /// Root directory for frontier files and saved content; must match
    /// the orchestrator's `data_dir`.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Coordination store (Redis) host.
    #[arg(long)]
    pub cs_host: Option<String>,

    /// Coordination store (Redis) port.
    #[arg(long)]
    pub cs_port: Option<u16>,

    /// Number of cooperative tasks draining the handoff queue in this process.
    #[arg(long)]
    pub parser_concurrency: Option<usize>,

    /// Index of this parser process among its siblings (for logging only).
    #[arg(long, default_value_t = 0)]
    pub process_index: usize,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn into_config(self) -> Result<CrawlerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => CrawlerConfig::from_file(path)?,
            None => default_config(),
        };

        if let Some(email) = self.email {
            config.email = email;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(host) = self.cs_host {
            config.cs_host = host;
        }
        if let Some(port) = self.cs_port {
            config.cs_port = port;
        }
        if let Some(n) = self.parser_concurrency {
            config.parser_concurrency = n;
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
        resume: true,
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
        0 => EnvFilter::new("webcrawler_parser=info,webcrawler_core=info,warn"),
        1 => EnvFilter::new("webcrawler_parser=debug,webcrawler_core=debug,info"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
