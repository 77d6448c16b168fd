use thiserror::Error;

/// Errors surfaced by the Coordination Store contract (§6.1).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("coordination store connection error: {0}")]
    Connection(String),

    #[error("coordination store command failed: {0}")]
    Command(String),

    #[error("coordination store returned malformed data for key {key}: {reason}")]
    Malformed { key: String, reason: String },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Command(err.to_string())
    }
}

/// Errors from the Politeness Enforcer (§4.2).
#[derive(Debug, Error)]
pub enum PolitenessError {
    #[error("coordination store error: {0}")]
    Store(#[from] StoreError),

    #[error("fetch error while retrieving robots.txt: {0}")]
    Fetch(String),
}

/// Errors from the Frontier Manager (§4.1).
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("coordination store error: {0}")]
    Store(#[from] StoreError),

    #[error("politeness error: {0}")]
    Politeness(#[from] PolitenessError),

    #[error("frontier file I/O error for domain {domain}: {source}")]
    Io {
        domain: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to acquire write lock for domain {0} after exhausting retry budget")]
    LockContention(String),
}

/// Errors surfaced by a `Fetcher` implementation (external collaborator contract, §6.1).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: status {0}")]
    HttpStatus(u16),

    #[error("request error: {0}")]
    Request(String),

    #[error("response too large: {0} bytes")]
    TooLarge(u64),

    #[error("non-text content type: {0}")]
    InvalidContentType(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Request(err.to_string())
    }
}

/// Errors produced while loading configuration (§6.5). These are fatal
/// per §7's taxonomy: the process must exit before spawning workers.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    MissingRequired(&'static str),

    #[error("could not read seed file {path}: {source}")]
    SeedFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
