//! The Fetcher external collaborator contract (§6.1) and a concrete
//! `reqwest`-based implementation, generalized from the teacher's
//! `http_client::HttpClient` to also serve robots.txt requests (which
//! must not be subject to the HTML-only content-type check) and to report
//! the final (post-redirect) URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Result of a single fetch attempt (§6.1's Fetcher contract).
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub initial_url: String,
    pub final_url: String,
    pub status_code: u16,
    pub text_content: Option<String>,
    pub content_type: Option<String>,
    pub error: Option<String>,
}

/// The Fetcher contract: follows redirects itself, detects encoding well
/// enough to produce `text_content` for textual responses.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, is_robots_txt: bool) -> FetchOutcome;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(30))
            .user_agent(user_agent.to_string())
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, is_robots_txt: bool) -> FetchOutcome {
        let mut outcome = FetchOutcome {
            initial_url: url.to_string(),
            final_url: url.to_string(),
            status_code: 0,
            text_content: None,
            content_type: None,
            error: None,
        };

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };

        outcome.final_url = response.url().to_string();
        outcome.status_code = response.status().as_u16();

        if !response.status().is_success() {
            outcome.error = Some(format!("http status {}", outcome.status_code));
            return outcome;
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        outcome.content_type = content_type.clone();

        // Robots.txt bodies are served as text/plain; regular page fetches
        // are restricted to HTML-like content so Fetcher Workers never
        // hand non-text bodies down the parse pipeline (§4.4: workers
        // never parse, but the Fetcher still filters obvious non-text).
        if !is_robots_txt {
            if let Some(ct) = &content_type {
                if !ct.contains("text/html") && !ct.contains("application/xhtml") {
                    outcome.error = Some(format!("non-text content type: {ct}"));
                    return outcome;
                }
            }
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE as u64 {
                outcome.error = Some(format!("response too large: {len} bytes"));
                return outcome;
            }
        }

        match response.text().await {
            Ok(body) => {
                if body.len() > MAX_RESPONSE_SIZE {
                    outcome.error = Some(format!("response too large: {} bytes", body.len()));
                } else {
                    outcome.text_content = Some(body);
                }
            }
            Err(e) => outcome.error = Some(e.to_string()),
        }

        outcome
    }
}
