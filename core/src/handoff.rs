//! The fetch handoff payload (§6.2): produced by Fetcher Workers, consumed
//! by Parser Consumers via the Coordination Store's `fetch:queue` list.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPayload {
    pub initial_url: String,
    pub final_url: String,
    pub status: u16,
    pub domain: String,
    pub depth: u32,
    pub fetched_at: i64,
    pub content_type: Option<String>,
    pub raw_body: String,
}

impl FetchPayload {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let payload = FetchPayload {
            initial_url: "http://a.example/x".to_string(),
            final_url: "http://a.example/x".to_string(),
            status: 200,
            domain: "a.example".to_string(),
            depth: 1,
            fetched_at: 1_700_000_000,
            content_type: Some("text/html".to_string()),
            raw_body: "<html></html>".to_string(),
        };
        let json = payload.to_json().unwrap();
        let back = FetchPayload::from_json(&json).unwrap();
        assert_eq!(payload.initial_url, back.initial_url);
        assert_eq!(payload.status, back.status);
    }
}
