//! The Storage external collaborator contract (§6.1, §6.3): write-once,
//! hash-addressed text bodies under `{data_dir}/content/{sha256(url)}.txt`.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Saves `text` under a path derived from `url`. Empty text and any
    /// I/O error both yield `None` (§6.1: "Empty text yields null. Errors
    /// yield null.").
    async fn save_text(&self, url: &str, text: &str) -> Option<String>;
}

pub struct FilesystemStorage {
    content_dir: std::path::PathBuf,
}

impl FilesystemStorage {
    pub fn new(data_dir: &std::path::Path) -> Self {
        Self {
            content_dir: data_dir.join("content"),
        }
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.content_dir).await
    }
}

#[async_trait]
impl Storage for FilesystemStorage {
    async fn save_text(&self, url: &str, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        let hash = hex::encode(Sha256::digest(url.as_bytes()));
        let path = self.content_dir.join(format!("{hash}.txt"));
        match tokio::fs::write(&path, text).await {
            Ok(()) => Some(path.to_string_lossy().to_string()),
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to save content body");
                None
            }
        }
    }
}

/// SHA-256 hex digest of a URL, truncated to the first 16 hex characters
/// (§3.1's visited-record key).
pub fn visited_key(url: &str) -> String {
    let full = hex::encode(Sha256::digest(url.as_bytes()));
    full[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_text_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        storage.ensure_dirs().await.unwrap();
        assert_eq!(storage.save_text("http://example.com", "").await, None);
    }

    #[tokio::test]
    async fn non_empty_text_is_written_and_path_returned() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        storage.ensure_dirs().await.unwrap();
        let path = storage
            .save_text("http://example.com/a", "hello world")
            .await
            .unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "hello world");
    }

    #[test]
    fn visited_key_is_sha256_prefix() {
        let key = visited_key("http://example.com");
        assert_eq!(key.len(), 16);
        let full = hex::encode(Sha256::digest(b"http://example.com"));
        assert_eq!(key, &full[..16]);
    }
}
