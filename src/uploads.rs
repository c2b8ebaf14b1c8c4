//! Report attachments on disk.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub const INVALID_FILE_TYPE: &str = "Invalid file type. Allowed: PNG, JPG, JPEG, WEBP, PDF";

const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "pdf"];

pub const UPLOAD_TOO_LARGE: &str = "Upload exceeds the maximum allowed size";

/// Directory that report attachments are written to and served from.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    /// Largest request body the upload endpoint accepts.
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Whether the file name carries one of the accepted extensions.
    pub fn is_allowed(original: &str) -> bool {
        original
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Name an upload is stored under: a millisecond timestamp, then the
    /// original name with anything outside `[A-Za-z0-9.-]` replaced by `_`.
    pub fn stored_filename(original: &str, unix_millis: i128) -> String {
        let sanitized: String = original
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{unix_millis}_{sanitized}")
    }

    /// Writes `bytes` under a fresh name and returns that name. The
    /// directory is created if it does not exist yet.
    pub async fn save(&self, original: &str, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", self.dir.display()))?;

        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let filename = Self::stored_filename(original, millis);
        tokio::fs::write(self.dir.join(&filename), bytes)
            .await
            .with_context(|| format!("Failed to write upload {filename}"))?;

        tracing::info!(%filename, size = bytes.len(), "stored upload");
        Ok(filename)
    }

    /// Removes a stored upload whose report could not be recorded.
    /// Failures are logged, not returned.
    pub async fn discard(&self, filename: &str) {
        if let Err(err) = tokio::fs::remove_file(self.dir.join(filename)).await {
            tracing::warn!(%filename, "failed to remove orphaned upload: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_ignores_case() {
        assert!(UploadStore::is_allowed("chest.PNG"));
        assert!(UploadStore::is_allowed("scan.final.pdf"));
        assert!(!UploadStore::is_allowed("notes.txt"));
        assert!(!UploadStore::is_allowed("no_extension"));
    }

    #[test]
    fn stored_name_is_timestamped_and_sanitized() {
        assert_eq!(
            UploadStore::stored_filename("chest x-ray (1).jpg", 1700000000000),
            "1700000000000_chest_x-ray__1_.jpg"
        );
    }

    #[tokio::test]
    async fn save_creates_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("public").join("uploads"), 1 << 20);

        let name = store.save("scan.png", b"\x89PNG").await.unwrap();
        assert!(name.ends_with("_scan.png"));
        let written = std::fs::read(store.dir().join(&name)).unwrap();
        assert_eq!(written, b"\x89PNG");
    }

    #[tokio::test]
    async fn discard_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 1 << 20);

        let name = store.save("scan.pdf", b"%PDF").await.unwrap();
        store.discard(&name).await;
        assert!(!store.dir().join(&name).exists());

        // Already gone: only logged.
        store.discard(&name).await;
    }
}
