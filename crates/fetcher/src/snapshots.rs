//! Content-addressed raw snapshot persistence. Successful responses
//! land at `{root}/{yyyy}/{mm}/{dd}/{sha256}.html` with a `.meta.json`
//! sidecar carrying the fetch context for audit.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use rw_domain::Result;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub url: String,
    pub final_url: String,
    pub fetched_at: DateTime<Utc>,
    pub status: u16,
}

pub struct SnapshotWriter {
    root: PathBuf,
}

impl SnapshotWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist a response body. Returns the snapshot path; an already
    /// existing blob for the same bytes is reused.
    pub async fn write(
        &self,
        url: &str,
        final_url: &str,
        status: u16,
        body: &[u8],
        fetched_at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let mut hasher = Sha256::new();
        hasher.update(body);
        let digest = format!("{:x}", hasher.finalize());

        let dir = self
            .root
            .join(format!("{:04}", fetched_at.year()))
            .join(format!("{:02}", fetched_at.month()))
            .join(format!("{:02}", fetched_at.day()));
        let html_path = dir.join(format!("{digest}.html"));
        let meta_path = dir.join(format!("{digest}.meta.json"));

        let meta = SnapshotMeta {
            url: url.to_string(),
            final_url: final_url.to_string(),
            fetched_at,
            status,
        };
        let body = body.to_vec();
        let meta_json = serde_json::to_vec_pretty(&meta)?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&dir)?;
            if !html_path.exists() {
                std::fs::write(&html_path, &body)?;
            }
            std::fs::write(&meta_path, &meta_json)?;
            Ok(())
        })
        .await
        .map_err(|e| rw_domain::Error::Other(format!("snapshot write task: {e}")))??;

        Ok(self
            .root
            .join(format!("{:04}", fetched_at.year()))
            .join(format!("{:02}", fetched_at.month()))
            .join(format!("{:02}", fetched_at.day()))
            .join(format!("{digest}.html")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn writes_blob_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();

        let path = writer
            .write("https://ex.com/pricing", "https://ex.com/pricing", 200, b"<html></html>", at)
            .await
            .unwrap();

        assert!(path.to_string_lossy().contains("2025/03/10"));
        assert!(path.exists());

        let meta_path = path.with_extension("meta.json");
        let meta: SnapshotMeta =
            serde_json::from_str(&std::fs::read_to_string(meta_path).unwrap()).unwrap();
        assert_eq!(meta.status, 200);
        assert_eq!(meta.url, "https://ex.com/pricing");
    }

    #[tokio::test]
    async fn same_body_maps_to_same_blob() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();

        let a = writer.write("https://a.com", "https://a.com", 200, b"same", at).await.unwrap();
        let b = writer.write("https://b.com", "https://b.com", 200, b"same", at).await.unwrap();
        assert_eq!(a, b);
    }
}
