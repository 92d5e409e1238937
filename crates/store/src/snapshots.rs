//! Content-addressed snapshots of parsed source pages. Comparability
//! is scoped to (company, source_url, parser_version).

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use rw_domain::model::{ProcessingStatus, SnapshotKind};

use crate::persist::{load_vec, store_vec};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub company_id: Uuid,
    pub source_url: String,
    pub source_kind: SnapshotKind,
    /// 64-char sha256 over the canonical normalized body.
    pub data_hash: String,
    pub normalized_data: serde_json::Value,
    pub parser_version: String,
    pub extracted_at: DateTime<Utc>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub processing_status: ProcessingStatus,
    pub raw_snapshot_url: Option<String>,
}

pub struct SnapshotStore {
    inner: RwLock<HashMap<Uuid, Snapshot>>,
    persist_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(state_path: &std::path::Path) -> Self {
        let persist_path = state_path.join("snapshots.json");
        let snapshots: Vec<Snapshot> = load_vec(&persist_path);
        let map = snapshots.into_iter().map(|s| (s.id, s)).collect();
        Self { inner: RwLock::new(map), persist_path }
    }

    async fn persist(&self) {
        let snapshots: Vec<Snapshot> = self.inner.read().await.values().cloned().collect();
        store_vec(self.persist_path.clone(), snapshots).await;
    }

    pub async fn insert(&self, snapshot: Snapshot) -> Snapshot {
        self.inner.write().await.insert(snapshot.id, snapshot.clone());
        self.persist().await;
        snapshot
    }

    pub async fn get(&self, id: &Uuid) -> Option<Snapshot> {
        self.inner.read().await.get(id).cloned()
    }

    /// Most recent successfully parsed snapshot for the same page
    /// under the same parser version. Older parser versions never
    /// participate in diffs.
    pub async fn latest_success(
        &self,
        company_id: &Uuid,
        source_url: &str,
        parser_version: &str,
    ) -> Option<Snapshot> {
        self.inner
            .read()
            .await
            .values()
            .filter(|s| {
                s.company_id == *company_id
                    && s.source_url == source_url
                    && s.parser_version == parser_version
                    && s.processing_status == ProcessingStatus::Success
            })
            .max_by_key(|s| s.extracted_at)
            .cloned()
    }

    pub async fn delete_for_company(&self, company_id: &Uuid) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, s| s.company_id != *company_id);
        let removed = before - inner.len();
        drop(inner);
        if removed > 0 {
            self.persist().await;
        }
        removed
    }
}
