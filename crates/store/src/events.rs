//! Competitor change events: the structured deltas the change
//! detector emits between two comparable snapshots.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use rw_domain::model::{ChangeNotificationStatus, ProcessingStatus, SnapshotKind};
use rw_domain::{Error, Result};

use crate::persist::{load_vec, store_vec};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub company_id: Uuid,
    pub source_kind: SnapshotKind,
    pub change_summary: String,
    pub changed_fields: serde_json::Value,
    pub raw_diff: serde_json::Value,
    pub detected_at: DateTime<Utc>,
    pub current_snapshot_id: Uuid,
    pub previous_snapshot_id: Uuid,
    /// Hash copies allow invariant checks without a snapshot lookup.
    pub current_data_hash: String,
    pub previous_data_hash: String,
    pub processing_status: ProcessingStatus,
    pub notification_status: ChangeNotificationStatus,
}

pub struct ChangeEventStore {
    inner: RwLock<HashMap<Uuid, ChangeEvent>>,
    persist_path: PathBuf,
}

impl ChangeEventStore {
    pub fn new(state_path: &std::path::Path) -> Self {
        let persist_path = state_path.join("change_events.json");
        let events: Vec<ChangeEvent> = load_vec(&persist_path);
        let map = events.into_iter().map(|e| (e.id, e)).collect();
        Self { inner: RwLock::new(map), persist_path }
    }

    async fn persist(&self) {
        let events: Vec<ChangeEvent> = self.inner.read().await.values().cloned().collect();
        store_vec(self.persist_path.clone(), events).await;
    }

    /// Insert a change event. Equal snapshot hashes mean no change
    /// happened, which is a caller bug surfaced as a conflict.
    pub async fn insert(&self, event: ChangeEvent) -> Result<ChangeEvent> {
        if event.current_data_hash == event.previous_data_hash {
            return Err(Error::Conflict(
                "change event requires differing snapshot hashes".into(),
            ));
        }
        self.inner.write().await.insert(event.id, event.clone());
        self.persist().await;
        Ok(event)
    }

    pub async fn get(&self, id: &Uuid) -> Option<ChangeEvent> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn set_notification_status(&self, id: &Uuid, status: ChangeNotificationStatus) {
        let mut inner = self.inner.write().await;
        if let Some(event) = inner.get_mut(id) {
            event.notification_status = status;
        }
        drop(inner);
        self.persist().await;
    }

    /// Rewrite the diff of an event, used when a reclassification
    /// re-runs the comparison. Events whose notifications already went
    /// out are immutable.
    pub async fn update_diff(
        &self,
        id: &Uuid,
        change_summary: String,
        changed_fields: serde_json::Value,
        raw_diff: serde_json::Value,
        processing_status: ProcessingStatus,
    ) -> Result<ChangeEvent> {
        let mut inner = self.inner.write().await;
        let event = inner
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("change event {id}")))?;
        if event.notification_status == ChangeNotificationStatus::Sent {
            return Err(Error::Conflict(format!(
                "change event {id} already notified, refusing rewrite"
            )));
        }
        event.change_summary = change_summary;
        event.changed_fields = changed_fields;
        event.raw_diff = raw_diff;
        event.processing_status = processing_status;
        let updated = event.clone();
        drop(inner);
        self.persist().await;
        Ok(updated)
    }

    /// Events awaiting notification fan-out.
    pub async fn pending_notification(&self) -> Vec<ChangeEvent> {
        let mut events: Vec<ChangeEvent> = self
            .inner
            .read()
            .await
            .values()
            .filter(|e| e.notification_status == ChangeNotificationStatus::Pending)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.detected_at);
        events
    }

    pub async fn list_for_company(&self, company_id: &Uuid) -> Vec<ChangeEvent> {
        let mut events: Vec<ChangeEvent> = self
            .inner
            .read()
            .await
            .values()
            .filter(|e| e.company_id == *company_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(current_hash: &str, previous_hash: &str) -> ChangeEvent {
        ChangeEvent {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            source_kind: SnapshotKind::Pricing,
            change_summary: "price change".into(),
            changed_fields: serde_json::json!([]),
            raw_diff: serde_json::json!({}),
            detected_at: Utc::now(),
            current_snapshot_id: Uuid::new_v4(),
            previous_snapshot_id: Uuid::new_v4(),
            current_data_hash: current_hash.into(),
            previous_data_hash: previous_hash.into(),
            processing_status: ProcessingStatus::Success,
            notification_status: ChangeNotificationStatus::Pending,
        }
    }

    #[tokio::test]
    async fn equal_hashes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChangeEventStore::new(dir.path());
        let err = store.insert(event("same", "same")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn sent_events_refuse_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChangeEventStore::new(dir.path());
        let e = store.insert(event("aaa", "bbb")).await.unwrap();

        store.set_notification_status(&e.id, ChangeNotificationStatus::Sent).await;
        let err = store
            .update_diff(
                &e.id,
                "rewritten".into(),
                serde_json::json!([]),
                serde_json::json!({}),
                ProcessingStatus::Success,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn pending_rewrites_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChangeEventStore::new(dir.path());
        let e = store.insert(event("aaa", "bbb")).await.unwrap();

        let updated = store
            .update_diff(
                &e.id,
                "recomputed".into(),
                serde_json::json!([{"type": "added_plan"}]),
                serde_json::json!({}),
                ProcessingStatus::Success,
            )
            .await
            .unwrap();
        assert_eq!(updated.change_summary, "recomputed");
    }

    #[tokio::test]
    async fn pending_notification_lists_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChangeEventStore::new(dir.path());
        let a = store.insert(event("a1", "a2")).await.unwrap();
        let b = store.insert(event("b1", "b2")).await.unwrap();
        store.set_notification_status(&b.id, ChangeNotificationStatus::Sent).await;

        let pending = store.pending_notification().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);
    }
}
