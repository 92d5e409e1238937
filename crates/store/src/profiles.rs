//! Source profiles: exactly one per (company, source-kind), carrying
//! the crawl counters the schedule engine keys off.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use rw_domain::model::{CrawlMode, SourceKind};

use crate::persist::{load_vec, store_vec};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceProfile {
    pub id: Uuid,
    pub company_id: Uuid,
    pub source_kind: SourceKind,
    pub mode: CrawlMode,
    pub schedule_id: Option<Uuid>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub consecutive_no_change: u32,
    pub last_content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ProfileStore {
    inner: RwLock<HashMap<(Uuid, SourceKind), SourceProfile>>,
    persist_path: PathBuf,
}

impl ProfileStore {
    pub fn new(state_path: &std::path::Path) -> Self {
        let persist_path = state_path.join("source_profiles.json");
        let profiles: Vec<SourceProfile> = load_vec(&persist_path);
        let map = profiles
            .into_iter()
            .map(|p| ((p.company_id, p.source_kind), p))
            .collect();
        Self { inner: RwLock::new(map), persist_path }
    }

    async fn persist(&self) {
        let profiles: Vec<SourceProfile> = self.inner.read().await.values().cloned().collect();
        store_vec(self.persist_path.clone(), profiles).await;
    }

    /// Fetch-or-create the unique profile for a pair, syncing mode and
    /// schedule reference with the effective schedule.
    pub async fn ensure(
        &self,
        company_id: Uuid,
        source_kind: SourceKind,
        mode: CrawlMode,
        schedule_id: Option<Uuid>,
    ) -> SourceProfile {
        let mut inner = self.inner.write().await;
        let key = (company_id, source_kind);
        let profile = match inner.get_mut(&key) {
            Some(profile) => {
                let mut touched = false;
                if profile.mode != mode {
                    profile.mode = mode;
                    touched = true;
                }
                if profile.schedule_id != schedule_id {
                    profile.schedule_id = schedule_id;
                    touched = true;
                }
                if touched {
                    profile.updated_at = Utc::now();
                }
                profile.clone()
            }
            None => {
                let now = Utc::now();
                let profile = SourceProfile {
                    id: Uuid::new_v4(),
                    company_id,
                    source_kind,
                    mode,
                    schedule_id,
                    last_run_at: None,
                    last_success_at: None,
                    last_error_at: None,
                    consecutive_failures: 0,
                    consecutive_no_change: 0,
                    last_content_hash: None,
                    created_at: now,
                    updated_at: now,
                };
                inner.insert(key, profile.clone());
                profile
            }
        };
        drop(inner);
        self.persist().await;
        profile
    }

    pub async fn get(&self, company_id: &Uuid, source_kind: SourceKind) -> Option<SourceProfile> {
        self.inner.read().await.get(&(*company_id, source_kind)).cloned()
    }

    /// Stamp a run start; the planner's idempotence comes from this
    /// write happening before the task is enqueued.
    pub async fn mark_run_started(&self, company_id: &Uuid, source_kind: SourceKind, now: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        if let Some(profile) = inner.get_mut(&(*company_id, source_kind)) {
            profile.last_run_at = Some(now);
            profile.updated_at = now;
        }
        drop(inner);
        self.persist().await;
    }

    /// Record a run outcome. Success resets the failure streak;
    /// `consecutive_no_change` resets only when a change was detected.
    pub async fn record_result(
        &self,
        company_id: &Uuid,
        source_kind: SourceKind,
        success: bool,
        change_detected: bool,
        content_hash: Option<String>,
    ) {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        if let Some(profile) = inner.get_mut(&(*company_id, source_kind)) {
            if success {
                profile.last_success_at = Some(now);
                profile.consecutive_failures = 0;
                if change_detected {
                    profile.consecutive_no_change = 0;
                } else {
                    profile.consecutive_no_change += 1;
                }
                if let Some(hash) = content_hash {
                    profile.last_content_hash = Some(hash);
                }
            } else {
                profile.last_error_at = Some(now);
                profile.consecutive_failures += 1;
            }
            profile.updated_at = now;
        }
        drop(inner);
        self.persist().await;
    }

    pub async fn list(&self) -> Vec<SourceProfile> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn delete_for_company(&self, company_id: &Uuid) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|(cid, _), _| cid != company_id);
        let removed = before - inner.len();
        drop(inner);
        if removed > 0 {
            self.persist().await;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_is_idempotent_per_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        let company = Uuid::new_v4();

        let a = store
            .ensure(company, SourceKind::Blog, CrawlMode::AlwaysUpdate, None)
            .await;
        let b = store
            .ensure(company, SourceKind::Blog, CrawlMode::AlwaysUpdate, None)
            .await;
        assert_eq!(a.id, b.id);
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn ensure_syncs_mode_and_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        let company = Uuid::new_v4();
        let schedule = Uuid::new_v4();

        store.ensure(company, SourceKind::Blog, CrawlMode::AlwaysUpdate, None).await;
        let updated = store
            .ensure(company, SourceKind::Blog, CrawlMode::ChangeDetection, Some(schedule))
            .await;
        assert_eq!(updated.mode, CrawlMode::ChangeDetection);
        assert_eq!(updated.schedule_id, Some(schedule));
    }

    #[tokio::test]
    async fn counters_follow_run_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        let company = Uuid::new_v4();
        store.ensure(company, SourceKind::Blog, CrawlMode::AlwaysUpdate, None).await;

        store.record_result(&company, SourceKind::Blog, false, false, None).await;
        store.record_result(&company, SourceKind::Blog, false, false, None).await;
        let p = store.get(&company, SourceKind::Blog).await.unwrap();
        assert_eq!(p.consecutive_failures, 2);

        store.record_result(&company, SourceKind::Blog, true, false, None).await;
        let p = store.get(&company, SourceKind::Blog).await.unwrap();
        assert_eq!(p.consecutive_failures, 0, "success resets failures");
        assert_eq!(p.consecutive_no_change, 1, "no change increments streak");

        store
            .record_result(&company, SourceKind::Blog, true, true, Some("abc".into()))
            .await;
        let p = store.get(&company, SourceKind::Blog).await.unwrap();
        assert_eq!(p.consecutive_no_change, 0, "change resets streak");
        assert_eq!(p.last_content_hash.as_deref(), Some("abc"));
    }
}
