//! Declarative crawl schedules. `(scope, scope_key)` is unique; the
//! effective schedule for a profile is resolved by the schedule
//! engine from these rows.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use rw_domain::model::{CrawlMode, CrawlScope};
use rw_domain::{Error, Result};

use crate::persist::{load_vec, store_vec};

/// Optional local-time window outside which a schedule never fires.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunWindow {
    /// Inclusive "HH:MM".
    pub start: String,
    /// Exclusive "HH:MM".
    pub end: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlSchedule {
    pub id: Uuid,
    pub scope: CrawlScope,
    pub scope_key: String,
    pub mode: CrawlMode,
    pub frequency_seconds: u64,
    pub jitter_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_seconds: u64,
    pub priority: i32,
    pub enabled: bool,
    #[serde(default)]
    pub run_window: Option<RunWindow>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub last_applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ScheduleUpsert {
    pub scope: CrawlScope,
    pub scope_key: String,
    pub mode: CrawlMode,
    pub frequency_seconds: u64,
    pub jitter_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_seconds: u64,
    pub priority: i32,
    pub enabled: bool,
    pub run_window: Option<RunWindow>,
}

impl Default for ScheduleUpsert {
    fn default() -> Self {
        Self {
            scope: CrawlScope::SourceKind,
            scope_key: String::new(),
            mode: CrawlMode::AlwaysUpdate,
            frequency_seconds: 900,
            jitter_seconds: 300,
            max_retries: 3,
            retry_backoff_seconds: 60,
            priority: 0,
            enabled: true,
            run_window: None,
        }
    }
}

pub struct ScheduleStore {
    inner: RwLock<HashMap<(CrawlScope, String), CrawlSchedule>>,
    persist_path: PathBuf,
}

impl ScheduleStore {
    pub fn new(state_path: &std::path::Path) -> Self {
        let persist_path = state_path.join("crawl_schedules.json");
        let schedules: Vec<CrawlSchedule> = load_vec(&persist_path);
        let map = schedules
            .into_iter()
            .map(|s| ((s.scope, s.scope_key.clone()), s))
            .collect();
        Self { inner: RwLock::new(map), persist_path }
    }

    async fn persist(&self) {
        let schedules: Vec<CrawlSchedule> = self.inner.read().await.values().cloned().collect();
        store_vec(self.persist_path.clone(), schedules).await;
    }

    /// Create or update the rule for `(scope, scope_key)`. Frequencies
    /// under 60 seconds are rejected.
    pub async fn upsert(&self, spec: ScheduleUpsert) -> Result<CrawlSchedule> {
        if spec.frequency_seconds < 60 {
            return Err(Error::Config(format!(
                "frequency_seconds must be >= 60, got {}",
                spec.frequency_seconds
            )));
        }
        let now = Utc::now();
        let key = (spec.scope, spec.scope_key.clone());
        let mut inner = self.inner.write().await;
        let schedule = match inner.get_mut(&key) {
            Some(existing) => {
                existing.mode = spec.mode;
                existing.frequency_seconds = spec.frequency_seconds;
                existing.jitter_seconds = spec.jitter_seconds;
                existing.max_retries = spec.max_retries;
                existing.retry_backoff_seconds = spec.retry_backoff_seconds;
                existing.priority = spec.priority;
                existing.enabled = spec.enabled;
                existing.run_window = spec.run_window.clone();
                existing.last_applied_at = Some(now);
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let schedule = CrawlSchedule {
                    id: Uuid::new_v4(),
                    scope: spec.scope,
                    scope_key: spec.scope_key.clone(),
                    mode: spec.mode,
                    frequency_seconds: spec.frequency_seconds,
                    jitter_seconds: spec.jitter_seconds,
                    max_retries: spec.max_retries,
                    retry_backoff_seconds: spec.retry_backoff_seconds,
                    priority: spec.priority,
                    enabled: spec.enabled,
                    run_window: spec.run_window.clone(),
                    metadata: serde_json::Value::Null,
                    last_applied_at: Some(now),
                    created_at: now,
                    updated_at: now,
                };
                inner.insert(key, schedule.clone());
                schedule
            }
        };
        drop(inner);
        self.persist().await;
        Ok(schedule)
    }

    pub async fn get(&self, scope: CrawlScope, scope_key: &str) -> Option<CrawlSchedule> {
        self.inner.read().await.get(&(scope, scope_key.to_string())).cloned()
    }

    /// Enabled schedules ordered by priority, highest first.
    pub async fn list_active(&self) -> Vec<CrawlSchedule> {
        let mut schedules: Vec<CrawlSchedule> = self
            .inner
            .read()
            .await
            .values()
            .filter(|s| s.enabled)
            .cloned()
            .collect();
        schedules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.scope_key.cmp(&b.scope_key)));
        schedules
    }

    pub async fn delete(&self, scope: CrawlScope, scope_key: &str) -> bool {
        let removed = self
            .inner
            .write()
            .await
            .remove(&(scope, scope_key.to_string()))
            .is_some();
        if removed {
            self.persist().await;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_is_unique_per_scope_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path());

        let first = store
            .upsert(ScheduleUpsert {
                scope: CrawlScope::SourceKind,
                scope_key: "blog".into(),
                frequency_seconds: 900,
                ..ScheduleUpsert::default()
            })
            .await
            .unwrap();
        let second = store
            .upsert(ScheduleUpsert {
                scope: CrawlScope::SourceKind,
                scope_key: "blog".into(),
                frequency_seconds: 600,
                ..ScheduleUpsert::default()
            })
            .await
            .unwrap();
        assert_eq!(first.id, second.id, "same row updated, not duplicated");
        assert_eq!(second.frequency_seconds, 600);
        assert_eq!(store.list_active().await.len(), 1);
    }

    #[tokio::test]
    async fn sub_minute_frequency_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path());
        let err = store
            .upsert(ScheduleUpsert {
                scope: CrawlScope::Company,
                scope_key: Uuid::new_v4().to_string(),
                frequency_seconds: 30,
                ..ScheduleUpsert::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn list_active_orders_by_priority_and_skips_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path());

        store
            .upsert(ScheduleUpsert {
                scope: CrawlScope::SourceKind,
                scope_key: "blog".into(),
                priority: 1,
                ..ScheduleUpsert::default()
            })
            .await
            .unwrap();
        store
            .upsert(ScheduleUpsert {
                scope: CrawlScope::SourceKind,
                scope_key: "github".into(),
                priority: 5,
                ..ScheduleUpsert::default()
            })
            .await
            .unwrap();
        store
            .upsert(ScheduleUpsert {
                scope: CrawlScope::SourceKind,
                scope_key: "reddit".into(),
                enabled: false,
                ..ScheduleUpsert::default()
            })
            .await
            .unwrap();

        let active = store.list_active().await;
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].scope_key, "github");
    }
}
