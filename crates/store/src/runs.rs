//! Crawl run records. Terminal statuses are immutable; a sweeper
//! reconciles runs abandoned past the hard deadline.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use rw_domain::model::RunStatus;
use rw_domain::{Error, Result};

use crate::persist::{load_vec, store_vec};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlRun {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub item_count: usize,
    pub change_detected: bool,
    pub error_message: Option<String>,
}

pub struct RunStore {
    inner: RwLock<HashMap<Uuid, CrawlRun>>,
    persist_path: PathBuf,
}

impl RunStore {
    pub fn new(state_path: &std::path::Path) -> Self {
        let persist_path = state_path.join("crawl_runs.json");
        let runs: Vec<CrawlRun> = load_vec(&persist_path);
        let map = runs.into_iter().map(|r| (r.id, r)).collect();
        Self { inner: RwLock::new(map), persist_path }
    }

    async fn persist(&self) {
        let runs: Vec<CrawlRun> = self.inner.read().await.values().cloned().collect();
        store_vec(self.persist_path.clone(), runs).await;
    }

    pub async fn open(&self, profile_id: Uuid, schedule_id: Option<Uuid>) -> CrawlRun {
        let run = CrawlRun {
            id: Uuid::new_v4(),
            profile_id,
            schedule_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            item_count: 0,
            change_detected: false,
            error_message: None,
        };
        self.inner.write().await.insert(run.id, run.clone());
        self.persist().await;
        run
    }

    /// Close a run with a terminal status. Closing an already-terminal
    /// run is a conflict; terminal records never change.
    pub async fn close(
        &self,
        run_id: &Uuid,
        status: RunStatus,
        item_count: usize,
        change_detected: bool,
        error_message: Option<String>,
    ) -> Result<CrawlRun> {
        if !status.is_terminal() {
            return Err(Error::Other(format!("close requires a terminal status, got {status:?}")));
        }
        let mut inner = self.inner.write().await;
        let run = inner
            .get_mut(run_id)
            .ok_or_else(|| Error::NotFound(format!("run {run_id}")))?;
        if run.status.is_terminal() {
            return Err(Error::Conflict(format!("run {run_id} already closed as {:?}", run.status)));
        }
        run.status = status;
        run.finished_at = Some(Utc::now());
        run.item_count = item_count;
        run.change_detected = change_detected;
        run.error_message = error_message;
        let closed = run.clone();
        drop(inner);
        self.persist().await;
        Ok(closed)
    }

    pub async fn get(&self, id: &Uuid) -> Option<CrawlRun> {
        self.inner.read().await.get(id).cloned()
    }

    /// Fail `running` runs older than the hard deadline. Returns the
    /// reconciled run ids.
    pub async fn sweep_stale(&self, hard_deadline_secs: u64) -> Vec<Uuid> {
        self.sweep_stale_at(hard_deadline_secs, Utc::now()).await
    }

    pub async fn sweep_stale_at(&self, hard_deadline_secs: u64, now: DateTime<Utc>) -> Vec<Uuid> {
        let cutoff = now - Duration::seconds(hard_deadline_secs as i64);
        let mut swept = Vec::new();
        let mut inner = self.inner.write().await;
        for run in inner.values_mut() {
            if run.status == RunStatus::Running && run.started_at < cutoff {
                run.status = RunStatus::Failed;
                run.finished_at = Some(now);
                run.error_message = Some("deadline exceeded".to_string());
                swept.push(run.id);
            }
        }
        drop(inner);
        if !swept.is_empty() {
            tracing::warn!(count = swept.len(), "swept stale crawl runs past the hard deadline");
            self.persist().await;
        }
        swept
    }

    pub async fn list_for_profile(&self, profile_id: &Uuid) -> Vec<CrawlRun> {
        let mut runs: Vec<CrawlRun> = self
            .inner
            .read()
            .await
            .values()
            .filter(|r| r.profile_id == *profile_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }
}
