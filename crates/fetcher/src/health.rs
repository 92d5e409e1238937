//! Per-URL health ledger. Repeated hard failures disable a URL; after
//! a decay interval the URL gets one probation fetch which either
//! fully re-enables it or extends the disabled state.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of a single fetch as seen by the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    /// 404/410/DNS-no-such-host. Weighs 1.0 toward the threshold.
    HardFailure,
    /// Timeouts, 5xx, 429. Weighs `transient_weight` (default 0.5).
    TransientFailure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlHealth {
    Healthy,
    /// Skip fetching.
    Disabled,
    /// Disabled, but the decay interval elapsed: one trial fetch is
    /// allowed to decide re-enablement.
    Probation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub company_id: Option<Uuid>,
    pub weighted_failures: f64,
    pub disabled: bool,
    pub disabled_at: Option<DateTime<Utc>>,
    pub last_status: Option<u16>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HealthLedger
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HealthLedger {
    inner: RwLock<HashMap<String, UrlRecord>>,
    persist_path: PathBuf,
    fail_threshold: f64,
    transient_weight: f64,
    probation: Duration,
}

impl HealthLedger {
    pub fn new(
        state_path: &std::path::Path,
        fail_threshold: f64,
        transient_weight: f64,
        probation_secs: u64,
    ) -> Self {
        let persist_path = state_path.join("url_health.json");
        let mut ledger = Self {
            inner: RwLock::new(HashMap::new()),
            persist_path,
            fail_threshold,
            transient_weight,
            probation: Duration::seconds(probation_secs as i64),
        };
        ledger.load();
        ledger
    }

    fn load(&mut self) {
        if let Ok(data) = std::fs::read_to_string(&self.persist_path) {
            if let Ok(records) = serde_json::from_str::<Vec<UrlRecord>>(&data) {
                let count = records.len();
                let map = records.into_iter().map(|r| (r.url.clone(), r)).collect();
                self.inner = RwLock::new(map);
                tracing::info!(count, "loaded url health records from disk");
            }
        }
    }

    async fn persist(&self) {
        let records: Vec<UrlRecord> = self.inner.read().await.values().cloned().collect();
        if let Ok(json) = serde_json::to_string_pretty(&records) {
            let path = self.persist_path.clone();
            let _ = tokio::task::spawn_blocking(move || {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if let Err(e) = std::fs::write(&path, json) {
                    tracing::warn!(error = %e, "failed to persist url health records");
                }
            })
            .await;
        }
    }

    /// Health as of `now`. Unknown URLs are healthy.
    pub async fn status_at(&self, url: &str, now: DateTime<Utc>) -> UrlHealth {
        let inner = self.inner.read().await;
        let Some(record) = inner.get(url) else {
            return UrlHealth::Healthy;
        };
        if !record.disabled {
            return UrlHealth::Healthy;
        }
        match record.disabled_at {
            Some(disabled_at) if now >= disabled_at + self.probation => UrlHealth::Probation,
            _ => UrlHealth::Disabled,
        }
    }

    /// Whether fetching should be skipped right now. Probation counts
    /// as fetchable.
    pub async fn is_disabled(&self, url: &str) -> bool {
        self.status_at(url, Utc::now()).await == UrlHealth::Disabled
    }

    pub async fn record(
        &self,
        company_id: Option<Uuid>,
        url: &str,
        outcome: FetchOutcome,
        status: Option<u16>,
    ) {
        self.record_at(company_id, url, outcome, status, Utc::now()).await;
    }

    pub async fn record_at(
        &self,
        company_id: Option<Uuid>,
        url: &str,
        outcome: FetchOutcome,
        status: Option<u16>,
        now: DateTime<Utc>,
    ) {
        let mut inner = self.inner.write().await;
        let record = inner.entry(url.to_string()).or_insert_with(|| UrlRecord {
            url: url.to_string(),
            company_id,
            weighted_failures: 0.0,
            disabled: false,
            disabled_at: None,
            last_status: None,
            last_checked_at: None,
        });
        record.company_id = company_id.or(record.company_id);
        record.last_status = status;
        record.last_checked_at = Some(now);

        match outcome {
            FetchOutcome::Success => {
                if record.disabled {
                    tracing::info!(url, "url re-enabled after successful probation fetch");
                }
                record.weighted_failures = 0.0;
                record.disabled = false;
                record.disabled_at = None;
            }
            FetchOutcome::HardFailure | FetchOutcome::TransientFailure => {
                let weight = if outcome == FetchOutcome::HardFailure {
                    1.0
                } else {
                    self.transient_weight
                };
                record.weighted_failures += weight;
                if record.disabled {
                    // Failed probation extends the disabled window.
                    record.disabled_at = Some(now);
                } else if record.weighted_failures >= self.fail_threshold {
                    record.disabled = true;
                    record.disabled_at = Some(now);
                    tracing::warn!(
                        url,
                        failures = record.weighted_failures,
                        "url disabled after consecutive failures"
                    );
                }
            }
        }

        let company_counts = dead_counts(&inner);
        drop(inner);
        for (company, count) in company_counts {
            metrics::gauge!("scraper_dead_urls_count", "company_id" => company).set(count as f64);
        }
        self.persist().await;
    }

    /// Disabled-URL count per company, for the periodic metric sweep.
    pub async fn dead_url_counts(&self) -> HashMap<Uuid, usize> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for record in inner.values() {
            if record.disabled {
                if let Some(company) = record.company_id {
                    *counts.entry(company).or_default() += 1;
                }
            }
        }
        counts
    }
}

fn dead_counts(map: &HashMap<String, UrlRecord>) -> Vec<(String, usize)> {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for record in map.values() {
        if record.disabled {
            if let Some(company) = record.company_id {
                *counts.entry(company).or_default() += 1;
            }
        }
    }
    counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ledger(dir: &std::path::Path) -> HealthLedger {
        HealthLedger::new(dir, 3.0, 0.5, 3600)
    }

    #[tokio::test]
    async fn disables_after_three_hard_failures() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        let url = "https://ex.com/blog";

        for i in 0..2 {
            ledger
                .record_at(None, url, FetchOutcome::HardFailure, Some(404), now)
                .await;
            assert_eq!(
                ledger.status_at(url, now).await,
                UrlHealth::Healthy,
                "still healthy after {} failures",
                i + 1
            );
        }
        ledger
            .record_at(None, url, FetchOutcome::HardFailure, Some(404), now)
            .await;
        assert_eq!(ledger.status_at(url, now).await, UrlHealth::Disabled);
        assert!(ledger.is_disabled(url).await);
    }

    #[tokio::test]
    async fn transient_failures_weigh_half() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        let url = "https://ex.com/news";

        for _ in 0..5 {
            ledger
                .record_at(None, url, FetchOutcome::TransientFailure, Some(503), now)
                .await;
        }
        assert_eq!(ledger.status_at(url, now).await, UrlHealth::Healthy, "2.5 < 3.0");
        ledger
            .record_at(None, url, FetchOutcome::TransientFailure, Some(503), now)
            .await;
        assert_eq!(ledger.status_at(url, now).await, UrlHealth::Disabled);
    }

    #[tokio::test]
    async fn probation_after_decay_then_reenable_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        let t0 = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        let url = "https://ex.com/press";

        for _ in 0..3 {
            ledger.record_at(None, url, FetchOutcome::HardFailure, Some(404), t0).await;
        }
        assert_eq!(ledger.status_at(url, t0).await, UrlHealth::Disabled);

        let after_decay = t0 + Duration::seconds(3601);
        assert_eq!(ledger.status_at(url, after_decay).await, UrlHealth::Probation);

        ledger
            .record_at(None, url, FetchOutcome::Success, Some(200), after_decay)
            .await;
        assert_eq!(ledger.status_at(url, after_decay).await, UrlHealth::Healthy);
        // Counters fully reset: three new failures are needed again.
        ledger
            .record_at(None, url, FetchOutcome::HardFailure, Some(404), after_decay)
            .await;
        assert_eq!(ledger.status_at(url, after_decay).await, UrlHealth::Healthy);
    }

    #[tokio::test]
    async fn failed_probation_extends_disabled_state() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        let t0 = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        let url = "https://ex.com/careers";

        for _ in 0..3 {
            ledger.record_at(None, url, FetchOutcome::HardFailure, Some(404), t0).await;
        }
        let probe_at = t0 + Duration::seconds(3601);
        assert_eq!(ledger.status_at(url, probe_at).await, UrlHealth::Probation);

        ledger
            .record_at(None, url, FetchOutcome::HardFailure, Some(404), probe_at)
            .await;
        assert_eq!(ledger.status_at(url, probe_at).await, UrlHealth::Disabled);
        // The decay clock restarted at the failed probe.
        let next_probe = probe_at + Duration::seconds(3601);
        assert_eq!(ledger.status_at(url, next_probe).await, UrlHealth::Probation);
    }

    #[tokio::test]
    async fn dead_url_counts_grouped_by_company() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        let now = Utc::now();
        let company = Uuid::new_v4();

        for _ in 0..3 {
            ledger
                .record_at(Some(company), "https://ex.com/a", FetchOutcome::HardFailure, Some(404), now)
                .await;
        }
        let counts = ledger.dead_url_counts().await;
        assert_eq!(counts.get(&company), Some(&1));
    }

    #[tokio::test]
    async fn records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        {
            let ledger = ledger(dir.path());
            for _ in 0..3 {
                ledger
                    .record_at(None, "https://ex.com/a", FetchOutcome::HardFailure, Some(404), now)
                    .await;
            }
        }
        let reloaded = ledger(dir.path());
        assert_eq!(reloaded.status_at("https://ex.com/a", now).await, UrlHealth::Disabled);
    }
}
