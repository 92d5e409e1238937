//! Beat loop: the single process emitting time-based tasks onto the
//! typed queues, running the base schedule merged with dynamic crawl
//! schedule rows.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Duration, Utc};

use rw_domain::Result;
use rw_store::CrawlSchedule;

use super::queue::TaskRouter;
use super::schedule_engine::{base_beat_schedule, merge_beat_schedule, BeatEntry};
use crate::state::AppState;

/// Entries whose period elapsed since their last firing. Never-fired
/// entries fire immediately.
pub fn due_entries<'a>(
    entries: &'a [BeatEntry],
    last_fired: &HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Vec<&'a BeatEntry> {
    entries
        .iter()
        .filter(|entry| match last_fired.get(&entry.name) {
            Some(last) => now >= *last + Duration::seconds(entry.period_secs as i64),
            None => true,
        })
        .collect()
}

/// Load dynamic schedule rows with bounded retries, falling back to
/// an empty set (base schedule only) when the store stays unreachable.
pub async fn load_dynamic_with_retry<F, Fut>(
    loader: F,
    retries: u32,
    backoff_secs: u64,
) -> Vec<CrawlSchedule>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<CrawlSchedule>>>,
{
    let mut attempt = 0u32;
    loop {
        match loader().await {
            Ok(schedules) => return schedules,
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!(error = %e, attempt, "dynamic schedule load failed, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(backoff_secs * attempt as u64))
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dynamic schedule unavailable, using base schedule only");
                return Vec::new();
            }
        }
    }
}

/// Run the beat loop until the process stops.
pub async fn run_beat(state: AppState, router: TaskRouter) {
    let base = base_beat_schedule();
    let mut last_fired: HashMap<String, DateTime<Utc>> = HashMap::new();
    let tick = std::time::Duration::from_secs(state.config.schedule.beat_tick_secs);

    tracing::info!(entries = base.len(), tick_secs = tick.as_secs(), "beat loop starting");
    loop {
        let dynamic = load_dynamic_with_retry(
            || async { Ok(state.schedules.list_active().await) },
            state.config.schedule.schedule_load_retries,
            state.config.schedule.schedule_load_backoff_secs,
        )
        .await;
        let entries = merge_beat_schedule(&base, &dynamic);

        let now = Utc::now();
        for entry in due_entries(&entries, &last_fired, now) {
            tracing::debug!(entry = %entry.name, "beat firing");
            router.enqueue(entry.task.clone());
            last_fired.insert(entry.name.clone(), now);
        }

        tokio::time::sleep(tick).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::queue::Task;
    use rw_domain::Error;

    fn entry(name: &str, period_secs: u64) -> BeatEntry {
        BeatEntry { name: name.into(), task: Task::PlanCrawls, period_secs }
    }

    #[test]
    fn never_fired_entries_are_due() {
        let entries = vec![entry("a", 60), entry("b", 3600)];
        let due = due_entries(&entries, &HashMap::new(), Utc::now());
        assert_eq!(due.len(), 2);
    }

    #[test]
    fn fired_entries_wait_their_period() {
        use chrono::TimeZone;
        let entries = vec![entry("a", 60)];
        let t0 = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let mut last = HashMap::new();
        last.insert("a".to_string(), t0);

        assert!(due_entries(&entries, &last, t0 + Duration::seconds(30)).is_empty());
        assert_eq!(due_entries(&entries, &last, t0 + Duration::seconds(60)).len(), 1);
    }

    #[tokio::test]
    async fn loader_failure_falls_back_to_empty() {
        let loaded = load_dynamic_with_retry(
            || async { Err::<Vec<CrawlSchedule>, _>(Error::Other("store down".into())) },
            1,
            0,
        )
        .await;
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn loader_success_passes_through() {
        let loaded = load_dynamic_with_retry(|| async { Ok(Vec::new()) }, 3, 0).await;
        assert!(loaded.is_empty());
    }
}
