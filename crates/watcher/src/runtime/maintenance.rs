//! Maintenance passes: the stale-run sweeper, retention pruning, and
//! gauge refreshes.

use chrono::Utc;

use rw_domain::Result;

use crate::state::AppState;

/// Reconcile runs abandoned past the hard deadline and refresh the
/// dead-URL gauges.
pub async fn sweep_runs(state: &AppState) -> Result<()> {
    let swept = state
        .runs
        .sweep_stale(state.config.schedule.task_hard_deadline_secs)
        .await;
    if !swept.is_empty() {
        tracing::warn!(count = swept.len(), "reconciled stale crawl runs");
    }

    for (company_id, count) in state.health.dead_url_counts().await {
        metrics::gauge!("scraper_dead_urls_count", "company_id" => company_id.to_string())
            .set(count as f64);
    }
    Ok(())
}

/// Retention pass: old news, old terminal notifications, expired
/// events, and expired KV locks.
pub async fn cleanup(state: &AppState) -> Result<()> {
    let pruned_news = state
        .news
        .prune_older_than(state.config.storage.prune_news_days)
        .await;
    let pruned_notifications = state
        .notifications
        .prune_older_than(state.config.storage.prune_notifications_days)
        .await;
    let expired_events = state.notifications.expire_due(Utc::now()).await;
    let purged_locks = state.kv.purge_expired();

    tracing::info!(
        pruned_news,
        pruned_notifications,
        expired_events,
        purged_locks,
        "cleanup pass finished"
    );
    Ok(())
}
