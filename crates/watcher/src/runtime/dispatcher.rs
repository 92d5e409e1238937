//! Delivery dispatcher: claims pending deliveries in batches, calls
//! the channel transport, and records outcomes. Change events linked
//! to a notification event get their notification status reconciled
//! here.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use rw_domain::model::{ChangeNotificationStatus, EventStatus};
use rw_domain::Result;

use crate::state::AppState;

pub async fn dispatch_deliveries(state: &AppState) -> Result<()> {
    // One dispatcher at a time: each (event, channel) pair must be
    // handled by at most one worker.
    if !state
        .kv
        .set_nx("dispatch-deliveries", "worker", state.config.schedule.task_hard_deadline_secs)
    {
        tracing::debug!("dispatch pass already running, skipping");
        return Ok(());
    }
    let result = dispatch_locked(state).await;
    state.kv.delete("dispatch-deliveries");
    result
}

async fn dispatch_locked(state: &AppState) -> Result<()> {
    let now = Utc::now();
    let expired = state.notifications.expire_due(now).await;
    if expired > 0 {
        tracing::info!(expired, "expired stale notification events");
    }

    let batch_size = state.config.notifications.dispatch_batch_size;
    let batch = state.notifications.claim_pending(batch_size, now).await;
    if batch.is_empty() {
        return Ok(());
    }
    tracing::info!(count = batch.len(), "dispatching notification deliveries");

    let mut touched_events: HashSet<Uuid> = HashSet::new();
    let mut sent = 0usize;
    let mut failed = 0usize;

    for (delivery, channel) in batch {
        let Some(event) = state.notifications.event(&delivery.event_id).await else {
            continue;
        };
        touched_events.insert(event.id);

        match state.transports.deliver(&channel, &event).await {
            Ok(metadata) => {
                state
                    .notifications
                    .record_attempt_success(&delivery.id, metadata)
                    .await?;
                sent += 1;
            }
            Err(e) => {
                state
                    .notifications
                    .record_attempt_failure(
                        &delivery.id,
                        &e.to_string(),
                        state.config.notifications.max_retries,
                        state.config.notifications.retry_base_secs,
                    )
                    .await?;
                failed += 1;
            }
        }
    }

    for event_id in touched_events {
        reconcile_change_event(state, &event_id).await;
    }

    tracing::info!(sent, failed, "delivery dispatch pass finished");
    Ok(())
}

/// Mirror a notification event's terminal state onto the change event
/// it was emitted for, if any.
async fn reconcile_change_event(state: &AppState, event_id: &Uuid) {
    let Some(event) = state.notifications.event(event_id).await else { return };
    let Some(change_event_id) = event
        .payload
        .get("change_event_id")
        .and_then(|v| v.as_str())
        .and_then(|v| Uuid::parse_str(v).ok())
    else {
        return;
    };

    let status = match event.status {
        EventStatus::Delivered => ChangeNotificationStatus::Sent,
        EventStatus::Failed => ChangeNotificationStatus::Failed,
        _ => return,
    };
    state
        .change_events
        .set_notification_status(&change_event_id, status)
        .await;
}
