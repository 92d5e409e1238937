//! Notification core: per-user deduplicated events, subscription
//! matching with filters, and the analytics triggers (daily trends,
//! company activity).

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use rw_domain::model::{ChangeNotificationStatus, NewsTopic, NotificationType};
use rw_domain::Result;
use rw_store::{NewsItem, NotificationEvent, SubscriptionFilters};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Emission
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub enum EmitOutcome {
    /// Event queued with this many deliveries.
    Created { event_id: Uuid, deliveries: usize },
    /// An active event with the same dedup key already exists; the new
    /// emission was recorded as suppressed.
    Suppressed { existing_event_id: Uuid },
}

/// Queue a logical notification for one user. Dedup applies per
/// (user, type, dedup key) among active unexpired events.
pub async fn emit(
    state: &AppState,
    user_id: Uuid,
    notification_type: NotificationType,
    priority: f64,
    payload: serde_json::Value,
    deduplication_key: Option<String>,
) -> EmitOutcome {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(state.config.notifications.event_ttl_secs as i64);

    if let Some(key) = &deduplication_key {
        if let Some(existing) = state
            .notifications
            .find_active_duplicate(&user_id, notification_type, key, now)
            .await
        {
            let mut suppressed = NotificationEvent::new(
                user_id,
                notification_type,
                priority,
                payload,
                deduplication_key.clone(),
                Some(expires_at),
            );
            suppressed.status = rw_domain::model::EventStatus::Suppressed;
            state.notifications.insert_event(suppressed).await;
            tracing::info!(
                %user_id,
                dedup_key = %key,
                existing = %existing.id,
                "duplicate notification suppressed"
            );
            return EmitOutcome::Suppressed { existing_event_id: existing.id };
        }
    }

    let event = NotificationEvent::new(
        user_id,
        notification_type,
        priority,
        payload.clone(),
        deduplication_key,
        Some(expires_at),
    );
    let event = state.notifications.insert_event(event).await;

    // One delivery per matching subscription's channel; several
    // subscriptions on the same channel collapse into one delivery.
    let mut channel_ids: Vec<Uuid> = Vec::new();
    for (subscription, channel) in state.notifications.matching_subscriptions(notification_type).await {
        if subscription.user_id != user_id {
            continue;
        }
        if priority < subscription.min_priority {
            continue;
        }
        if !filters_match(&subscription.filters, &payload) {
            continue;
        }
        if !channel_ids.contains(&channel.id) {
            channel_ids.push(channel.id);
        }
    }
    for channel_id in &channel_ids {
        state.notifications.insert_delivery(event.id, *channel_id).await;
    }

    EmitOutcome::Created { event_id: event.id, deliveries: channel_ids.len() }
}

/// Structured filters against the event payload. Empty sets match
/// everything; a filter on a field the payload lacks rejects.
fn filters_match(filters: &SubscriptionFilters, payload: &serde_json::Value) -> bool {
    if !filters.topics.is_empty() {
        let topic = payload
            .get("topic")
            .and_then(|t| t.as_str())
            .and_then(NewsTopic::parse);
        match topic {
            Some(topic) if filters.topics.contains(&topic) => {}
            _ => return false,
        }
    }
    if !filters.source_kinds.is_empty() {
        let kind = payload.get("source_kind").and_then(|k| k.as_str());
        match kind {
            Some(kind) if filters.source_kinds.iter().any(|f| f == kind) => {}
            _ => return false,
        }
    }
    if !filters.companies.is_empty() {
        let company = payload
            .get("company_id")
            .and_then(|c| c.as_str())
            .and_then(|c| Uuid::parse_str(c).ok());
        match company {
            Some(company) if filters.companies.contains(&company) => {}
            _ => return false,
        }
    }
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Producers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Emit a news event for a freshly ingested item to the owning user.
pub async fn emit_news_event(state: &AppState, item: &NewsItem) {
    let Some(company_id) = item.company_id else { return };
    let Some(company) = state.companies.get(&company_id).await else { return };
    let Some(user_id) = company.user_id else { return };

    let payload = json!({
        "news_id": item.id,
        "company_id": company_id,
        "company_name": company.name,
        "title": item.title,
        "summary": item.summary,
        "source_url": item.source_url,
        "source_kind": item.source_kind.as_str(),
        "topic": item.topic,
        "sentiment": item.sentiment,
    });
    emit(
        state,
        user_id,
        NotificationType::NewsItem,
        item.priority_score,
        payload,
        Some(format!("news:{}", item.source_url)),
    )
    .await;
}

/// Expand pending change events into notification events. Events with
/// no reachable user or no matching subscriptions are marked skipped.
pub async fn fan_out_change_events(state: &AppState) -> Result<()> {
    for change in state.change_events.pending_notification().await {
        let Some(company) = state.companies.get(&change.company_id).await else {
            state
                .change_events
                .set_notification_status(&change.id, ChangeNotificationStatus::Skipped)
                .await;
            continue;
        };
        let Some(user_id) = company.user_id else {
            state
                .change_events
                .set_notification_status(&change.id, ChangeNotificationStatus::Skipped)
                .await;
            continue;
        };

        let payload = json!({
            "change_event_id": change.id,
            "company_id": change.company_id,
            "company_name": company.name,
            "source_kind": change.source_kind.as_str(),
            "summary": change.change_summary,
            "changed_fields": change.changed_fields,
        });
        let dedup_key = format!(
            "{}:{}:{}",
            change.company_id, change.source_kind, change.current_snapshot_id
        );

        match emit(state, user_id, NotificationType::CompetitorChange, 0.8, payload, Some(dedup_key))
            .await
        {
            EmitOutcome::Created { deliveries: 0, .. } => {
                state
                    .change_events
                    .set_notification_status(&change.id, ChangeNotificationStatus::Skipped)
                    .await;
            }
            EmitOutcome::Created { .. } | EmitOutcome::Suppressed { .. } => {
                // Stays pending until the dispatcher resolves the
                // in-flight deliveries one way or the other.
            }
        }
    }
    Ok(())
}

/// Category spike detection over the last 24 hours, per user.
pub async fn check_daily_trends(state: &AppState) -> Result<()> {
    let threshold = state.config.notifications.trend_threshold;
    let cutoff = Utc::now() - Duration::hours(24);
    let date = Utc::now().format("%Y-%m-%d");

    for user in users_with_companies(state).await {
        let companies: Vec<Uuid> = state
            .companies
            .tracked_by(&user)
            .await
            .iter()
            .map(|c| c.id)
            .collect();
        let items = state.news.published_since(cutoff, Some(&companies), 500).await;

        let mut counts: std::collections::BTreeMap<NewsTopic, usize> = Default::default();
        for item in &items {
            if let Some(topic) = item.topic {
                *counts.entry(topic).or_default() += 1;
            }
        }
        for (topic, count) in counts {
            if count < threshold {
                continue;
            }
            let payload = json!({
                "topic": topic,
                "count": count,
                "window_hours": 24,
            });
            emit(
                state,
                user,
                NotificationType::DailyTrend,
                0.5,
                payload,
                Some(format!("daily-trend:{}:{date}", serde_json::to_string(&topic)?.trim_matches('"'))),
            )
            .await;
        }
    }
    Ok(())
}

/// Burst detection: a tracked company with an unusual number of items
/// in the last 24 hours.
pub async fn check_company_activity(state: &AppState) -> Result<()> {
    let threshold = state.config.notifications.activity_threshold;
    let cutoff = Utc::now() - Duration::hours(24);
    let date = Utc::now().format("%Y-%m-%d");

    for user in users_with_companies(state).await {
        for company in state.companies.tracked_by(&user).await {
            let count = state
                .news
                .published_since(cutoff, Some(&[company.id]), 500)
                .await
                .len();
            if count < threshold {
                continue;
            }
            let payload = json!({
                "company_id": company.id,
                "company_name": company.name,
                "count": count,
                "window_hours": 24,
            });
            emit(
                state,
                user,
                NotificationType::CompanyActivity,
                0.6,
                payload,
                Some(format!("company-activity:{}:{date}", company.id)),
            )
            .await;
        }
    }
    Ok(())
}

async fn users_with_companies(state: &AppState) -> Vec<Uuid> {
    let mut users: Vec<Uuid> = state
        .companies
        .list()
        .await
        .into_iter()
        .filter_map(|c| c.user_id)
        .collect();
    users.sort();
    users.dedup();
    users
}
