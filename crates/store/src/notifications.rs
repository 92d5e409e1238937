//! Notification aggregate: channels, subscriptions, events, and
//! per-channel deliveries live in one store so the cross-record
//! invariants (channel ownership, per-user dedup, event/delivery
//! status coupling) are enforced in one place.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use rw_domain::model::{ChannelKind, DeliveryStatus, EventStatus, NewsTopic, NotificationType};
use rw_domain::{Error, Result};

use crate::persist::{load_one, store_one};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: ChannelKind,
    /// Chat id, email address, webhook URL.
    pub destination: String,
    pub verified: bool,
    pub disabled: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NotificationChannel {
    pub fn new(user_id: Uuid, kind: ChannelKind, destination: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            destination: destination.into(),
            verified: false,
            disabled: false,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }
}

/// Empty filter sets match everything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubscriptionFilters {
    #[serde(default)]
    pub topics: Vec<NewsTopic>,
    #[serde(default)]
    pub source_kinds: Vec<String>,
    #[serde(default)]
    pub companies: Vec<Uuid>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub filters: SubscriptionFilters,
    pub min_priority: f64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub priority: f64,
    pub payload: serde_json::Value,
    pub deduplication_key: Option<String>,
    pub status: EventStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl NotificationEvent {
    pub fn new(
        user_id: Uuid,
        notification_type: NotificationType,
        priority: f64,
        payload: serde_json::Value,
        deduplication_key: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            notification_type,
            priority,
            payload,
            deduplication_key,
            status: EventStatus::Queued,
            scheduled_for: None,
            expires_at,
            created_at: Utc::now(),
            dispatched_at: None,
            delivered_at: None,
            error_message: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationDelivery {
    pub id: Uuid,
    pub event_id: Uuid,
    pub channel_id: Uuid,
    pub status: DeliveryStatus,
    pub attempt: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_metadata: serde_json::Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Default)]
struct NotificationsState {
    channels: Vec<NotificationChannel>,
    subscriptions: Vec<NotificationSubscription>,
    events: Vec<NotificationEvent>,
    deliveries: Vec<NotificationDelivery>,
}

struct Inner {
    channels: HashMap<Uuid, NotificationChannel>,
    subscriptions: HashMap<Uuid, NotificationSubscription>,
    events: HashMap<Uuid, NotificationEvent>,
    deliveries: HashMap<Uuid, NotificationDelivery>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NotificationStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct NotificationStore {
    inner: RwLock<Inner>,
    persist_path: PathBuf,
}

impl NotificationStore {
    pub fn new(state_path: &std::path::Path) -> Self {
        let persist_path = state_path.join("notifications.json");
        let state: NotificationsState = load_one(&persist_path);
        let inner = Inner {
            channels: state.channels.into_iter().map(|c| (c.id, c)).collect(),
            subscriptions: state.subscriptions.into_iter().map(|s| (s.id, s)).collect(),
            events: state.events.into_iter().map(|e| (e.id, e)).collect(),
            deliveries: state.deliveries.into_iter().map(|d| (d.id, d)).collect(),
        };
        Self { inner: RwLock::new(inner), persist_path }
    }

    async fn persist(&self) {
        let state = {
            let inner = self.inner.read().await;
            NotificationsState {
                channels: inner.channels.values().cloned().collect(),
                subscriptions: inner.subscriptions.values().cloned().collect(),
                events: inner.events.values().cloned().collect(),
                deliveries: inner.deliveries.values().cloned().collect(),
            }
        };
        store_one(self.persist_path.clone(), state).await;
    }

    // ── Channels ─────────────────────────────────────────────────────

    pub async fn add_channel(&self, channel: NotificationChannel) -> Result<NotificationChannel> {
        {
            let inner = self.inner.read().await;
            let duplicate = inner.channels.values().any(|c| {
                c.user_id == channel.user_id
                    && c.kind == channel.kind
                    && c.destination == channel.destination
            });
            if duplicate {
                return Err(Error::Conflict(format!(
                    "channel {:?}:{} already exists for user",
                    channel.kind, channel.destination
                )));
            }
        }
        self.inner.write().await.channels.insert(channel.id, channel.clone());
        self.persist().await;
        Ok(channel)
    }

    pub async fn update_channel(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut NotificationChannel),
    ) -> Option<NotificationChannel> {
        let mut inner = self.inner.write().await;
        let channel = inner.channels.get_mut(id)?;
        f(channel);
        let updated = channel.clone();
        drop(inner);
        self.persist().await;
        Some(updated)
    }

    pub async fn channel(&self, id: &Uuid) -> Option<NotificationChannel> {
        self.inner.read().await.channels.get(id).cloned()
    }

    pub async fn channels_for_user(&self, user_id: &Uuid) -> Vec<NotificationChannel> {
        self.inner
            .read()
            .await
            .channels
            .values()
            .filter(|c| c.user_id == *user_id)
            .cloned()
            .collect()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Add a subscription; the channel must exist and belong to the
    /// subscribing user.
    pub async fn add_subscription(
        &self,
        subscription: NotificationSubscription,
    ) -> Result<NotificationSubscription> {
        {
            let inner = self.inner.read().await;
            let channel = inner
                .channels
                .get(&subscription.channel_id)
                .ok_or_else(|| Error::NotFound(format!("channel {}", subscription.channel_id)))?;
            if channel.user_id != subscription.user_id {
                return Err(Error::Conflict(
                    "subscription channel belongs to a different user".into(),
                ));
            }
        }
        self.inner
            .write()
            .await
            .subscriptions
            .insert(subscription.id, subscription.clone());
        self.persist().await;
        Ok(subscription)
    }

    /// Enabled subscriptions for a notification type whose channel is
    /// verified and not disabled, paired with the channel.
    pub async fn matching_subscriptions(
        &self,
        notification_type: NotificationType,
    ) -> Vec<(NotificationSubscription, NotificationChannel)> {
        let inner = self.inner.read().await;
        inner
            .subscriptions
            .values()
            .filter(|s| s.enabled && s.notification_type == notification_type)
            .filter_map(|s| {
                let channel = inner.channels.get(&s.channel_id)?;
                if channel.verified && !channel.disabled {
                    Some((s.clone(), channel.clone()))
                } else {
                    None
                }
            })
            .collect()
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Active unexpired event with the same (user, type, dedup key).
    pub async fn find_active_duplicate(
        &self,
        user_id: &Uuid,
        notification_type: NotificationType,
        deduplication_key: &str,
        now: DateTime<Utc>,
    ) -> Option<NotificationEvent> {
        self.inner
            .read()
            .await
            .events
            .values()
            .find(|e| {
                e.user_id == *user_id
                    && e.notification_type == notification_type
                    && e.deduplication_key.as_deref() == Some(deduplication_key)
                    && e.status.is_active()
                    && e.expires_at.map_or(true, |exp| exp > now)
            })
            .cloned()
    }

    pub async fn insert_event(&self, event: NotificationEvent) -> NotificationEvent {
        self.inner.write().await.events.insert(event.id, event.clone());
        self.persist().await;
        event
    }

    pub async fn event(&self, id: &Uuid) -> Option<NotificationEvent> {
        self.inner.read().await.events.get(id).cloned()
    }

    pub async fn insert_delivery(&self, event_id: Uuid, channel_id: Uuid) -> NotificationDelivery {
        let delivery = NotificationDelivery {
            id: Uuid::new_v4(),
            event_id,
            channel_id,
            status: DeliveryStatus::Pending,
            attempt: 0,
            last_attempt_at: None,
            next_retry_at: None,
            response_metadata: serde_json::Value::Null,
            error: None,
            created_at: Utc::now(),
        };
        self.inner.write().await.deliveries.insert(delivery.id, delivery.clone());
        self.persist().await;
        delivery
    }

    pub async fn deliveries_for_event(&self, event_id: &Uuid) -> Vec<NotificationDelivery> {
        self.inner
            .read()
            .await
            .deliveries
            .values()
            .filter(|d| d.event_id == *event_id)
            .cloned()
            .collect()
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Claim up to `limit` deliveries ready for an attempt: pending
    /// first attempts, and retries whose backoff elapsed, on live
    /// channels. Their events move to `dispatched`.
    pub async fn claim_pending(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<(NotificationDelivery, NotificationChannel)> {
        let mut inner = self.inner.write().await;
        let mut ready: Vec<(NotificationDelivery, NotificationChannel)> = Vec::new();

        let mut candidates: Vec<Uuid> = inner
            .deliveries
            .values()
            .filter(|d| match d.status {
                DeliveryStatus::Pending => true,
                DeliveryStatus::Retrying => d.next_retry_at.map_or(true, |t| t <= now),
                _ => false,
            })
            .map(|d| d.id)
            .collect();
        candidates.sort_by_key(|id| inner.deliveries[id].created_at);

        for id in candidates.into_iter().take(limit) {
            let delivery = inner.deliveries[&id].clone();
            let Some(channel) = inner.channels.get(&delivery.channel_id).cloned() else {
                continue;
            };
            if !channel.verified || channel.disabled {
                continue;
            }
            if let Some(event) = inner.events.get_mut(&delivery.event_id) {
                if event.status == EventStatus::Queued {
                    event.status = EventStatus::Dispatched;
                    event.dispatched_at = Some(now);
                }
            }
            ready.push((delivery, channel));
        }
        drop(inner);
        if !ready.is_empty() {
            self.persist().await;
        }
        ready
    }

    pub async fn record_attempt_success(
        &self,
        delivery_id: &Uuid,
        response_metadata: serde_json::Value,
    ) -> Result<()> {
        let event_id = {
            let mut inner = self.inner.write().await;
            let delivery = inner
                .deliveries
                .get_mut(delivery_id)
                .ok_or_else(|| Error::NotFound(format!("delivery {delivery_id}")))?;
            if delivery.status.is_terminal() {
                return Err(Error::Conflict(format!("delivery {delivery_id} already terminal")));
            }
            delivery.attempt += 1;
            delivery.last_attempt_at = Some(Utc::now());
            delivery.next_retry_at = None;
            delivery.status = DeliveryStatus::Sent;
            delivery.response_metadata = response_metadata;
            delivery.error = None;
            let event_id = delivery.event_id;
            reconcile_event(&mut inner, &event_id);
            event_id
        };
        self.persist().await;
        tracing::debug!(%event_id, %delivery_id, "delivery sent");
        Ok(())
    }

    /// Record a failed attempt. Moves to `retrying` with exponential
    /// backoff until the retry budget is spent, then `failed`.
    pub async fn record_attempt_failure(
        &self,
        delivery_id: &Uuid,
        error: &str,
        max_retries: u32,
        retry_base_secs: u64,
    ) -> Result<NotificationDelivery> {
        let (updated, event_id) = {
            let mut inner = self.inner.write().await;
            let delivery = inner
                .deliveries
                .get_mut(delivery_id)
                .ok_or_else(|| Error::NotFound(format!("delivery {delivery_id}")))?;
            if delivery.status.is_terminal() {
                return Err(Error::Conflict(format!("delivery {delivery_id} already terminal")));
            }
            let now = Utc::now();
            delivery.attempt += 1;
            delivery.last_attempt_at = Some(now);
            delivery.error = Some(error.to_string());
            if delivery.attempt >= max_retries {
                delivery.status = DeliveryStatus::Failed;
                delivery.next_retry_at = None;
            } else {
                delivery.status = DeliveryStatus::Retrying;
                let backoff = retry_base_secs.saturating_mul(1u64 << (delivery.attempt - 1).min(20));
                delivery.next_retry_at = Some(now + Duration::seconds(backoff as i64));
            }
            let snapshot = delivery.clone();
            let event_id = delivery.event_id;
            reconcile_event(&mut inner, &event_id);
            (snapshot, event_id)
        };
        self.persist().await;
        tracing::debug!(%event_id, %delivery_id, status = ?updated.status, "delivery attempt failed");
        Ok(updated)
    }

    // ── Maintenance ──────────────────────────────────────────────────

    /// Expire queued/dispatched events past `expires_at`; their open
    /// deliveries are cancelled.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        let mut inner = self.inner.write().await;
        let expired_ids: Vec<Uuid> = inner
            .events
            .values()
            .filter(|e| e.status.is_active() && e.expires_at.is_some_and(|exp| exp <= now))
            .map(|e| e.id)
            .collect();
        for id in &expired_ids {
            if let Some(event) = inner.events.get_mut(id) {
                event.status = EventStatus::Expired;
                expired += 1;
            }
            let delivery_ids: Vec<Uuid> = inner
                .deliveries
                .values()
                .filter(|d| d.event_id == *id && !d.status.is_terminal())
                .map(|d| d.id)
                .collect();
            for did in delivery_ids {
                if let Some(delivery) = inner.deliveries.get_mut(&did) {
                    delivery.status = DeliveryStatus::Cancelled;
                    delivery.next_retry_at = None;
                }
            }
        }
        drop(inner);
        if expired > 0 {
            self.persist().await;
        }
        expired
    }

    /// Prune terminal events older than the retention window together
    /// with their deliveries.
    pub async fn prune_older_than(&self, days: i64) -> usize {
        let cutoff = Utc::now() - Duration::days(days);
        let mut inner = self.inner.write().await;
        let doomed: Vec<Uuid> = inner
            .events
            .values()
            .filter(|e| !e.status.is_active() && e.created_at < cutoff)
            .map(|e| e.id)
            .collect();
        for id in &doomed {
            inner.events.remove(id);
        }
        inner.deliveries.retain(|_, d| !doomed.contains(&d.event_id));
        let count = doomed.len();
        drop(inner);
        if count > 0 {
            self.persist().await;
        }
        count
    }

    pub async fn delete_for_user(&self, user_id: &Uuid) {
        let mut inner = self.inner.write().await;
        let events: Vec<Uuid> = inner
            .events
            .values()
            .filter(|e| e.user_id == *user_id)
            .map(|e| e.id)
            .collect();
        inner.events.retain(|_, e| e.user_id != *user_id);
        inner.deliveries.retain(|_, d| !events.contains(&d.event_id));
        inner.subscriptions.retain(|_, s| s.user_id != *user_id);
        inner.channels.retain(|_, c| c.user_id != *user_id);
        drop(inner);
        self.persist().await;
    }
}

/// Event status follows its deliveries: all sent means delivered, all
/// terminal without a single success means failed, anything else stays
/// dispatched.
fn reconcile_event(inner: &mut Inner, event_id: &Uuid) {
    let deliveries: Vec<&NotificationDelivery> = inner
        .deliveries
        .values()
        .filter(|d| d.event_id == *event_id)
        .collect();
    if deliveries.is_empty() {
        return;
    }
    let all_sent = deliveries.iter().all(|d| d.status == DeliveryStatus::Sent);
    let all_terminal = deliveries.iter().all(|d| d.status.is_terminal());
    let any_sent = deliveries.iter().any(|d| d.status == DeliveryStatus::Sent);

    if let Some(event) = inner.events.get_mut(event_id) {
        if all_sent {
            event.status = EventStatus::Delivered;
            event.delivered_at = Some(Utc::now());
        } else if all_terminal && !any_sent {
            event.status = EventStatus::Failed;
            event.error_message = Some("all deliveries failed".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_channel() -> (tempfile::TempDir, NotificationStore, Uuid, NotificationChannel) {
        let dir = tempfile::tempdir().unwrap();
        let store = NotificationStore::new(dir.path());
        let user = Uuid::new_v4();
        let mut channel = NotificationChannel::new(user, ChannelKind::Telegram, "12345");
        channel.verified = true;
        let channel = store.add_channel(channel).await.unwrap();
        (dir, store, user, channel)
    }

    #[tokio::test]
    async fn channel_unique_per_user_kind_destination() {
        let (_dir, store, user, _channel) = store_with_channel().await;
        let err = store
            .add_channel(NotificationChannel::new(user, ChannelKind::Telegram, "12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Same destination on another kind is fine.
        store
            .add_channel(NotificationChannel::new(user, ChannelKind::Webhook, "12345"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn subscription_requires_own_channel() {
        let (_dir, store, _user, channel) = store_with_channel().await;
        let stranger = Uuid::new_v4();
        let err = store
            .add_subscription(NotificationSubscription {
                id: Uuid::new_v4(),
                user_id: stranger,
                channel_id: channel.id,
                notification_type: NotificationType::CompetitorChange,
                filters: SubscriptionFilters::default(),
                min_priority: 0.0,
                enabled: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn active_duplicate_detection_honors_expiry() {
        let (_dir, store, user, _channel) = store_with_channel().await;
        let now = Utc::now();
        let event = NotificationEvent::new(
            user,
            NotificationType::DailyTrend,
            0.5,
            serde_json::json!({}),
            Some("daily-trend:2025-03-10".into()),
            Some(now + Duration::hours(1)),
        );
        store.insert_event(event).await;

        assert!(store
            .find_active_duplicate(&user, NotificationType::DailyTrend, "daily-trend:2025-03-10", now)
            .await
            .is_some());
        assert!(store
            .find_active_duplicate(&user, NotificationType::DailyTrend, "other-key", now)
            .await
            .is_none());
        // After expiry the key is free again.
        assert!(store
            .find_active_duplicate(
                &user,
                NotificationType::DailyTrend,
                "daily-trend:2025-03-10",
                now + Duration::hours(2)
            )
            .await
            .is_none());
    }

    #[tokio::test]
    async fn delivery_lifecycle_reaches_delivered() {
        let (_dir, store, user, channel) = store_with_channel().await;
        let event = store
            .insert_event(NotificationEvent::new(
                user,
                NotificationType::CompetitorChange,
                0.9,
                serde_json::json!({"summary": "price change"}),
                None,
                None,
            ))
            .await;
        let delivery = store.insert_delivery(event.id, channel.id).await;

        let claimed = store.claim_pending(10, Utc::now()).await;
        assert_eq!(claimed.len(), 1);
        assert_eq!(store.event(&event.id).await.unwrap().status, EventStatus::Dispatched);

        store
            .record_attempt_success(&delivery.id, serde_json::json!({"message_id": 1}))
            .await
            .unwrap();
        let event = store.event(&event.id).await.unwrap();
        assert_eq!(event.status, EventStatus::Delivered);
        assert!(event.delivered_at.is_some());
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_fails_delivery_then_event() {
        let (_dir, store, user, channel) = store_with_channel().await;
        let event = store
            .insert_event(NotificationEvent::new(
                user,
                NotificationType::CompetitorChange,
                0.9,
                serde_json::json!({}),
                None,
                None,
            ))
            .await;
        let delivery = store.insert_delivery(event.id, channel.id).await;
        store.claim_pending(10, Utc::now()).await;

        let first = store
            .record_attempt_failure(&delivery.id, "connect timeout", 3, 60)
            .await
            .unwrap();
        assert_eq!(first.status, DeliveryStatus::Retrying);
        assert_eq!(first.attempt, 1);
        assert!(first.next_retry_at.is_some());

        let second = store
            .record_attempt_failure(&delivery.id, "connect timeout", 3, 60)
            .await
            .unwrap();
        assert_eq!(second.status, DeliveryStatus::Retrying);
        assert!(second.next_retry_at.unwrap() > first.next_retry_at.unwrap());

        let third = store
            .record_attempt_failure(&delivery.id, "connect timeout", 3, 60)
            .await
            .unwrap();
        assert_eq!(third.status, DeliveryStatus::Failed);
        assert_eq!(third.attempt, 3);

        let event = store.event(&event.id).await.unwrap();
        assert_eq!(event.status, EventStatus::Failed, "all deliveries terminal without success");

        let err = store
            .record_attempt_failure(&delivery.id, "late", 3, 60)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "terminal delivery immutable");
    }

    #[tokio::test]
    async fn mixed_outcomes_keep_event_dispatched() {
        let (_dir, store, user, channel) = store_with_channel().await;
        let mut webhook = NotificationChannel::new(user, ChannelKind::Webhook, "https://hook");
        webhook.verified = true;
        let webhook = store.add_channel(webhook).await.unwrap();

        let event = store
            .insert_event(NotificationEvent::new(
                user,
                NotificationType::CompetitorChange,
                0.9,
                serde_json::json!({}),
                None,
                None,
            ))
            .await;
        let d1 = store.insert_delivery(event.id, channel.id).await;
        let d2 = store.insert_delivery(event.id, webhook.id).await;
        store.claim_pending(10, Utc::now()).await;

        store.record_attempt_success(&d1.id, serde_json::Value::Null).await.unwrap();
        assert_eq!(
            store.event(&event.id).await.unwrap().status,
            EventStatus::Dispatched,
            "one sent, one open"
        );

        // The other channel eventually fails; one success means the
        // event never becomes failed.
        store.record_attempt_failure(&d2.id, "410", 1, 60).await.unwrap();
        assert_eq!(store.event(&event.id).await.unwrap().status, EventStatus::Dispatched);
    }

    #[tokio::test]
    async fn claim_skips_unverified_and_disabled_channels() {
        let (_dir, store, user, channel) = store_with_channel().await;
        let mut dead = NotificationChannel::new(user, ChannelKind::Email, "a@b.c");
        dead.verified = false;
        let dead = store.add_channel(dead).await.unwrap();

        let event = store
            .insert_event(NotificationEvent::new(
                user,
                NotificationType::NewsItem,
                0.3,
                serde_json::json!({}),
                None,
                None,
            ))
            .await;
        store.insert_delivery(event.id, channel.id).await;
        store.insert_delivery(event.id, dead.id).await;

        let claimed = store.claim_pending(10, Utc::now()).await;
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].1.id, channel.id);
    }

    #[tokio::test]
    async fn expiry_cancels_open_deliveries() {
        let (_dir, store, user, channel) = store_with_channel().await;
        let now = Utc::now();
        let event = store
            .insert_event(NotificationEvent::new(
                user,
                NotificationType::DailyTrend,
                0.2,
                serde_json::json!({}),
                Some("k".into()),
                Some(now - Duration::seconds(1)),
            ))
            .await;
        let delivery = store.insert_delivery(event.id, channel.id).await;

        let expired = store.expire_due(now).await;
        assert_eq!(expired, 1);
        assert_eq!(store.event(&event.id).await.unwrap().status, EventStatus::Expired);
        let d = store.deliveries_for_event(&event.id).await;
        assert_eq!(d[0].status, DeliveryStatus::Cancelled);
        drop(delivery);
    }
}
