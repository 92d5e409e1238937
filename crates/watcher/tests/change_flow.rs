//! End-to-end pricing change flow over the stores: two snapshots, a
//! detected diff, notification fan-out with deduplication, and the
//! per-user delivery records — everything short of the wire.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use rw_domain::config::Config;
use rw_domain::model::{
    ChangeNotificationStatus, ChannelKind, NotificationType, ProcessingStatus, SnapshotKind,
};
use rw_parsers::content_hash;
use rw_parsers::pricing::{parse_pricing, PRICING_PARSER_VERSION};
use rw_store::{
    ChangeEvent, Company, NotificationChannel, NotificationSubscription, Snapshot,
    SubscriptionFilters,
};
use rw_watcher::runtime::change_detector::run_diff;
use rw_watcher::runtime::diff::{summarize_fields, ChangedField};
use rw_watcher::runtime::notifications::fan_out_change_events;
use rw_watcher::state::AppState;

fn build_state(dir: &std::path::Path) -> AppState {
    let mut config = Config::default();
    config.storage.state_dir = dir.join("state");
    config.storage.snapshot_dir = dir.join("blobs");
    config.scraper.snapshots_enabled = false;
    AppState::build(Arc::new(config)).expect("state")
}

const PRICING_T0: &str = r#"
    <div class="plan"><h3>Free</h3><span class="price">$0/mo</span></div>
    <div class="plan"><h3>Pro</h3><span class="price">$49/mo</span></div>
    <div class="plan"><h3>Enterprise</h3><span class="price">Contact sales</span></div>
"#;
const PRICING_T1: &str = r#"
    <div class="plan"><h3>Free</h3><span class="price">$0/mo</span></div>
    <div class="plan"><h3>Pro</h3><span class="price">$59/mo</span></div>
    <div class="plan"><h3>Team</h3><span class="price">$99/mo</span></div>
    <div class="plan"><h3>Enterprise</h3><span class="price">Contact sales</span></div>
"#;

fn pricing_snapshot(company: Uuid, html: &str) -> Snapshot {
    let parsed = parse_pricing(html, Some("https://ex.com/pricing"));
    Snapshot {
        id: Uuid::new_v4(),
        company_id: company,
        source_url: "https://ex.com/pricing".into(),
        source_kind: SnapshotKind::Pricing,
        data_hash: content_hash(&parsed.plans),
        normalized_data: serde_json::to_value(&parsed).unwrap(),
        parser_version: PRICING_PARSER_VERSION.into(),
        extracted_at: Utc::now(),
        warnings: parsed.warnings,
        processing_status: ProcessingStatus::Success,
        raw_snapshot_url: None,
    }
}

#[tokio::test]
async fn pricing_change_reaches_subscribed_user_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(dir.path());

    // A tracked company with an owner and a verified telegram channel.
    let user = Uuid::new_v4();
    let company = state
        .companies
        .insert(Company::new(Some(user), "Example", Some("https://ex.com".into())))
        .await
        .unwrap();
    let mut channel = NotificationChannel::new(user, ChannelKind::Telegram, "4242");
    channel.verified = true;
    let channel = state.notifications.add_channel(channel).await.unwrap();
    state
        .notifications
        .add_subscription(NotificationSubscription {
            id: Uuid::new_v4(),
            user_id: user,
            channel_id: channel.id,
            notification_type: NotificationType::CompetitorChange,
            filters: SubscriptionFilters::default(),
            min_priority: 0.0,
            enabled: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    // T0 and T1 snapshots of the pricing page.
    let previous = state.snapshots.insert(pricing_snapshot(company.id, PRICING_T0)).await;
    let current = state.snapshots.insert(pricing_snapshot(company.id, PRICING_T1)).await;
    assert_ne!(previous.data_hash, current.data_hash);

    // The structured diff carries the price change and the added plan.
    let fields = run_diff(
        SnapshotKind::Pricing,
        &previous.normalized_data,
        &current.normalized_data,
    )
    .unwrap();
    assert!(fields.iter().any(|f| matches!(
        f,
        ChangedField::PriceChange { plan, previous: Some(p), current: Some(c), .. }
            if plan == "pro" && *p == 49.0 && *c == 59.0
    )));
    assert!(fields
        .iter()
        .any(|f| matches!(f, ChangedField::AddedPlan { plan, .. } if plan == "team")));

    let event = state
        .change_events
        .insert(ChangeEvent {
            id: Uuid::new_v4(),
            company_id: company.id,
            source_kind: SnapshotKind::Pricing,
            change_summary: summarize_fields(&fields),
            changed_fields: serde_json::to_value(&fields).unwrap(),
            raw_diff: serde_json::json!({}),
            detected_at: Utc::now(),
            current_snapshot_id: current.id,
            previous_snapshot_id: previous.id,
            current_data_hash: current.data_hash.clone(),
            previous_data_hash: previous.data_hash.clone(),
            processing_status: ProcessingStatus::Success,
            notification_status: ChangeNotificationStatus::Pending,
        })
        .await
        .unwrap();

    // Fan-out queues one notification event with one delivery under
    // the snapshot-scoped dedup key.
    fan_out_change_events(&state).await.unwrap();
    let claimed = state.notifications.claim_pending(10, Utc::now()).await;
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].1.id, channel.id);

    let notification = state.notifications.event(&claimed[0].0.event_id).await.unwrap();
    assert_eq!(
        notification.deduplication_key.as_deref(),
        Some(format!("{}:pricing:{}", company.id, current.id).as_str())
    );

    // A second fan-out pass is a no-op: the dedup key suppresses the
    // re-emit and no extra deliveries appear.
    fan_out_change_events(&state).await.unwrap();
    assert_eq!(
        state
            .notifications
            .deliveries_for_event(&notification.id)
            .await
            .len(),
        1
    );
    let change = state.change_events.get(&event.id).await.unwrap();
    assert_eq!(change.notification_status, ChangeNotificationStatus::Pending);
}

#[tokio::test]
async fn change_event_without_subscribers_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(dir.path());

    let user = Uuid::new_v4();
    let company = state
        .companies
        .insert(Company::new(Some(user), "Quiet", Some("https://quiet.test".into())))
        .await
        .unwrap();

    let previous = state.snapshots.insert(pricing_snapshot(company.id, PRICING_T0)).await;
    let current = state.snapshots.insert(pricing_snapshot(company.id, PRICING_T1)).await;
    let event = state
        .change_events
        .insert(ChangeEvent {
            id: Uuid::new_v4(),
            company_id: company.id,
            source_kind: SnapshotKind::Pricing,
            change_summary: "change".into(),
            changed_fields: serde_json::json!([]),
            raw_diff: serde_json::json!({}),
            detected_at: Utc::now(),
            current_snapshot_id: current.id,
            previous_snapshot_id: previous.id,
            current_data_hash: current.data_hash.clone(),
            previous_data_hash: previous.data_hash.clone(),
            processing_status: ProcessingStatus::Success,
            notification_status: ChangeNotificationStatus::Pending,
        })
        .await
        .unwrap();

    fan_out_change_events(&state).await.unwrap();
    let change = state.change_events.get(&event.id).await.unwrap();
    assert_eq!(change.notification_status, ChangeNotificationStatus::Skipped);
}
