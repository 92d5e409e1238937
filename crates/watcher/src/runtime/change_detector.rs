//! Change detector: content-addressed snapshot capture plus per-kind
//! structured diffing between the current and the previous successful
//! snapshot of the same page.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use rw_domain::model::{ChangeNotificationStatus, ProcessingStatus, SnapshotKind};
use rw_domain::{Error, Result};
use rw_fetch::client::outcome_of;
use rw_fetch::FetchOptions;
use rw_parsers::banners::{parse_banners, BANNERS_PARSER_VERSION};
use rw_parsers::content_hash;
use rw_parsers::jobs::{parse_jobs, JOBS_PARSER_VERSION};
use rw_parsers::pricing::{parse_pricing, PRICING_PARSER_VERSION};
use rw_parsers::products::{parse_products, PRODUCTS_PARSER_VERSION};
use rw_parsers::seo::{parse_robots, parse_seo, parse_sitemap, SEO_PARSER_VERSION};
use rw_parsers::structure::{parse_structure, STRUCTURE_PARSER_VERSION};
use rw_providers::CompanyContext;
use rw_store::{ChangeEvent, Snapshot};

use super::diff::{self, ChangedField, SeoObservation};
use crate::state::AppState;

/// Sitemap sample size persisted per SEO observation.
const SITEMAP_URL_CAP: usize = 200;

/// All kinds observed for a change-detection profile.
const OBSERVED_KINDS: &[SnapshotKind] = &[
    SnapshotKind::Pricing,
    SnapshotKind::Structure,
    SnapshotKind::Seo,
    SnapshotKind::Products,
    SnapshotKind::Jobs,
    SnapshotKind::Banners,
];

pub fn parser_version(kind: SnapshotKind) -> &'static str {
    match kind {
        SnapshotKind::Pricing => PRICING_PARSER_VERSION,
        SnapshotKind::Structure => STRUCTURE_PARSER_VERSION,
        SnapshotKind::Seo => SEO_PARSER_VERSION,
        SnapshotKind::Products => PRODUCTS_PARSER_VERSION,
        SnapshotKind::Jobs => JOBS_PARSER_VERSION,
        SnapshotKind::Banners => BANNERS_PARSER_VERSION,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Observe every snapshot surface for a company. Returns the number of
/// change events emitted.
pub async fn observe_company(
    state: &AppState,
    company: &rw_store::Company,
    ctx: &CompanyContext,
) -> Result<usize> {
    let mut events = 0usize;
    for kind in OBSERVED_KINDS {
        match observe(state, company.id, ctx, *kind).await {
            Ok(Some(event)) => {
                events += 1;
                tracing::info!(
                    company_id = %company.id,
                    kind = %kind,
                    event_id = %event.id,
                    "change event emitted"
                );
            }
            Ok(None) => {}
            Err(e) => {
                // One dead surface never aborts the others.
                tracing::warn!(company_id = %company.id, kind = %kind, error = %e, "observation failed");
            }
        }
    }
    Ok(events)
}

/// Capture a snapshot for one surface and diff it against the previous
/// successful one. `None` means no comparable change.
pub async fn observe(
    state: &AppState,
    company_id: Uuid,
    ctx: &CompanyContext,
    kind: SnapshotKind,
) -> Result<Option<ChangeEvent>> {
    let Some((source_url, observation)) = capture(state, ctx, kind).await? else {
        return Ok(None);
    };

    let version = parser_version(kind);
    let previous = state
        .snapshots
        .latest_success(&company_id, &source_url, version)
        .await;

    let snapshot = Snapshot {
        id: Uuid::new_v4(),
        company_id,
        source_url: source_url.clone(),
        source_kind: kind,
        data_hash: observation.data_hash.clone(),
        normalized_data: observation.normalized.clone(),
        parser_version: version.to_string(),
        extracted_at: Utc::now(),
        warnings: observation.warnings.clone(),
        processing_status: observation.status,
        raw_snapshot_url: observation.raw_snapshot_url.clone(),
    };
    let snapshot = state.snapshots.insert(snapshot).await;

    if observation.status != ProcessingStatus::Success {
        return Ok(None);
    }
    let Some(previous) = previous else {
        tracing::debug!(%company_id, kind = %kind, "first snapshot, nothing to compare");
        return Ok(None);
    };
    if previous.data_hash == snapshot.data_hash {
        return Ok(None);
    }

    let fields = run_diff(kind, &previous.normalized_data, &snapshot.normalized_data)?;
    let summary = if fields.is_empty() {
        "content changed".to_string()
    } else {
        diff::summarize_fields(&fields)
    };

    let event = ChangeEvent {
        id: Uuid::new_v4(),
        company_id,
        source_kind: kind,
        change_summary: summary,
        changed_fields: serde_json::to_value(&fields)?,
        raw_diff: json!({
            "previous": previous.normalized_data,
            "current": snapshot.normalized_data,
        }),
        detected_at: Utc::now(),
        current_snapshot_id: snapshot.id,
        previous_snapshot_id: previous.id,
        current_data_hash: snapshot.data_hash.clone(),
        previous_data_hash: previous.data_hash.clone(),
        processing_status: ProcessingStatus::Success,
        notification_status: ChangeNotificationStatus::Pending,
    };
    let event = state.change_events.insert(event).await?;
    Ok(Some(event))
}

struct Observation {
    normalized: serde_json::Value,
    data_hash: String,
    warnings: Vec<String>,
    status: ProcessingStatus,
    raw_snapshot_url: Option<String>,
}

/// Fetch and parse one surface into its canonical normalized form.
/// `None` when no candidate URL is fetchable.
async fn capture(
    state: &AppState,
    ctx: &CompanyContext,
    kind: SnapshotKind,
) -> Result<Option<(String, Observation)>> {
    let options = FetchOptions {
        source_kind: Some(kind.as_str().to_string()),
        ..FetchOptions::default()
    };

    for url in state.registry.snapshot_urls(ctx, kind) {
        if state.health.is_disabled(&url).await {
            continue;
        }
        let result = state.fetcher.fetch(&url, &options).await;
        let status = result.as_ref().ok().map(|r| r.status);
        state.health.record(ctx.id, &url, outcome_of(&result), status).await;
        let Ok(response) = result else { continue };

        let raw_snapshot_url = response
            .snapshot_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let html = response.text();
        let final_url = response.final_url.clone();

        let mut observation = match kind {
            SnapshotKind::Pricing => {
                let parsed = parse_pricing(&html, Some(&final_url));
                let status = if parsed.plans.is_empty() {
                    ProcessingStatus::Skipped
                } else {
                    ProcessingStatus::Success
                };
                Observation {
                    data_hash: content_hash(&parsed.plans),
                    warnings: parsed.warnings.clone(),
                    normalized: serde_json::to_value(&parsed)?,
                    status,
                    raw_snapshot_url: None,
                }
            }
            SnapshotKind::Structure => {
                let parsed = parse_structure(&html, &final_url);
                Observation {
                    data_hash: content_hash(&parsed),
                    normalized: serde_json::to_value(&parsed)?,
                    warnings: Vec::new(),
                    status: ProcessingStatus::Success,
                    raw_snapshot_url: None,
                }
            }
            SnapshotKind::Seo => {
                let observation = capture_seo(state, &html, &final_url).await;
                Observation {
                    data_hash: content_hash(&observation),
                    normalized: serde_json::to_value(&observation)?,
                    warnings: Vec::new(),
                    status: ProcessingStatus::Success,
                    raw_snapshot_url: None,
                }
            }
            SnapshotKind::Products => {
                let items = parse_products(&html, &final_url);
                Observation {
                    data_hash: content_hash(&items),
                    normalized: serde_json::to_value(&items)?,
                    warnings: Vec::new(),
                    status: ProcessingStatus::Success,
                    raw_snapshot_url: None,
                }
            }
            SnapshotKind::Jobs => {
                let items = parse_jobs(&html, &final_url);
                Observation {
                    data_hash: content_hash(&items),
                    normalized: serde_json::to_value(&items)?,
                    warnings: Vec::new(),
                    status: ProcessingStatus::Success,
                    raw_snapshot_url: None,
                }
            }
            SnapshotKind::Banners => {
                let items = parse_banners(&html, &final_url);
                Observation {
                    data_hash: content_hash(&items),
                    normalized: serde_json::to_value(&items)?,
                    warnings: Vec::new(),
                    status: ProcessingStatus::Success,
                    raw_snapshot_url: None,
                }
            }
        };
        observation.raw_snapshot_url = raw_snapshot_url;
        return Ok(Some((url, observation)));
    }

    Ok(None)
}

/// SEO needs three probes: the page itself, robots.txt, and the first
/// sitemap robots points at.
async fn capture_seo(state: &AppState, html: &str, final_url: &str) -> SeoObservation {
    let page = parse_seo(html, final_url);

    let options = FetchOptions { source_kind: Some("seo".into()), ..FetchOptions::default() };
    let root = site_root(final_url);
    let robots = match &root {
        Some(root) => match state.fetcher.fetch(&format!("{root}/robots.txt"), &options).await {
            Ok(response) => parse_robots(&response.text()),
            Err(e) => {
                tracing::debug!(error = %e, "robots.txt unavailable");
                Default::default()
            }
        },
        None => Default::default(),
    };

    let sitemap_url = robots
        .sitemap_urls
        .first()
        .cloned()
        .or_else(|| root.map(|r| format!("{r}/sitemap.xml")));
    let sitemap = match sitemap_url {
        Some(url) => match state.fetcher.fetch(&url, &options).await {
            Ok(response) => parse_sitemap(&response.text(), SITEMAP_URL_CAP),
            Err(e) => {
                tracing::debug!(error = %e, "sitemap unavailable");
                Default::default()
            }
        },
        None => Default::default(),
    };

    SeoObservation { page, robots, sitemap }
}

fn site_root(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    Some(format!("{}://{}", parsed.scheme(), parsed.host_str()?))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Diff dispatch & recompute
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Kind-dispatched diff over persisted normalized payloads.
pub fn run_diff(
    kind: SnapshotKind,
    previous: &serde_json::Value,
    current: &serde_json::Value,
) -> Result<Vec<ChangedField>> {
    let fields = match kind {
        SnapshotKind::Pricing => diff::diff_pricing(
            &serde_json::from_value(previous.clone())?,
            &serde_json::from_value(current.clone())?,
        ),
        SnapshotKind::Structure => diff::diff_structure(
            &serde_json::from_value(previous.clone())?,
            &serde_json::from_value(current.clone())?,
        ),
        SnapshotKind::Seo => diff::diff_seo(
            &serde_json::from_value(previous.clone())?,
            &serde_json::from_value(current.clone())?,
        ),
        SnapshotKind::Products => {
            let prev: Vec<rw_parsers::products::ProductItem> = serde_json::from_value(previous.clone())?;
            let cur: Vec<rw_parsers::products::ProductItem> = serde_json::from_value(current.clone())?;
            diff::diff_products(&prev, &cur)
        }
        SnapshotKind::Jobs => {
            let prev: Vec<rw_parsers::jobs::JobPosting> = serde_json::from_value(previous.clone())?;
            let cur: Vec<rw_parsers::jobs::JobPosting> = serde_json::from_value(current.clone())?;
            diff::diff_jobs(&prev, &cur)
        }
        SnapshotKind::Banners => {
            let prev: Vec<rw_parsers::banners::Banner> = serde_json::from_value(previous.clone())?;
            let cur: Vec<rw_parsers::banners::Banner> = serde_json::from_value(current.clone())?;
            diff::diff_banners(&prev, &cur)
        }
    };
    Ok(fields)
}

/// Re-run the diff between the snapshots an event references. Events
/// whose notification already went out are never rewritten; re-emits
/// within the dedup TTL short-circuit to a no-op.
pub async fn recompute(state: &AppState, event_id: Uuid) -> Result<ChangeEvent> {
    let lock_key = format!("recompute:{event_id}");
    if !state.kv.set_nx(&lock_key, "recompute", state.config.schedule.dedup_ttl_secs) {
        tracing::info!(%event_id, "recompute already in flight within dedup ttl, no-op");
        metrics::counter!("scraper_duplicate_requests_total", "source_kind" => "recompute")
            .increment(1);
        return state
            .change_events
            .get(&event_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("change event {event_id}")));
    }

    let result = recompute_locked(state, event_id).await;
    if result.is_err() {
        // Free the lock early so a fixed caller can retry.
        state.kv.delete(&lock_key);
    }
    result
}

async fn recompute_locked(state: &AppState, event_id: Uuid) -> Result<ChangeEvent> {
    let event = state
        .change_events
        .get(&event_id)
        .await
        .ok_or_else(|| Error::NotFound(format!("change event {event_id}")))?;
    let current = state
        .snapshots
        .get(&event.current_snapshot_id)
        .await
        .ok_or_else(|| Error::NotFound("current snapshot".into()))?;
    let previous = state
        .snapshots
        .get(&event.previous_snapshot_id)
        .await
        .ok_or_else(|| Error::NotFound("previous snapshot".into()))?;

    let fields = run_diff(event.source_kind, &previous.normalized_data, &current.normalized_data)?;
    let summary = if fields.is_empty() {
        "content changed".to_string()
    } else {
        diff::summarize_fields(&fields)
    };
    state
        .change_events
        .update_diff(
            &event_id,
            summary,
            serde_json::to_value(&fields)?,
            json!({
                "previous": previous.normalized_data,
                "current": current.normalized_data,
            }),
            ProcessingStatus::Success,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use rw_parsers::pricing::parse_pricing;

    fn pricing_value(html: &str) -> serde_json::Value {
        serde_json::to_value(parse_pricing(html, Some("https://ex.com/pricing"))).unwrap()
    }

    #[test]
    fn run_diff_dispatches_pricing() {
        let previous = pricing_value(r#"<div class="plan"><h3>Pro</h3><span class="price">$49/mo</span></div>"#);
        let current = pricing_value(r#"<div class="plan"><h3>Pro</h3><span class="price">$59/mo</span></div>"#);
        let fields = run_diff(SnapshotKind::Pricing, &previous, &current).unwrap();
        assert_eq!(fields.len(), 1);
        assert!(matches!(&fields[0], ChangedField::PriceChange { plan, .. } if plan == "pro"));
    }

    #[tokio::test]
    async fn recompute_rewrites_pending_event() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let company = Uuid::new_v4();

        let make_snapshot = |html: &str| Snapshot {
            id: Uuid::new_v4(),
            company_id: company,
            source_url: "https://ex.com/pricing".into(),
            source_kind: SnapshotKind::Pricing,
            data_hash: content_hash(&html.to_string()),
            normalized_data: pricing_value(html),
            parser_version: PRICING_PARSER_VERSION.into(),
            extracted_at: Utc::now(),
            warnings: vec![],
            processing_status: ProcessingStatus::Success,
            raw_snapshot_url: None,
        };
        let previous = state
            .snapshots
            .insert(make_snapshot(r#"<div class="plan"><h3>Pro</h3><span class="price">$49/mo</span></div>"#))
            .await;
        let current = state
            .snapshots
            .insert(make_snapshot(r#"<div class="plan"><h3>Pro</h3><span class="price">$59/mo</span></div>"#))
            .await;

        let event = state
            .change_events
            .insert(ChangeEvent {
                id: Uuid::new_v4(),
                company_id: company,
                source_kind: SnapshotKind::Pricing,
                change_summary: "stale".into(),
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

        let recomputed = recompute(&state, event.id).await.unwrap();
        assert!(recomputed.change_summary.contains("price change"));

        // A second recompute within the dedup TTL is a no-op returning
        // the current record.
        let duplicate = recompute(&state, event.id).await.unwrap();
        assert_eq!(duplicate.change_summary, recomputed.change_summary);
    }
}
