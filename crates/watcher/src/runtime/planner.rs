//! Crawl planner: on each planner tick, fan out one ingestion task per
//! due company. Idempotent across duplicate ticks because the profile
//! `last_run_at` is stamped at enqueue time.

use chrono::Utc;

use rw_domain::model::SourceKind;
use rw_domain::Result;
use rw_fetch::client::outcome_of;
use rw_fetch::FetchOptions;
use rw_providers::CompanyContext;

use super::queue::{Task, TaskRouter};
use super::schedule_engine::{is_due, resolve_effective};
use crate::state::AppState;

pub async fn plan_crawls(state: &AppState, router: &TaskRouter) -> Result<()> {
    let companies = state.companies.crawlable().await;
    tracing::info!(count = companies.len(), "planner evaluating companies");

    let now = Utc::now();
    let mut due = 0usize;
    for company in companies {
        let effective = resolve_effective(&state.schedules, company.id, SourceKind::Blog).await;
        let profile = state
            .profiles
            .ensure(
                company.id,
                SourceKind::Blog,
                effective.mode,
                effective.schedule.as_ref().map(|s| s.id),
            )
            .await;

        if !is_due(&profile, &effective, now) {
            tracing::debug!(
                company_id = %company.id,
                company = %company.name,
                frequency = effective.frequency_seconds,
                "not due yet"
            );
            continue;
        }

        // Stamping before enqueue makes a duplicate tick a no-op.
        state
            .profiles
            .mark_run_started(&company.id, SourceKind::Blog, now)
            .await;
        router.enqueue(Task::IngestCompany { company_id: company.id });
        due += 1;
    }

    if due == 0 {
        tracing::info!("no companies due for crawling");
    } else {
        tracing::info!(due, "planner queued ingestion tasks");
    }
    Ok(())
}

/// One-shot sweep for a newly added company: probe every candidate URL
/// and feed outcomes into the health ledger so dead paths are disabled
/// before steady-state crawling begins.
pub async fn initial_scan(state: &AppState, company_id: uuid::Uuid) -> Result<()> {
    let Some(company) = state.companies.get(&company_id).await else {
        tracing::warn!(%company_id, "initial scan for unknown company");
        return Ok(());
    };
    if company.user_id.is_none() || company.website.is_none() {
        tracing::info!(%company_id, "skipping initial scan for global or siteless company");
        return Ok(());
    }

    let ctx = CompanyContext {
        id: Some(company.id),
        name: company.name.clone(),
        website: company.website.clone(),
        news_page_url: company.news_page_url.clone(),
    };

    let mut urls = Vec::new();
    for kind in [SourceKind::Blog, SourceKind::NewsSite, SourceKind::PressRelease] {
        urls.extend(state.registry.candidate_urls(&ctx, kind));
    }
    for kind in [
        rw_domain::model::SnapshotKind::Pricing,
        rw_domain::model::SnapshotKind::Products,
        rw_domain::model::SnapshotKind::Jobs,
    ] {
        urls.extend(state.registry.snapshot_urls(&ctx, kind));
    }
    urls.sort();
    urls.dedup();

    let options = FetchOptions { source_kind: Some("initial_scan".into()), ..FetchOptions::default() };
    let mut checked = 0usize;
    let mut failing = 0usize;
    for url in urls {
        let result = state.fetcher.fetch(&url, &options).await;
        let status = result.as_ref().ok().map(|r| r.status);
        let outcome = outcome_of(&result);
        if result.is_err() {
            failing += 1;
        }
        state.health.record(Some(company.id), &url, outcome, status).await;
        checked += 1;
    }

    tracing::info!(%company_id, checked, failing, "initial source scan finished");
    Ok(())
}
