//! Per-company ingestion: open a run, call the provider, classify and
//! store items, record the outcome. A KV lock serializes runs per
//! (company, source-kind).

use std::collections::HashSet;

use chrono::{Duration, Utc};
use uuid::Uuid;

use rw_domain::model::{CrawlMode, NewsTopic, RunStatus, SourceKind};
use rw_domain::{Error, Result};
use rw_providers::{CompanyContext, ProviderOptions};
use rw_store::NewsItem;

use super::{change_detector, nlp, notifications};
use crate::state::AppState;

pub async fn ingest_company(state: &AppState, company_id: Uuid) -> Result<()> {
    let Some(company) = state.companies.get(&company_id).await else {
        tracing::warn!(%company_id, "company not found, skipping ingestion");
        return Ok(());
    };
    if company.user_id.is_none() {
        tracing::info!(%company_id, company = %company.name, "global company, news parsing skipped");
        return Ok(());
    }
    if company.website.is_none() {
        tracing::warn!(%company_id, "company has no website, skipping");
        return Ok(());
    }

    // At most one in-flight run per (company, source-kind).
    let lock_key = format!("run:{company_id}:{}", SourceKind::Blog);
    if !state
        .kv
        .set_nx(&lock_key, "ingest", state.config.schedule.task_hard_deadline_secs)
    {
        tracing::info!(%company_id, "run already in flight, skipping duplicate task");
        return Ok(());
    }
    let result = ingest_locked(state, &company).await;
    state.kv.delete(&lock_key);
    result
}

async fn ingest_locked(state: &AppState, company: &rw_store::Company) -> Result<()> {
    let effective =
        super::schedule_engine::resolve_effective(&state.schedules, company.id, SourceKind::Blog).await;
    let profile = state
        .profiles
        .ensure(
            company.id,
            SourceKind::Blog,
            effective.mode,
            effective.schedule.as_ref().map(|s| s.id),
        )
        .await;
    let run = state
        .runs
        .open(profile.id, effective.schedule.as_ref().map(|s| s.id))
        .await;

    let ctx = CompanyContext {
        id: Some(company.id),
        name: company.name.clone(),
        website: company.website.clone(),
        news_page_url: company.news_page_url.clone(),
    };

    let outcome = match profile.mode {
        CrawlMode::AlwaysUpdate => ingest_items(state, company, &ctx).await,
        CrawlMode::ChangeDetection => {
            change_detector::observe_company(state, company, &ctx).await.map(|events| {
                // Change-detection runs carry no news items; the change
                // count decides change_detected.
                (0usize, events > 0)
            })
        }
    };

    match outcome {
        Ok((item_count, change_detected)) => {
            state
                .runs
                .close(&run.id, RunStatus::Success, item_count, change_detected, None)
                .await?;
            state
                .profiles
                .record_result(&company.id, SourceKind::Blog, true, change_detected, None)
                .await;
            tracing::info!(
                company_id = %company.id,
                item_count,
                change_detected,
                "ingestion run completed"
            );
            Ok(())
        }
        Err(e) => {
            state
                .runs
                .close(&run.id, RunStatus::Failed, 0, false, Some(e.to_string()))
                .await?;
            state
                .profiles
                .record_result(&company.id, SourceKind::Blog, false, false, None)
                .await;
            tracing::error!(company_id = %company.id, error = %e, "ingestion run failed");
            Ok(())
        }
    }
}

/// Fetch normalized items and store the new ones. Returns
/// (inserted_count, change_detected).
async fn ingest_items(
    state: &AppState,
    company: &rw_store::Company,
    ctx: &CompanyContext,
) -> Result<(usize, bool)> {
    let lookback = Duration::days(state.config.scraper.lookback_days);
    let skip_urls: HashSet<String> = state
        .news
        .recent_urls(&company.id, lookback)
        .await
        .into_iter()
        .collect();

    let provider = state.registry.provider_for(ctx);
    let options = ProviderOptions {
        max_articles: state.config.scraper.max_articles,
        skip_urls,
        source_overrides: Vec::new(),
    };
    let items = provider.fetch(ctx, &options).await?;
    provider.close().await;

    let mut inserted = 0usize;
    for item in items {
        if item.title.is_empty() || item.source_url.is_empty() {
            continue;
        }
        if state.news.exists(&item.source_url).await {
            metrics::counter!(
                "scraper_duplicate_requests_total",
                "source_kind" => item.source_kind.as_str()
            )
            .increment(1);
            continue;
        }

        match store_classified_item(state, company, item).await {
            Ok(stored) => {
                notifications::emit_news_event(state, &stored).await;
                inserted += 1;
            }
            Err(Error::Conflict(_)) => {
                // Lost an insert race to a concurrent worker; no-op.
                metrics::counter!(
                    "scraper_duplicate_requests_total",
                    "source_kind" => "race"
                )
                .increment(1);
            }
            Err(e) => return Err(e),
        }
    }

    Ok((inserted, inserted > 0))
}

/// Canonicalize, classify, and persist one normalized item.
async fn store_classified_item(
    state: &AppState,
    company: &rw_store::Company,
    item: rw_providers::NormalizedItem,
) -> Result<NewsItem> {
    let published_at = item.published_at.unwrap_or_else(Utc::now);
    let category = item.category.as_deref().and_then(NewsTopic::parse);

    let text = nlp::normalize_text(&[
        item.title.as_str(),
        item.summary.as_deref().unwrap_or(""),
        item.content.as_deref().unwrap_or(""),
    ]);
    let topic = nlp::classify_topic(&text, category);
    let sentiment = nlp::sentiment(&text);
    let priority = nlp::priority_score(&item.title, published_at, topic);
    let summary = item.summary.clone().or_else(|| {
        let body = item.content.as_deref().unwrap_or(&item.title);
        let generated = nlp::summarize(body, 3);
        (!generated.is_empty()).then_some(generated)
    });
    let keywords = nlp::extract_keywords(&text, 8);

    let news = NewsItem {
        id: Uuid::new_v4(),
        title: item.title,
        summary,
        content: item.content,
        source_url: item.source_url,
        source_kind: item.source_kind,
        company_id: Some(company.id),
        category,
        topic,
        sentiment,
        priority_score: priority,
        published_at,
        raw_snapshot_url: item.raw_snapshot_url,
        created_at: Utc::now(),
    };

    let stored = state.news.insert(news).await.inspect_err(|e| {
        if matches!(e, Error::Conflict(_)) {
            tracing::info!(error = %e, "duplicate source_url resolved as no-op");
        }
    })?;
    state.news.replace_keywords(&stored.id, keywords).await;
    Ok(stored)
}
