//! Press-release provider: walks newsroom candidate pages and emits
//! press items.

use std::sync::Arc;

use rw_domain::model::SourceKind;
use rw_domain::Result;
use rw_fetch::client::outcome_of;
use rw_fetch::{FetchOptions, Fetcher, HealthLedger};
use rw_parsers::press::parse_press_list;

use crate::registry::default_candidate_urls;
use crate::traits::{CompanyContext, NormalizedItem, Provider, ProviderOptions};

pub struct PressReleaseProvider {
    fetcher: Arc<Fetcher>,
    health: Arc<HealthLedger>,
}

impl PressReleaseProvider {
    pub fn new(fetcher: Arc<Fetcher>, health: Arc<HealthLedger>) -> Self {
        Self { fetcher, health }
    }
}

#[async_trait::async_trait]
impl Provider for PressReleaseProvider {
    async fn fetch(
        &self,
        company: &CompanyContext,
        options: &ProviderOptions,
    ) -> Result<Vec<NormalizedItem>> {
        let mut candidates = options.source_overrides.clone();
        candidates.extend(default_candidate_urls(company, SourceKind::PressRelease));

        let fetch_options = FetchOptions {
            source_kind: Some(SourceKind::PressRelease.as_str().to_string()),
            ..FetchOptions::default()
        };

        for url in candidates {
            if self.health.is_disabled(&url).await {
                continue;
            }
            let result = self.fetcher.fetch(&url, &fetch_options).await;
            let status = result.as_ref().ok().map(|r| r.status);
            self.health
                .record(company.id, &url, outcome_of(&result), status)
                .await;
            let Ok(response) = result else { continue };
            let snapshot_url = response
                .snapshot_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned());

            let releases = parse_press_list(&response.text(), &response.final_url);
            if releases.is_empty() {
                continue;
            }

            let max = if options.max_articles == 0 { 10 } else { options.max_articles };
            let items: Vec<NormalizedItem> = releases
                .into_iter()
                .filter(|r| r.url != response.final_url)
                .filter(|r| !options.skip_urls.contains(&r.url))
                .take(max)
                .map(|r| NormalizedItem {
                    title: r.title,
                    summary: r.summary,
                    content: None,
                    source_url: r.url,
                    source_kind: SourceKind::PressRelease,
                    category: Some("press".to_string()),
                    published_at: r.published_at,
                    raw_snapshot_url: snapshot_url.clone(),
                })
                .collect();
            if !items.is_empty() {
                return Ok(items);
            }
        }
        Ok(Vec::new())
    }
}
