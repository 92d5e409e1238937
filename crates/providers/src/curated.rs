//! Curated provider for companies whose newsrooms are known to live at
//! fixed URLs. Bound through registry predicates so a curated match
//! beats the universal path walk.

use std::sync::Arc;

use rw_domain::model::SourceKind;
use rw_domain::Result;
use rw_fetch::client::outcome_of;
use rw_fetch::{FetchOptions, Fetcher, HealthLedger};
use rw_parsers::press::parse_press_list;

use crate::traits::{CompanyContext, NormalizedItem, Provider, ProviderOptions};

#[derive(Clone, Debug)]
pub struct CuratedSource {
    /// Lowercased company name the source belongs to.
    pub company_key: String,
    pub listing_url: String,
    pub kind: SourceKind,
    pub category: Option<String>,
}

pub struct CuratedProvider {
    fetcher: Arc<Fetcher>,
    health: Arc<HealthLedger>,
    sources: Vec<CuratedSource>,
}

impl CuratedProvider {
    pub fn new(fetcher: Arc<Fetcher>, health: Arc<HealthLedger>, sources: Vec<CuratedSource>) -> Self {
        Self { fetcher, health, sources }
    }

    /// Whether any curated source covers this company.
    pub fn covers(sources: &[CuratedSource], company: &CompanyContext) -> bool {
        let key = company.name.to_lowercase();
        sources.iter().any(|s| s.company_key == key)
    }
}

#[async_trait::async_trait]
impl Provider for CuratedProvider {
    async fn fetch(
        &self,
        company: &CompanyContext,
        options: &ProviderOptions,
    ) -> Result<Vec<NormalizedItem>> {
        let key = company.name.to_lowercase();
        let max = if options.max_articles == 0 { 10 } else { options.max_articles };
        let mut items = Vec::new();

        for source in self.sources.iter().filter(|s| s.company_key == key) {
            if self.health.is_disabled(&source.listing_url).await {
                continue;
            }
            let fetch_options = FetchOptions {
                source_kind: Some(source.kind.as_str().to_string()),
                ..FetchOptions::default()
            };
            let result = self.fetcher.fetch(&source.listing_url, &fetch_options).await;
            let status = result.as_ref().ok().map(|r| r.status);
            self.health
                .record(company.id, &source.listing_url, outcome_of(&result), status)
                .await;
            let Ok(response) = result else { continue };
            let snapshot_url = response
                .snapshot_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned());

            for release in parse_press_list(&response.text(), &response.final_url) {
                if release.url == response.final_url || options.skip_urls.contains(&release.url) {
                    continue;
                }
                items.push(NormalizedItem {
                    title: release.title,
                    summary: release.summary,
                    content: None,
                    source_url: release.url,
                    source_kind: source.kind,
                    category: source.category.clone(),
                    published_at: release.published_at,
                    raw_snapshot_url: snapshot_url.clone(),
                });
                if items.len() >= max {
                    return Ok(items);
                }
            }
        }
        Ok(items)
    }
}
