//! Universal blog provider: walks the candidate listing pages for a
//! company, extracts article entries from the first page that yields
//! any, and normalizes them.

use std::sync::Arc;

use scraper::Html;

use rw_domain::model::SourceKind;
use rw_domain::Result;
use rw_fetch::client::outcome_of;
use rw_fetch::{FetchOptions, Fetcher, HealthLedger};
use rw_parsers::html::{element_text, resolve_url};
use rw_parsers::press::parse_press_list;

use crate::registry::default_candidate_urls;
use crate::traits::{CompanyContext, NormalizedItem, Provider, ProviderOptions};

/// Href fragments that mark a link as an article on listing pages
/// without semantic markup.
const ARTICLE_HREF_HINTS: &[&str] = &["/blog/", "/news/", "/post/", "/posts/", "/article/", "/articles/", "/story/"];
const MIN_LINK_TITLE_CHARS: usize = 15;

pub struct UniversalProvider {
    fetcher: Arc<Fetcher>,
    health: Arc<HealthLedger>,
    kind: SourceKind,
}

impl UniversalProvider {
    pub fn new(fetcher: Arc<Fetcher>, health: Arc<HealthLedger>, kind: SourceKind) -> Self {
        Self { fetcher, health, kind }
    }
}

#[async_trait::async_trait]
impl Provider for UniversalProvider {
    async fn fetch(
        &self,
        company: &CompanyContext,
        options: &ProviderOptions,
    ) -> Result<Vec<NormalizedItem>> {
        let mut candidates = options.source_overrides.clone();
        candidates.extend(default_candidate_urls(company, self.kind));

        let fetch_options = FetchOptions {
            source_kind: Some(self.kind.as_str().to_string()),
            ..FetchOptions::default()
        };

        for url in candidates {
            if self.health.is_disabled(&url).await {
                tracing::debug!(url, "skipping disabled candidate url");
                continue;
            }

            let result = self.fetcher.fetch(&url, &fetch_options).await;
            let status = result.as_ref().ok().map(|r| r.status);
            self.health
                .record(company.id, &url, outcome_of(&result), status)
                .await;

            let Ok(response) = result else { continue };
            let items = extract_listing_items(&response.text(), &response.final_url, self.kind);
            if items.is_empty() {
                continue;
            }
            let snapshot_url = response
                .snapshot_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned());

            let max = if options.max_articles == 0 { 10 } else { options.max_articles };
            let selected: Vec<NormalizedItem> = items
                .into_iter()
                .filter(|item| !options.skip_urls.contains(&item.source_url))
                .take(max)
                .map(|mut item| {
                    item.raw_snapshot_url = snapshot_url.clone();
                    item
                })
                .collect();
            tracing::info!(
                company = %company.name,
                url,
                count = selected.len(),
                "universal provider extracted items"
            );
            return Ok(selected);
        }

        tracing::info!(company = %company.name, "no candidate listing page yielded items");
        Ok(Vec::new())
    }
}

/// Pure extraction from a listing page: article-shaped entries first,
/// then a link-pattern fallback. Deduplicated by URL.
pub fn extract_listing_items(html: &str, base_url: &str, kind: SourceKind) -> Vec<NormalizedItem> {
    let mut items: Vec<NormalizedItem> = parse_press_list(html, base_url)
        .into_iter()
        .map(|press| NormalizedItem {
            title: press.title,
            summary: press.summary,
            content: None,
            source_url: press.url,
            source_kind: kind,
            category: None,
            published_at: press.published_at,
            raw_snapshot_url: None,
        })
        .collect();

    // Listing pages with plain link lists and no article markup.
    let doc = Html::parse_document(html);
    let link_sel = scraper::Selector::parse("a[href]").unwrap();
    for link in doc.select(&link_sel) {
        let Some(href) = link.value().attr("href") else { continue };
        let href_lower = href.to_lowercase();
        if !ARTICLE_HREF_HINTS.iter().any(|hint| href_lower.contains(hint)) {
            continue;
        }
        let title = element_text(link);
        if title.chars().count() < MIN_LINK_TITLE_CHARS {
            continue;
        }
        let Some(url) = resolve_url(base_url, href) else { continue };
        items.push(NormalizedItem {
            title,
            summary: None,
            content: None,
            source_url: url,
            source_kind: kind,
            category: None,
            published_at: None,
            raw_snapshot_url: None,
        });
    }

    let mut seen = std::collections::HashSet::new();
    items.retain(|item| {
        item.source_url != base_url && seen.insert(item.source_url.clone())
    });
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_entries_win_over_link_fallback() {
        let html = r#"
            <article>
              <h2>Introducing the new runtime</h2>
              <a href="/blog/new-runtime">Read</a>
              <p class="summary">Faster everywhere.</p>
            </article>
            <a href="/blog/new-runtime">Introducing the new runtime</a>
        "#;
        let items = extract_listing_items(html, "https://ex.com/blog", SourceKind::Blog);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Introducing the new runtime");
        assert_eq!(items[0].summary.as_deref(), Some("Faster everywhere."));
        assert_eq!(items[0].source_kind, SourceKind::Blog);
    }

    #[test]
    fn link_fallback_requires_articleish_href_and_real_title() {
        let html = r#"
            <a href="/blog/a-long-enough-article-title">A long enough article title</a>
            <a href="/blog/short">Short</a>
            <a href="/pricing">A perfectly long title but wrong path</a>
        "#;
        let items = extract_listing_items(html, "https://ex.com/blog", SourceKind::Blog);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_url, "https://ex.com/blog/a-long-enough-article-title");
    }

    #[test]
    fn listing_page_itself_is_never_an_item() {
        let html = r#"<div class="news-item"><a href="/blog">Back to all long posts list</a></div>"#;
        let items = extract_listing_items(html, "https://ex.com/blog", SourceKind::Blog);
        assert!(items.is_empty());
    }
}
