//! Source registry: resolves a (company, source-kind) pair to an
//! ordered candidate URL list and a provider binding.

use std::sync::Arc;

use rw_domain::model::{SnapshotKind, SourceKind};
use rw_parsers::html::normalize_url;

use crate::traits::{CompanyContext, Provider};

type ProviderPredicate = Box<dyn Fn(&CompanyContext) -> bool + Send + Sync>;
type ProviderFactory = Box<dyn Fn() -> Arc<dyn Provider> + Send + Sync>;

/// Default path templates appended to the website root per source
/// kind. Order is significance order; the first reachable page wins.
fn default_paths(kind: SourceKind) -> &'static [&'static str] {
    match kind {
        SourceKind::Blog => &[
            "/blog",
            "/blogs",
            "/news",
            "/insights",
            "/updates",
            "/company/blog",
            "/company/news",
            "/resources/blog",
            "/hub/blog",
            "/en/blog",
            "/en/news",
        ],
        SourceKind::NewsSite => &["/news", "/articles", "/stories", "/en/news"],
        SourceKind::PressRelease => &[
            "/press",
            "/newsroom",
            "/press-releases",
            "/media",
            "/media-center",
            "/press-center",
            "/announcements",
            "/en/press",
        ],
        // Feed-style kinds resolve through explicit handles, not paths.
        _ => &[],
    }
}

/// Pages observed by the change detector.
fn snapshot_paths(kind: SnapshotKind) -> &'static [&'static str] {
    match kind {
        SnapshotKind::Pricing => &["/pricing", "/plans", "/price", "/en/pricing"],
        SnapshotKind::Structure | SnapshotKind::Banners => &[""],
        SnapshotKind::Seo => &[""],
        SnapshotKind::Products => &["/products", "/solutions", "/features"],
        SnapshotKind::Jobs => &["/careers", "/jobs", "/join-us", "/about"],
    }
}

pub struct SourceRegistry {
    registrations: Vec<(ProviderPredicate, ProviderFactory)>,
    default_factory: ProviderFactory,
    /// Curated per-domain listing pages that beat the path heuristics.
    domain_overrides: Vec<(String, String)>,
}

impl SourceRegistry {
    pub fn new(default_factory: impl Fn() -> Arc<dyn Provider> + Send + Sync + 'static) -> Self {
        Self {
            registrations: Vec::new(),
            default_factory: Box::new(default_factory),
            domain_overrides: Vec::new(),
        }
    }

    /// Register a provider for companies matching `predicate`. First
    /// matching registration wins.
    pub fn register_provider(
        &mut self,
        predicate: impl Fn(&CompanyContext) -> bool + Send + Sync + 'static,
        factory: impl Fn() -> Arc<dyn Provider> + Send + Sync + 'static,
    ) {
        self.registrations.push((Box::new(predicate), Box::new(factory)));
    }

    /// Curated listing page for a website domain (e.g. a blog living
    /// on a subdomain the path templates cannot reach).
    pub fn register_domain_override(&mut self, domain: impl Into<String>, url: impl Into<String>) {
        self.domain_overrides.push((domain.into(), url.into()));
    }

    pub fn provider_for(&self, company: &CompanyContext) -> Arc<dyn Provider> {
        for (predicate, factory) in &self.registrations {
            if predicate(company) {
                return factory();
            }
        }
        (self.default_factory)()
    }

    /// Ordered candidate URLs for a (company, source-kind) pair:
    /// explicit configuration, then curated domain overrides, then the
    /// default path templates. Deduplicated, order preserved.
    pub fn candidate_urls(&self, company: &CompanyContext, kind: SourceKind) -> Vec<String> {
        let mut urls = Vec::new();

        if let Some(explicit) = &company.news_page_url {
            if let Some(normalized) = normalize_url(explicit) {
                urls.push(normalized);
            }
        }

        if let Some(base) = company.website.as_deref().and_then(site_root) {
            for (domain, url) in &self.domain_overrides {
                if base.contains(domain.as_str()) {
                    if let Some(normalized) = normalize_url(url) {
                        urls.push(normalized);
                    }
                }
            }
            for path in default_paths(kind) {
                if let Some(normalized) = normalize_url(&format!("{base}{path}")) {
                    urls.push(normalized);
                }
            }
        }

        dedup_preserving_order(urls)
    }

    /// Candidate URLs for a change-detection surface.
    pub fn snapshot_urls(&self, company: &CompanyContext, kind: SnapshotKind) -> Vec<String> {
        let Some(base) = company.website.as_deref().and_then(site_root) else {
            return Vec::new();
        };
        let urls = snapshot_paths(kind)
            .iter()
            .filter_map(|path| normalize_url(&format!("{base}{path}")))
            .collect();
        dedup_preserving_order(urls)
    }
}

/// Candidate list without curated overrides: the explicit listing page
/// followed by the default path templates. Providers use this directly
/// when they resolve their own sources.
pub fn default_candidate_urls(company: &CompanyContext, kind: SourceKind) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(explicit) = &company.news_page_url {
        if let Some(normalized) = normalize_url(explicit) {
            urls.push(normalized);
        }
    }
    if let Some(base) = company.website.as_deref().and_then(site_root) {
        for path in default_paths(kind) {
            if let Some(normalized) = normalize_url(&format!("{base}{path}")) {
                urls.push(normalized);
            }
        }
    }
    dedup_preserving_order(urls)
}

/// `scheme://host` of a website URL, tolerating a missing scheme.
fn site_root(website: &str) -> Option<String> {
    let candidate = if website.starts_with("http://") || website.starts_with("https://") {
        website.to_string()
    } else {
        format!("https://{website}")
    };
    let url = url::Url::parse(&candidate).ok()?;
    let host = url.host_str()?;
    Some(format!("{}://{host}", url.scheme()))
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}
