//! Shared provider interfaces.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rw_domain::model::SourceKind;
use rw_domain::Result;

/// Lightweight company descriptor passed to providers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompanyContext {
    pub id: Option<Uuid>,
    pub name: String,
    pub website: Option<String>,
    /// Explicit listing page configured on the company, if any.
    pub news_page_url: Option<String>,
}

/// Normalized unit of content produced by every provider.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NormalizedItem {
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub source_url: String,
    pub source_kind: SourceKind,
    /// Provider category hint; feeds the topic classifier as fallback.
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Blob path of the raw listing snapshot this item came from.
    #[serde(default)]
    pub raw_snapshot_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ProviderOptions {
    pub max_articles: usize,
    /// Previously seen source URLs within the lookback window.
    pub skip_urls: HashSet<String>,
    /// Extra listing URLs configured per source, tried before the
    /// registry candidates.
    pub source_overrides: Vec<String>,
}

impl ProviderOptions {
    pub fn with_max(max_articles: usize) -> Self {
        Self { max_articles, ..Self::default() }
    }
}

/// Capability set every provider implements.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn fetch(
        &self,
        company: &CompanyContext,
        options: &ProviderOptions,
    ) -> Result<Vec<NormalizedItem>>;

    /// Release any held resources. Default is a no-op.
    async fn close(&self) {}
}
