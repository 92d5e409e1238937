//! News corpus store. `source_url` is the primary uniqueness key;
//! a second insert of the same URL is a conflict the ingestion task
//! resolves as a no-op.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use rw_domain::model::{NewsTopic, Sentiment, SourceKind};
use rw_domain::{Error, Result};

use crate::persist::{load_one, store_one};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub source_url: String,
    pub source_kind: SourceKind,
    pub company_id: Option<Uuid>,
    /// Provider hint, validated against the topic vocabulary.
    pub category: Option<NewsTopic>,
    pub topic: Option<NewsTopic>,
    pub sentiment: Sentiment,
    /// In [0, 1].
    pub priority_score: f64,
    pub published_at: DateTime<Utc>,
    pub raw_snapshot_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewsKeyword {
    pub news_id: Uuid,
    pub keyword: String,
    pub relevance: f64,
}

#[derive(Serialize, Deserialize, Default)]
struct NewsState {
    items: Vec<NewsItem>,
    keywords: Vec<NewsKeyword>,
}

pub struct NewsStore {
    items: RwLock<HashMap<Uuid, NewsItem>>,
    by_url: RwLock<HashMap<String, Uuid>>,
    keywords: RwLock<Vec<NewsKeyword>>,
    persist_path: PathBuf,
}

impl NewsStore {
    pub fn new(state_path: &std::path::Path) -> Self {
        let persist_path = state_path.join("news.json");
        let state: NewsState = load_one(&persist_path);
        let by_url = state
            .items
            .iter()
            .map(|i| (i.source_url.clone(), i.id))
            .collect();
        let items = state.items.into_iter().map(|i| (i.id, i)).collect();
        Self {
            items: RwLock::new(items),
            by_url: RwLock::new(by_url),
            keywords: RwLock::new(state.keywords),
            persist_path,
        }
    }

    async fn persist(&self) {
        let state = NewsState {
            items: self.items.read().await.values().cloned().collect(),
            keywords: self.keywords.read().await.clone(),
        };
        store_one(self.persist_path.clone(), state).await;
    }

    /// Insert a news item; a duplicate `source_url` is a conflict.
    pub async fn insert(&self, item: NewsItem) -> Result<NewsItem> {
        {
            let mut by_url = self.by_url.write().await;
            if by_url.contains_key(&item.source_url) {
                return Err(Error::Conflict(format!("news item {} already exists", item.source_url)));
            }
            by_url.insert(item.source_url.clone(), item.id);
        }
        self.items.write().await.insert(item.id, item.clone());
        self.persist().await;
        Ok(item)
    }

    pub async fn exists(&self, source_url: &str) -> bool {
        self.by_url.read().await.contains_key(source_url)
    }

    pub async fn get(&self, id: &Uuid) -> Option<NewsItem> {
        self.items.read().await.get(id).cloned()
    }

    /// URLs seen for a company within the lookback window; fed to the
    /// provider as its skip set.
    pub async fn recent_urls(&self, company_id: &Uuid, lookback: Duration) -> Vec<String> {
        let cutoff = Utc::now() - lookback;
        self.items
            .read()
            .await
            .values()
            .filter(|i| i.company_id.as_ref() == Some(company_id) && i.created_at >= cutoff)
            .map(|i| i.source_url.clone())
            .collect()
    }

    pub async fn set_classification(
        &self,
        id: &Uuid,
        topic: Option<NewsTopic>,
        sentiment: Sentiment,
        priority_score: f64,
        summary: Option<String>,
    ) {
        let mut items = self.items.write().await;
        if let Some(item) = items.get_mut(id) {
            item.topic = topic;
            item.sentiment = sentiment;
            item.priority_score = priority_score.clamp(0.0, 1.0);
            if item.summary.is_none() {
                item.summary = summary;
            }
        }
        drop(items);
        self.persist().await;
    }

    pub async fn replace_keywords(&self, news_id: &Uuid, keywords: Vec<(String, f64)>) {
        let mut all = self.keywords.write().await;
        all.retain(|k| k.news_id != *news_id);
        all.extend(keywords.into_iter().map(|(keyword, relevance)| NewsKeyword {
            news_id: *news_id,
            keyword,
            relevance,
        }));
        drop(all);
        self.persist().await;
    }

    pub async fn keywords_for(&self, news_id: &Uuid) -> Vec<NewsKeyword> {
        self.keywords
            .read()
            .await
            .iter()
            .filter(|k| k.news_id == *news_id)
            .cloned()
            .collect()
    }

    /// Items published since `cutoff`, optionally restricted to a
    /// company set, best first (priority, then recency).
    pub async fn published_since(
        &self,
        cutoff: DateTime<Utc>,
        company_filter: Option<&[Uuid]>,
        limit: usize,
    ) -> Vec<NewsItem> {
        let mut items: Vec<NewsItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|i| i.published_at >= cutoff)
            .filter(|i| match company_filter {
                Some(companies) => i.company_id.as_ref().is_some_and(|c| companies.contains(c)),
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.published_at.cmp(&a.published_at))
        });
        items.truncate(limit);
        items
    }

    /// Drop items older than the retention window. Returns the number
    /// pruned.
    pub async fn prune_older_than(&self, days: i64) -> usize {
        let cutoff = Utc::now() - Duration::days(days);
        let mut removed_urls = Vec::new();
        let removed_ids: Vec<Uuid> = {
            let mut items = self.items.write().await;
            let ids: Vec<Uuid> = items
                .values()
                .filter(|i| i.published_at < cutoff)
                .map(|i| i.id)
                .collect();
            for id in &ids {
                if let Some(item) = items.remove(id) {
                    removed_urls.push(item.source_url);
                }
            }
            ids
        };
        if !removed_ids.is_empty() {
            {
                let mut by_url = self.by_url.write().await;
                for url in &removed_urls {
                    by_url.remove(url);
                }
            }
            let mut keywords = self.keywords.write().await;
            keywords.retain(|k| !removed_ids.contains(&k.news_id));
            drop(keywords);
            self.persist().await;
        }
        removed_ids.len()
    }
}
