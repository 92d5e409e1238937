//! Company store. `(owner, normalized_website)` is unique within an
//! owner scope; companies without an owner are "global".

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use rw_domain::{Error, Result};

use crate::persist::{load_vec, store_vec};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    /// Owning user; `None` marks a global company.
    pub user_id: Option<Uuid>,
    pub name: String,
    pub website: Option<String>,
    pub news_page_url: Option<String>,
    pub category: Option<String>,
    /// Social handles keyed by platform tag.
    #[serde(default)]
    pub handles: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn new(user_id: Option<Uuid>, name: impl Into<String>, website: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            website,
            news_page_url: None,
            category: None,
            handles: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

fn normalized_website(website: &str) -> String {
    website
        .trim()
        .to_lowercase()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.")
        .trim_end_matches('/')
        .to_string()
}

pub struct CompanyStore {
    inner: RwLock<HashMap<Uuid, Company>>,
    persist_path: PathBuf,
}

impl CompanyStore {
    pub fn new(state_path: &std::path::Path) -> Self {
        let persist_path = state_path.join("companies.json");
        let companies: Vec<Company> = load_vec(&persist_path);
        let map = companies.into_iter().map(|c| (c.id, c)).collect();
        Self { inner: RwLock::new(map), persist_path }
    }

    async fn persist(&self) {
        let companies: Vec<Company> = self.inner.read().await.values().cloned().collect();
        store_vec(self.persist_path.clone(), companies).await;
    }

    /// Insert a company, rejecting a duplicate website within the same
    /// owner scope.
    pub async fn insert(&self, company: Company) -> Result<Company> {
        {
            let inner = self.inner.read().await;
            if let Some(website) = &company.website {
                let normalized = normalized_website(website);
                let duplicate = inner.values().any(|existing| {
                    existing.user_id == company.user_id
                        && existing
                            .website
                            .as_deref()
                            .is_some_and(|w| normalized_website(w) == normalized)
                });
                if duplicate {
                    return Err(Error::Conflict(format!(
                        "company with website {website} already tracked in this scope"
                    )));
                }
            }
        }
        self.inner.write().await.insert(company.id, company.clone());
        self.persist().await;
        Ok(company)
    }

    pub async fn get(&self, id: &Uuid) -> Option<Company> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<Company> {
        let mut companies: Vec<Company> = self.inner.read().await.values().cloned().collect();
        companies.sort_by_key(|c| c.created_at);
        companies
    }

    /// Companies with an owner and a website, newest first. Global
    /// companies are the planner's job to skip, so they are excluded
    /// here already.
    pub async fn crawlable(&self) -> Vec<Company> {
        let mut companies: Vec<Company> = self
            .inner
            .read()
            .await
            .values()
            .filter(|c| c.user_id.is_some() && c.website.is_some())
            .cloned()
            .collect();
        companies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        companies
    }

    pub async fn tracked_by(&self, user_id: &Uuid) -> Vec<Company> {
        self.inner
            .read()
            .await
            .values()
            .filter(|c| c.user_id.as_ref() == Some(user_id))
            .cloned()
            .collect()
    }

    pub async fn delete(&self, id: &Uuid) -> bool {
        let removed = self.inner.write().await.remove(id).is_some();
        if removed {
            self.persist().await;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_website_same_owner_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CompanyStore::new(dir.path());
        let owner = Uuid::new_v4();

        store
            .insert(Company::new(Some(owner), "Ex", Some("https://ex.com".into())))
            .await
            .unwrap();
        let err = store
            .insert(Company::new(Some(owner), "Ex again", Some("http://www.ex.com/".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn same_website_different_owner_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CompanyStore::new(dir.path());

        store
            .insert(Company::new(Some(Uuid::new_v4()), "Ex", Some("https://ex.com".into())))
            .await
            .unwrap();
        store
            .insert(Company::new(Some(Uuid::new_v4()), "Ex", Some("https://ex.com".into())))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn crawlable_excludes_global_and_siteless() {
        let dir = tempfile::tempdir().unwrap();
        let store = CompanyStore::new(dir.path());

        store
            .insert(Company::new(None, "Global", Some("https://g.com".into())))
            .await
            .unwrap();
        store.insert(Company::new(Some(Uuid::new_v4()), "NoSite", None)).await.unwrap();
        store
            .insert(Company::new(Some(Uuid::new_v4()), "Ok", Some("https://ok.com".into())))
            .await
            .unwrap();

        let crawlable = store.crawlable().await;
        assert_eq!(crawlable.len(), 1);
        assert_eq!(crawlable[0].name, "Ok");
    }

    #[tokio::test]
    async fn companies_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = CompanyStore::new(dir.path());
            let company = store
                .insert(Company::new(Some(Uuid::new_v4()), "Ex", Some("https://ex.com".into())))
                .await
                .unwrap();
            company.id
        };
        let reloaded = CompanyStore::new(dir.path());
        assert!(reloaded.get(&id).await.is_some());
    }
}
