//! Per-user digest preferences: a singleton row per user.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use rw_domain::model::{DigestFormat, DigestFrequency, DigestScope};

use crate::persist::{load_vec, store_vec};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DigestPreferences {
    pub user_id: Uuid,
    pub digest_enabled: bool,
    pub digest_frequency: DigestFrequency,
    pub digest_format: DigestFormat,
    /// Local send time "HH:MM"; the scheduler falls back to its
    /// configured default hour when unparsable.
    pub time: Option<String>,
    /// Allowed days of week. Sunday- or Monday-indexed sets are both
    /// accepted by the scheduler; empty means any day.
    #[serde(default)]
    pub days: Vec<u8>,
    pub timezone: String,
    pub last_sent_utc: Option<DateTime<Utc>>,
    pub telegram_enabled: bool,
    pub telegram_chat_id: Option<String>,
    pub telegram_digest_mode: DigestScope,
}

impl DigestPreferences {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            digest_enabled: true,
            digest_frequency: DigestFrequency::Daily,
            digest_format: DigestFormat::Short,
            time: None,
            days: Vec::new(),
            timezone: "UTC".to_string(),
            last_sent_utc: None,
            telegram_enabled: false,
            telegram_chat_id: None,
            telegram_digest_mode: DigestScope::All,
        }
    }
}

pub struct PreferencesStore {
    inner: RwLock<HashMap<Uuid, DigestPreferences>>,
    persist_path: PathBuf,
}

impl PreferencesStore {
    pub fn new(state_path: &std::path::Path) -> Self {
        let persist_path = state_path.join("digest_preferences.json");
        let prefs: Vec<DigestPreferences> = load_vec(&persist_path);
        let map = prefs.into_iter().map(|p| (p.user_id, p)).collect();
        Self { inner: RwLock::new(map), persist_path }
    }

    async fn persist(&self) {
        let prefs: Vec<DigestPreferences> = self.inner.read().await.values().cloned().collect();
        store_vec(self.persist_path.clone(), prefs).await;
    }

    /// Replace the user's singleton row.
    pub async fn upsert(&self, prefs: DigestPreferences) -> DigestPreferences {
        self.inner.write().await.insert(prefs.user_id, prefs.clone());
        self.persist().await;
        prefs
    }

    pub async fn get(&self, user_id: &Uuid) -> Option<DigestPreferences> {
        self.inner.read().await.get(user_id).cloned()
    }

    /// Users whose digests are enabled for one of `frequencies`.
    pub async fn enabled_for(&self, frequencies: &[DigestFrequency]) -> Vec<DigestPreferences> {
        self.inner
            .read()
            .await
            .values()
            .filter(|p| p.digest_enabled && frequencies.contains(&p.digest_frequency))
            .cloned()
            .collect()
    }

    /// Stamp a successful digest send.
    pub async fn mark_sent(&self, user_id: &Uuid, at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        if let Some(prefs) = inner.get_mut(user_id) {
            prefs.last_sent_utc = Some(at);
        }
        drop(inner);
        self.persist().await;
    }

    pub async fn delete(&self, user_id: &Uuid) -> bool {
        let removed = self.inner.write().await.remove(user_id).is_some();
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
    async fn upsert_keeps_one_row_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::new(dir.path());
        let user = Uuid::new_v4();

        store.upsert(DigestPreferences::new(user)).await;
        let mut updated = DigestPreferences::new(user);
        updated.digest_frequency = DigestFrequency::Weekly;
        store.upsert(updated).await;

        let prefs = store.get(&user).await.unwrap();
        assert_eq!(prefs.digest_frequency, DigestFrequency::Weekly);
        assert_eq!(store.enabled_for(&[DigestFrequency::Weekly]).await.len(), 1);
    }

    #[tokio::test]
    async fn enabled_for_filters_frequency_and_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::new(dir.path());

        let daily = DigestPreferences::new(Uuid::new_v4());
        store.upsert(daily).await;

        let mut off = DigestPreferences::new(Uuid::new_v4());
        off.digest_enabled = false;
        store.upsert(off).await;

        let mut weekly = DigestPreferences::new(Uuid::new_v4());
        weekly.digest_frequency = DigestFrequency::Weekly;
        store.upsert(weekly).await;

        let due = store.enabled_for(&[DigestFrequency::Daily, DigestFrequency::Custom]).await;
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn mark_sent_records_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::new(dir.path());
        let user = Uuid::new_v4();
        store.upsert(DigestPreferences::new(user)).await;

        let at = Utc::now();
        store.mark_sent(&user, at).await;
        assert_eq!(store.get(&user).await.unwrap().last_sent_utc, Some(at));
    }
}
