//! TTL key-value store backing the dedup locks and shared counters.
//! Crash recovery is TTL expiry: a lock held by a dead worker frees
//! itself when its TTL lapses.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct KvStore {
    inner: Mutex<HashMap<String, Entry>>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// SET-if-absent with TTL. Returns `true` when the key was
    /// acquired, `false` when a live entry already holds it.
    pub fn set_nx(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        self.set_nx_at(key, value, ttl_secs, Utc::now())
    }

    pub fn set_nx_at(&self, key: &str, value: &str, ttl_secs: u64, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock();
        match inner.get(key) {
            Some(entry) if entry.expires_at > now => false,
            _ => {
                inner.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        expires_at: now + Duration::seconds(ttl_secs as i64),
                    },
                );
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Drop expired entries. Called from the maintenance tick.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.len();
        inner.retain(|_, e| e.expires_at > now);
        before - inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_nx_blocks_live_keys() {
        let kv = KvStore::new();
        assert!(kv.set_nx("lock:recompute:1", "worker-a", 900));
        assert!(!kv.set_nx("lock:recompute:1", "worker-b", 900));
        assert_eq!(kv.get("lock:recompute:1").as_deref(), Some("worker-a"));
    }

    #[test]
    fn expired_keys_are_reacquirable() {
        let kv = KvStore::new();
        let t0 = Utc::now();
        assert!(kv.set_nx_at("lock", "a", 900, t0));
        let after_ttl = t0 + Duration::seconds(901);
        assert!(kv.get_at("lock", after_ttl).is_none());
        assert!(kv.set_nx_at("lock", "b", 900, after_ttl));
    }

    #[test]
    fn delete_releases_early() {
        let kv = KvStore::new();
        assert!(kv.set_nx("lock", "a", 900));
        assert!(kv.delete("lock"));
        assert!(kv.set_nx("lock", "b", 900));
    }

    #[test]
    fn purge_drops_only_expired() {
        let kv = KvStore::new();
        let t0 = Utc::now();
        kv.set_nx_at("old", "x", 10, t0);
        kv.set_nx_at("new", "y", 1000, t0);
        assert_eq!(kv.purge_expired_at(t0 + Duration::seconds(11)), 1);
        assert!(kv.get_at("new", t0 + Duration::seconds(11)).is_some());
    }
}
