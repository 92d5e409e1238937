//! Shared JSON persistence helpers used by every store.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) fn load_vec<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match std::fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "state file unreadable, starting empty");
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    }
}

pub(crate) fn load_one<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "state file unreadable, starting empty");
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

/// Write the full aggregate off the async executor.
pub(crate) async fn store_vec<T: Serialize>(path: PathBuf, items: Vec<T>) {
    if let Ok(json) = serde_json::to_string_pretty(&items) {
        write_json(path, json).await;
    }
}

pub(crate) async fn store_one<T: Serialize>(path: PathBuf, value: T) {
    if let Ok(json) = serde_json::to_string_pretty(&value) {
        write_json(path, json).await;
    }
}

async fn write_json(path: PathBuf, json: String) {
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&path, json) {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist state");
        }
    })
    .await;
}
