use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{env_opt, env_parse};
use crate::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `RW_STATE_DIR` — root of the JSON/JSONL state stores.
    #[serde(default = "d_state_dir")]
    pub state_dir: PathBuf,
    /// `RW_SNAPSHOT_DIR` — blob root for raw HTML snapshots
    /// (`{root}/{yyyy}/{mm}/{dd}/{sha256}.html`).
    #[serde(default = "d_snapshot_dir")]
    pub snapshot_dir: PathBuf,
    /// `RW_PRUNE_NEWS_DAYS` — news items older than this are pruned.
    #[serde(default = "d_prune_news_days")]
    pub prune_news_days: i64,
    /// `RW_PRUNE_NOTIFICATIONS_DAYS` — read notifications older than
    /// this are pruned.
    #[serde(default = "d_prune_notifications_days")]
    pub prune_notifications_days: i64,
}

fn d_state_dir() -> PathBuf {
    PathBuf::from("./data/state")
}
fn d_snapshot_dir() -> PathBuf {
    PathBuf::from("./data/raw_snapshots")
}
fn d_prune_news_days() -> i64 {
    180
}
fn d_prune_notifications_days() -> i64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: d_state_dir(),
            snapshot_dir: d_snapshot_dir(),
            prune_news_days: d_prune_news_days(),
            prune_notifications_days: d_prune_notifications_days(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            state_dir: env_opt("RW_STATE_DIR").map(PathBuf::from).unwrap_or(d.state_dir),
            snapshot_dir: env_opt("RW_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.snapshot_dir),
            prune_news_days: env_parse("RW_PRUNE_NEWS_DAYS", d.prune_news_days)?,
            prune_notifications_days: env_parse(
                "RW_PRUNE_NOTIFICATIONS_DAYS",
                d.prune_notifications_days,
            )?,
        })
    }
}
