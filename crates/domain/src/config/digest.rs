use serde::{Deserialize, Serialize};

use super::env_parse;
use crate::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Digest scheduling configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// `RW_DIGEST_TICK_SECS` — cadence of the digest eligibility scan.
    #[serde(default = "d_tick_secs")]
    pub tick_secs: u64,
    /// `RW_DIGEST_DEFAULT_HOUR` — scheduled hour used when a user has
    /// no custom "HH:MM" time.
    #[serde(default = "d_default_hour")]
    pub default_hour: u32,
    /// `RW_DIGEST_WINDOW_SECS` — width of the precise send window
    /// after the scheduled local time.
    #[serde(default = "d_window_secs")]
    pub window_secs: i64,
    /// `RW_DIGEST_MAX_ITEMS` — news items included per digest.
    #[serde(default = "d_max_items")]
    pub max_items: usize,
    /// `RW_DIGEST_CHANNEL_ITEMS` — items in the public channel digest.
    #[serde(default = "d_channel_items")]
    pub channel_items: usize,
}

fn d_tick_secs() -> u64 {
    60 * 60
}
fn d_default_hour() -> u32 {
    9
}
fn d_window_secs() -> i64 {
    3600
}
fn d_max_items() -> usize {
    25
}
fn d_channel_items() -> usize {
    20
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            tick_secs: d_tick_secs(),
            default_hour: d_default_hour(),
            window_secs: d_window_secs(),
            max_items: d_max_items(),
            channel_items: d_channel_items(),
        }
    }
}

impl DigestConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            tick_secs: env_parse("RW_DIGEST_TICK_SECS", d.tick_secs)?,
            default_hour: env_parse("RW_DIGEST_DEFAULT_HOUR", d.default_hour)?,
            window_secs: env_parse("RW_DIGEST_WINDOW_SECS", d.window_secs)?,
            max_items: env_parse("RW_DIGEST_MAX_ITEMS", d.max_items)?,
            channel_items: env_parse("RW_DIGEST_CHANNEL_ITEMS", d.channel_items)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_runs_hourly_at_nine_by_default() {
        let cfg = DigestConfig::default();
        assert_eq!(cfg.tick_secs, 3600);
        assert_eq!(cfg.default_hour, 9);
        assert_eq!(cfg.window_secs, 3600);
    }
}
