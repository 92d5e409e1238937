use serde::{Deserialize, Serialize};

use super::{env_opt, env_parse};
use crate::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Notification dispatch configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// `RW_NOTIFY_DISPATCH_BATCH` — pending deliveries claimed per
    /// dispatcher pass.
    #[serde(default = "d_batch")]
    pub dispatch_batch_size: usize,
    /// `RW_NOTIFY_MAX_RETRIES` — delivery attempts before `failed`.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// `RW_NOTIFY_RETRY_BASE_SECS` — base of the exponential retry
    /// backoff (`base * 2^(attempt-1)`).
    #[serde(default = "d_retry_base")]
    pub retry_base_secs: u64,
    /// `RW_NOTIFY_EVENT_TTL_SECS` — default expiry for queued events.
    #[serde(default = "d_event_ttl")]
    pub event_ttl_secs: u64,
    /// `RW_NOTIFY_FROM_EMAIL` — sender address for email deliveries.
    #[serde(default = "d_from_email")]
    pub from_email: String,
    /// `RW_NOTIFY_SMTP_URL` — SMTP endpoint or provider HTTP API URL.
    #[serde(default)]
    pub smtp_url: Option<String>,
    /// `RW_NOTIFY_TREND_THRESHOLD` — items per category per day that
    /// trigger a daily-trend event.
    #[serde(default = "d_trend_threshold")]
    pub trend_threshold: usize,
    /// `RW_NOTIFY_ACTIVITY_THRESHOLD` — items per company per day that
    /// trigger a company-activity event.
    #[serde(default = "d_activity_threshold")]
    pub activity_threshold: usize,
}

fn d_batch() -> usize {
    25
}
fn d_max_retries() -> u32 {
    3
}
fn d_retry_base() -> u64 {
    60
}
fn d_event_ttl() -> u64 {
    24 * 60 * 60
}
fn d_from_email() -> String {
    "noreply@rivalwatch.dev".into()
}
fn d_trend_threshold() -> usize {
    5
}
fn d_activity_threshold() -> usize {
    3
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            dispatch_batch_size: d_batch(),
            max_retries: d_max_retries(),
            retry_base_secs: d_retry_base(),
            event_ttl_secs: d_event_ttl(),
            from_email: d_from_email(),
            smtp_url: None,
            trend_threshold: d_trend_threshold(),
            activity_threshold: d_activity_threshold(),
        }
    }
}

impl NotificationsConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            dispatch_batch_size: env_parse("RW_NOTIFY_DISPATCH_BATCH", d.dispatch_batch_size)?,
            max_retries: env_parse("RW_NOTIFY_MAX_RETRIES", d.max_retries)?,
            retry_base_secs: env_parse("RW_NOTIFY_RETRY_BASE_SECS", d.retry_base_secs)?,
            event_ttl_secs: env_parse("RW_NOTIFY_EVENT_TTL_SECS", d.event_ttl_secs)?,
            from_email: env_opt("RW_NOTIFY_FROM_EMAIL").unwrap_or(d.from_email),
            smtp_url: env_opt("RW_NOTIFY_SMTP_URL"),
            trend_threshold: env_parse("RW_NOTIFY_TREND_THRESHOLD", d.trend_threshold)?,
            activity_threshold: env_parse("RW_NOTIFY_ACTIVITY_THRESHOLD", d.activity_threshold)?,
        })
    }
}
