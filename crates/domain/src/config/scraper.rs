use serde::{Deserialize, Serialize};

use super::{env_bool, env_opt, env_parse};
use crate::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scraper / fetcher configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// HTTP fetcher, rate limiting, and health-ledger tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// `RW_SCRAPER_USER_AGENT` — User-Agent sent on every fetch.
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    /// `RW_SCRAPER_TIMEOUT_SECS` — absolute deadline per fetch call.
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    /// `RW_SCRAPER_MAX_RETRIES` — retries on transient failures.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// `RW_SCRAPER_RETRY_BACKOFF` — exponential backoff multiplier.
    #[serde(default = "d_retry_backoff")]
    pub retry_backoff: f64,
    /// `RW_SCRAPER_RATE_LIMIT_REQUESTS` — requests allowed per host
    /// within the rate-limit window.
    #[serde(default = "d_rate_limit_requests")]
    pub rate_limit_requests: u32,
    /// `RW_SCRAPER_RATE_LIMIT_WINDOW_SECS` — rate-limit window.
    #[serde(default = "d_rate_limit_window")]
    pub rate_limit_window_secs: f64,
    /// `RW_SCRAPER_PROXY_URL` — optional HTTP proxy for fetches.
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// `RW_SCRAPER_HEADLESS_ENABLED` — allow the headless fallback for
    /// challenge-protected sources.
    #[serde(default)]
    pub headless_enabled: bool,
    /// `RW_SCRAPER_SNAPSHOTS_ENABLED` — persist raw HTML snapshots.
    #[serde(default = "d_true")]
    pub snapshots_enabled: bool,
    /// `RW_SCRAPER_MAX_BODY_BYTES` — hard response size cap (0 = off).
    #[serde(default = "d_max_body_bytes")]
    pub max_body_bytes: u64,
    /// `RW_HEALTH_FAIL_THRESHOLD` — weighted consecutive failures
    /// before a URL is disabled.
    #[serde(default = "d_fail_threshold")]
    pub health_fail_threshold: f64,
    /// `RW_HEALTH_TRANSIENT_WEIGHT` — weight of a transient failure
    /// toward the threshold (hard failures weigh 1.0).
    #[serde(default = "d_transient_weight")]
    pub health_transient_weight: f64,
    /// `RW_HEALTH_PROBATION_SECS` — decay interval before a disabled
    /// URL gets one probation fetch.
    #[serde(default = "d_probation_secs")]
    pub health_probation_secs: u64,
    /// `RW_SCRAPER_MAX_ARTICLES` — per-run article cap for providers.
    #[serde(default = "d_max_articles")]
    pub max_articles: usize,
    /// `RW_SCRAPER_LOOKBACK_DAYS` — skip-URL lookback window.
    #[serde(default = "d_lookback_days")]
    pub lookback_days: i64,
}

fn d_user_agent() -> String {
    "RivalWatchBot/1.0 (+https://rivalwatch.dev)".into()
}
fn d_timeout_secs() -> u64 {
    30
}
fn d_max_retries() -> u32 {
    3
}
fn d_retry_backoff() -> f64 {
    1.5
}
fn d_rate_limit_requests() -> u32 {
    6
}
fn d_rate_limit_window() -> f64 {
    60.0
}
fn d_true() -> bool {
    true
}
fn d_max_body_bytes() -> u64 {
    5 * 1024 * 1024
}
fn d_fail_threshold() -> f64 {
    3.0
}
fn d_transient_weight() -> f64 {
    0.5
}
fn d_probation_secs() -> u64 {
    24 * 60 * 60
}
fn d_max_articles() -> usize {
    10
}
fn d_lookback_days() -> i64 {
    14
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: d_user_agent(),
            timeout_secs: d_timeout_secs(),
            max_retries: d_max_retries(),
            retry_backoff: d_retry_backoff(),
            rate_limit_requests: d_rate_limit_requests(),
            rate_limit_window_secs: d_rate_limit_window(),
            proxy_url: None,
            headless_enabled: false,
            snapshots_enabled: d_true(),
            max_body_bytes: d_max_body_bytes(),
            health_fail_threshold: d_fail_threshold(),
            health_transient_weight: d_transient_weight(),
            health_probation_secs: d_probation_secs(),
            max_articles: d_max_articles(),
            lookback_days: d_lookback_days(),
        }
    }
}

impl ScraperConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            user_agent: env_opt("RW_SCRAPER_USER_AGENT").unwrap_or(d.user_agent),
            timeout_secs: env_parse("RW_SCRAPER_TIMEOUT_SECS", d.timeout_secs)?,
            max_retries: env_parse("RW_SCRAPER_MAX_RETRIES", d.max_retries)?,
            retry_backoff: env_parse("RW_SCRAPER_RETRY_BACKOFF", d.retry_backoff)?,
            rate_limit_requests: env_parse(
                "RW_SCRAPER_RATE_LIMIT_REQUESTS",
                d.rate_limit_requests,
            )?,
            rate_limit_window_secs: env_parse(
                "RW_SCRAPER_RATE_LIMIT_WINDOW_SECS",
                d.rate_limit_window_secs,
            )?,
            proxy_url: env_opt("RW_SCRAPER_PROXY_URL"),
            headless_enabled: env_bool("RW_SCRAPER_HEADLESS_ENABLED", d.headless_enabled)?,
            snapshots_enabled: env_bool("RW_SCRAPER_SNAPSHOTS_ENABLED", d.snapshots_enabled)?,
            max_body_bytes: env_parse("RW_SCRAPER_MAX_BODY_BYTES", d.max_body_bytes)?,
            health_fail_threshold: env_parse("RW_HEALTH_FAIL_THRESHOLD", d.health_fail_threshold)?,
            health_transient_weight: env_parse(
                "RW_HEALTH_TRANSIENT_WEIGHT",
                d.health_transient_weight,
            )?,
            health_probation_secs: env_parse("RW_HEALTH_PROBATION_SECS", d.health_probation_secs)?,
            max_articles: env_parse("RW_SCRAPER_MAX_ARTICLES", d.max_articles)?,
            lookback_days: env_parse("RW_SCRAPER_LOOKBACK_DAYS", d.lookback_days)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ScraperConfig::default();
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.rate_limit_requests, 6);
        assert!((cfg.rate_limit_window_secs - 60.0).abs() < f64::EPSILON);
        assert!((cfg.health_fail_threshold - 3.0).abs() < f64::EPSILON);
        assert!((cfg.health_transient_weight - 0.5).abs() < f64::EPSILON);
        assert!(cfg.snapshots_enabled);
        assert_eq!(cfg.max_articles, 10);
    }

    #[test]
    fn toml_overlay_overrides_defaults() {
        let cfg: ScraperConfig = toml::from_str(
            r#"
            user_agent = "Custom/2.0"
            max_retries = 5
            headless_enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.user_agent, "Custom/2.0");
        assert_eq!(cfg.max_retries, 5);
        assert!(cfg.headless_enabled);
        assert_eq!(cfg.timeout_secs, 30);
    }
}
