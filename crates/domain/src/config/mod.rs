//! Immutable configuration tree. Loaded once at startup from
//! environment variables (each field documents its variable) and
//! threaded into components through the runtime.

mod digest;
mod notifications;
mod observability;
mod scraper;
mod schedule;
mod storage;
mod telegram;

pub use digest::*;
pub use notifications::*;
pub use observability::*;
pub use scraper::*;
pub use schedule::*;
pub use storage::*;
pub use telegram::*;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Build the full config from the process environment. Invalid
    /// values are fatal; absent variables fall back to defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            storage: StorageConfig::from_env()?,
            scraper: ScraperConfig::from_env()?,
            schedule: ScheduleConfig::from_env()?,
            notifications: NotificationsConfig::from_env()?,
            digest: DigestConfig::from_env()?,
            telegram: TelegramConfig::from_env()?,
            observability: ObservabilityConfig::from_env()?,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Env helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub(crate) fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| Error::Config(format!("invalid {name}={raw}: {e}"))),
        None => Ok(default),
    }
}

pub(crate) fn env_bool(name: &str, default: bool) -> Result<bool> {
    match env_opt(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(Error::Config(format!("invalid {name}={other}"))),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_deserializes_from_empty_toml() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.scraper.max_retries, 3);
        assert_eq!(cfg.notifications.dispatch_batch_size, 25);
    }

    #[test]
    fn env_parse_rejects_garbage() {
        std::env::set_var("RW_TEST_BAD_PORT", "not-a-number");
        let err = env_parse::<u16>("RW_TEST_BAD_PORT", 0).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        std::env::remove_var("RW_TEST_BAD_PORT");
    }

    #[test]
    fn env_bool_accepts_common_forms() {
        std::env::set_var("RW_TEST_FLAG_ON", "yes");
        assert!(env_bool("RW_TEST_FLAG_ON", false).unwrap());
        std::env::remove_var("RW_TEST_FLAG_ON");
        assert!(!env_bool("RW_TEST_FLAG_MISSING", false).unwrap());
    }
}
