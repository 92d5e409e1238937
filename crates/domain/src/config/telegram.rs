use serde::{Deserialize, Serialize};

use super::{env_opt, env_parse};
use crate::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Telegram transport configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// `RW_TELEGRAM_BOT_TOKEN` — bot token; Telegram deliveries are
    /// skipped when unset.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// `RW_TELEGRAM_CHANNEL_ID` — public channel for the channel
    /// digest; disabled when unset.
    #[serde(default)]
    pub channel_id: Option<String>,
    /// `RW_TELEGRAM_MAX_PER_SECOND` — per-bot message rate limit.
    #[serde(default = "d_max_per_second")]
    pub max_per_second: u32,
    /// `RW_TELEGRAM_MAX_MESSAGE_CHARS` — split threshold per message.
    #[serde(default = "d_max_chars")]
    pub max_message_chars: usize,
}

fn d_max_per_second() -> u32 {
    20
}
fn d_max_chars() -> usize {
    4000
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel_id: None,
            max_per_second: d_max_per_second(),
            max_message_chars: d_max_chars(),
        }
    }
}

impl TelegramConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            bot_token: env_opt("RW_TELEGRAM_BOT_TOKEN"),
            channel_id: env_opt("RW_TELEGRAM_CHANNEL_ID"),
            max_per_second: env_parse("RW_TELEGRAM_MAX_PER_SECOND", d.max_per_second)?,
            max_message_chars: env_parse("RW_TELEGRAM_MAX_MESSAGE_CHARS", d.max_message_chars)?,
        })
    }

    pub fn enabled(&self) -> bool {
        self.bot_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_token() {
        let cfg = TelegramConfig::default();
        assert!(!cfg.enabled());
        assert_eq!(cfg.max_per_second, 20);
        assert_eq!(cfg.max_message_chars, 4000);
    }
}
