//! Channel transports: Telegram, generic webhook, Slack/Zapier
//! variants, and email via a provider HTTP API.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use rw_domain::config::Config;
use rw_domain::model::ChannelKind;
use rw_domain::{Error, Result};
use rw_fetch::SlidingWindowLimiter;
use rw_store::{NotificationChannel, NotificationEvent};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message shaping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Title and body rendered from an event payload.
pub fn render_message(event: &NotificationEvent) -> (String, String) {
    let payload = &event.payload;
    let company = payload.get("company_name").and_then(|v| v.as_str());

    let title = match (company, event.notification_type) {
        (Some(company), rw_domain::model::NotificationType::CompetitorChange) => {
            format!("{company}: competitor change detected")
        }
        (Some(company), rw_domain::model::NotificationType::NewsItem) => {
            format!("{company}: news update")
        }
        (Some(company), _) => format!("{company}: update"),
        (None, rw_domain::model::NotificationType::DailyTrend) => "Daily trend alert".to_string(),
        (None, rw_domain::model::NotificationType::CompanyActivity) => {
            "Company activity alert".to_string()
        }
        (None, _) => "RivalWatch notification".to_string(),
    };

    let mut lines = Vec::new();
    if let Some(summary) = payload.get("summary").and_then(|v| v.as_str()) {
        lines.push(summary.to_string());
    }
    if let Some(item_title) = payload.get("title").and_then(|v| v.as_str()) {
        lines.push(item_title.to_string());
    }
    if let Some(url) = payload.get("source_url").and_then(|v| v.as_str()) {
        lines.push(url.to_string());
    }
    if let (Some(topic), Some(count)) = (
        payload.get("topic").and_then(|v| v.as_str()),
        payload.get("count").and_then(|v| v.as_u64()),
    ) {
        lines.push(format!("{count} items on '{topic}' in the last 24h"));
    }
    if lines.is_empty() {
        lines.push(format!("{:?} event", event.notification_type));
    }
    (title, lines.join("\n"))
}

/// Split a message at `max_len`, preserving line boundaries. Long
/// single lines split at word boundaries; unbreakable runs are hard
/// truncated with an ellipsis.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut messages = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        if current.chars().count() + line.chars().count() + 1 > max_len {
            if !current.trim().is_empty() {
                messages.push(current.trim().to_string());
                current = String::new();
            }
            if line.chars().count() > max_len {
                let mut partial = String::new();
                for word in line.split(' ') {
                    if partial.chars().count() + word.chars().count() + 1 > max_len {
                        if !partial.is_empty() {
                            messages.push(partial.trim().to_string());
                            partial = word.to_string();
                        } else {
                            // A single unbreakable run.
                            let truncated: String = word.chars().take(max_len - 3).collect();
                            messages.push(format!("{truncated}..."));
                            partial = String::new();
                        }
                    } else if partial.is_empty() {
                        partial = word.to_string();
                    } else {
                        partial.push(' ');
                        partial.push_str(word);
                    }
                }
                current = partial;
            } else {
                current = line.to_string();
            }
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        messages.push(current.trim().to_string());
    }
    messages
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Transports {
    http: reqwest::Client,
    config: Arc<Config>,
    telegram_limiter: Arc<SlidingWindowLimiter>,
}

impl Transports {
    pub fn new(config: Arc<Config>, telegram_limiter: Arc<SlidingWindowLimiter>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("build transport client: {e}")))?;
        Ok(Self { http, config, telegram_limiter })
    }

    /// Ship one event to one channel. Returns response metadata kept
    /// on the delivery record.
    pub async fn deliver(
        &self,
        channel: &NotificationChannel,
        event: &NotificationEvent,
    ) -> Result<serde_json::Value> {
        match channel.kind {
            ChannelKind::Telegram => {
                let (title, body) = render_message(event);
                self.send_telegram(&channel.destination, &format!("*{title}*\n\n{body}")).await
            }
            ChannelKind::Webhook => self.send_webhook(channel, event).await,
            ChannelKind::Slack => {
                let (title, body) = render_message(event);
                self.post_json(&channel.destination, &json!({ "text": format!("{title}\n{body}") }))
                    .await
            }
            ChannelKind::Zapier => {
                self.post_json(
                    &channel.destination,
                    &json!({
                        "event_id": event.id,
                        "type": event.notification_type,
                        "payload": event.payload,
                    }),
                )
                .await
            }
            ChannelKind::Email => self.send_email(channel, event).await,
        }
    }

    /// Telegram `sendMessage`, segmented and rate limited per bot.
    pub async fn send_telegram(&self, chat_id: &str, text: &str) -> Result<serde_json::Value> {
        let token = self
            .config
            .telegram
            .bot_token
            .as_deref()
            .ok_or_else(|| Error::Config("telegram bot token not configured".into()))?;
        let url = format!("https://api.telegram.org/bot{token}/sendMessage");

        let parts = split_message(text, self.config.telegram.max_message_chars);
        let mut last_message_id = serde_json::Value::Null;
        for part in &parts {
            self.telegram_limiter.acquire("bot").await;
            let response = self
                .http
                .post(&url)
                .json(&json!({
                    "chat_id": chat_id,
                    "text": part,
                    "parse_mode": "Markdown",
                    "disable_web_page_preview": true,
                }))
                .send()
                .await
                .map_err(|e| Error::Transient(format!("telegram send: {e}")))?;

            let status = response.status();
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| Error::Transient(format!("telegram response: {e}")))?;
            if !status.is_success() || !body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
                let description = body
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error");
                return Err(Error::Transient(format!("telegram api {status}: {description}")));
            }
            last_message_id = body
                .get("result")
                .and_then(|r| r.get("message_id"))
                .cloned()
                .unwrap_or(serde_json::Value::Null);
        }
        Ok(json!({ "parts": parts.len(), "last_message_id": last_message_id }))
    }

    /// Ship pre-rendered content (digests) to any channel kind.
    pub async fn send_rendered(
        &self,
        channel: &NotificationChannel,
        title: &str,
        body: &str,
    ) -> Result<serde_json::Value> {
        match channel.kind {
            ChannelKind::Telegram => {
                self.send_telegram(&channel.destination, &format!("*{title}*\n\n{body}")).await
            }
            ChannelKind::Slack => {
                self.post_json(&channel.destination, &json!({ "text": format!("{title}\n{body}") }))
                    .await
            }
            ChannelKind::Webhook | ChannelKind::Zapier => {
                self.post_json(
                    &channel.destination,
                    &json!({ "title": title, "body": body, "delivered_at": Utc::now() }),
                )
                .await
            }
            ChannelKind::Email => {
                let endpoint = self
                    .config
                    .notifications
                    .smtp_url
                    .as_deref()
                    .ok_or_else(|| Error::Config("email endpoint not configured".into()))?;
                self.post_json(
                    endpoint,
                    &json!({
                        "from": self.config.notifications.from_email,
                        "to": channel.destination,
                        "subject": title,
                        "body": body,
                    }),
                )
                .await
            }
        }
    }

    async fn send_webhook(
        &self,
        channel: &NotificationChannel,
        event: &NotificationEvent,
    ) -> Result<serde_json::Value> {
        let body = json!({
            "event_id": event.id,
            "type": event.notification_type,
            "priority": event.priority,
            "payload": event.payload,
            "delivered_at": Utc::now(),
        });
        let response = self
            .http
            .post(&channel.destination)
            .header("Idempotency-Key", format!("{}:{}", event.id, channel.id))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("webhook post: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(json!({ "status": status.as_u16() }))
        } else if status.is_server_error() || status.as_u16() == 429 {
            Err(Error::Transient(format!("webhook responded {status}")))
        } else {
            Err(Error::Permanent(format!("webhook responded {status}")))
        }
    }

    async fn send_email(
        &self,
        channel: &NotificationChannel,
        event: &NotificationEvent,
    ) -> Result<serde_json::Value> {
        let endpoint = self
            .config
            .notifications
            .smtp_url
            .as_deref()
            .ok_or_else(|| Error::Config("email endpoint not configured".into()))?;
        let (title, body) = render_message(event);
        self.post_json(
            endpoint,
            &json!({
                "from": self.config.notifications.from_email,
                "to": channel.destination,
                "subject": title,
                "body": body,
            }),
        )
        .await
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("post {url}: {e}")))?;
        let status = response.status();
        if status.is_success() {
            Ok(json!({ "status": status.as_u16() }))
        } else {
            Err(Error::Transient(format!("{url} responded {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_pass_through() {
        assert_eq!(split_message("hello", 4000), vec!["hello".to_string()]);
    }

    #[test]
    fn long_messages_split_on_line_boundaries() {
        let text = (0..100).map(|i| format!("line number {i}")).collect::<Vec<_>>().join("\n");
        let parts = split_message(&text, 200);
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.chars().count() <= 200);
            assert!(part.starts_with("line"), "splits land between lines: {part:?}");
        }
    }

    #[test]
    fn overlong_single_line_splits_on_words() {
        let text = "word ".repeat(200);
        let parts = split_message(text.trim(), 100);
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.chars().count() <= 100);
            assert!(!part.contains("wo rd"), "words stay intact");
        }
    }

    #[test]
    fn unbreakable_run_is_hard_truncated_with_ellipsis() {
        let text = "x".repeat(500);
        let parts = split_message(&text, 100);
        assert!(parts[0].ends_with("..."));
        assert!(parts[0].chars().count() <= 100);
    }

    #[test]
    fn render_message_for_change_event() {
        let event = NotificationEvent::new(
            uuid::Uuid::new_v4(),
            rw_domain::model::NotificationType::CompetitorChange,
            0.8,
            json!({
                "company_name": "Acme",
                "summary": "price change for 'pro' (49 -> 59)",
            }),
            None,
            None,
        );
        let (title, body) = render_message(&event);
        assert_eq!(title, "Acme: competitor change detected");
        assert!(body.contains("price change"));
    }
}
