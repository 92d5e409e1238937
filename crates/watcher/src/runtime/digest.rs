//! Digest scheduler: hourly eligibility evaluation against each
//! user's wall-clock schedule, per-user digest composition and
//! delivery, and the public channel digest.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, Utc};
use uuid::Uuid;

use rw_domain::model::{DigestFormat, DigestFrequency, DigestScope, NewsTopic};
use rw_domain::Result;
use rw_store::{DigestPreferences, NewsItem};

use super::queue::{Task, TaskRouter};
use crate::state::AppState;

/// Parse a timezone string into a `chrono_tz::Tz`, falling back to UTC.
pub fn parse_tz(tz: &str) -> chrono_tz::Tz {
    tz.parse::<chrono_tz::Tz>().unwrap_or(chrono_tz::UTC)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Eligibility
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_hhmm(time: Option<&str>, default_hour: u32) -> (u32, u32) {
    let Some(time) = time else { return (default_hour, 0) };
    let Some((h, m)) = time.split_once(':') else { return (default_hour, 0) };
    match (h.parse::<u32>(), m.parse::<u32>()) {
        (Ok(h), Ok(m)) if h < 24 && m < 60 => (h, m),
        _ => (default_hour, 0),
    }
}

/// Precise send-window check, DST-aware via the user's timezone.
///
/// A user is due iff: not already sent on this local date (local week
/// for weekly), today is an allowed day (Sunday- and Monday-indexed
/// day sets are both tolerated; empty means any day), and the local
/// time is within `[scheduled, scheduled + window]`.
pub fn is_due_at(
    prefs: &DigestPreferences,
    now_utc: DateTime<Utc>,
    default_hour: u32,
    window_secs: i64,
) -> bool {
    if !prefs.digest_enabled || prefs.digest_frequency == DigestFrequency::Off {
        return false;
    }

    let tz = parse_tz(&prefs.timezone);
    let now_local = now_utc.with_timezone(&tz);

    if let Some(last_sent) = prefs.last_sent_utc {
        let last_local = last_sent.with_timezone(&tz);
        let already = match prefs.digest_frequency {
            DigestFrequency::Weekly => last_local.iso_week() == now_local.iso_week(),
            _ => last_local.date_naive() == now_local.date_naive(),
        };
        if already {
            return false;
        }
    }

    if !prefs.days.is_empty() {
        let monday_based = now_local.weekday().num_days_from_monday() as u8;
        let sunday_based = now_local.weekday().num_days_from_sunday() as u8;
        if !prefs.days.contains(&monday_based) && !prefs.days.contains(&sunday_based) {
            return false;
        }
    }

    let (hour, minute) = parse_hhmm(prefs.time.as_deref(), default_hour);
    let Some(scheduled) = now_local
        .date_naive()
        .and_hms_opt(hour, minute, 0)
    else {
        return false;
    };
    let elapsed = (now_local.naive_local() - scheduled).num_seconds();
    (0..=window_secs).contains(&elapsed)
}

/// Hourly tick: fan out one digest task per eligible user.
pub async fn digest_tick(state: &AppState, router: &TaskRouter) -> Result<()> {
    let now = Utc::now();
    let candidates = state
        .preferences
        .enabled_for(&[DigestFrequency::Daily, DigestFrequency::Weekly, DigestFrequency::Custom])
        .await;
    tracing::info!(count = candidates.len(), "evaluating digest eligibility");

    let mut queued = 0usize;
    for prefs in candidates {
        if is_due_at(
            &prefs,
            now,
            state.config.digest.default_hour,
            state.config.digest.window_secs,
        ) {
            router.enqueue(Task::UserDigest {
                user_id: prefs.user_id,
                frequency: prefs.digest_frequency,
            });
            queued += 1;
        }
    }
    tracing::info!(queued, "digest tasks queued");
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Composition & delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn generate_user_digest(
    state: &AppState,
    user_id: Uuid,
    frequency: DigestFrequency,
) -> Result<()> {
    let started = Instant::now();
    let Some(prefs) = state.preferences.get(&user_id).await else {
        tracing::warn!(%user_id, "digest requested for user without preferences");
        return Ok(());
    };

    // Guards against a duplicate task queued by overlapping ticks
    // within the send window.
    let lock_key = format!("digest:{user_id}");
    if !state
        .kv
        .set_nx(&lock_key, "digest", state.config.digest.window_secs.max(0) as u64)
    {
        tracing::info!(%user_id, "digest already in flight, skipping duplicate task");
        return Ok(());
    }

    let period_days = match frequency {
        DigestFrequency::Weekly => 7,
        _ => 1,
    };
    let now = Utc::now();
    let cutoff = now - Duration::days(period_days);

    let tracked: Vec<Uuid> = state
        .companies
        .tracked_by(&user_id)
        .await
        .iter()
        .map(|c| c.id)
        .collect();
    let company_filter = match prefs.telegram_digest_mode {
        DigestScope::Tracked => Some(tracked.as_slice()),
        DigestScope::All => None,
    };
    let items = state
        .news
        .published_since(cutoff, company_filter, state.config.digest.max_items)
        .await;

    let digest_label = match frequency {
        DigestFrequency::Weekly => "weekly",
        DigestFrequency::Custom => "custom",
        _ => "daily",
    };
    let title = format!("Your {digest_label} competitor digest");
    let body = render_digest(&items, prefs.digest_format, period_days);

    // Per-channel failures leave the other channels unaffected; one
    // success marks the cycle sent.
    let mut delivered = false;
    let channels = state.notifications.channels_for_user(&user_id).await;
    for channel in channels.iter().filter(|c| c.verified && !c.disabled) {
        if channel.kind == rw_domain::model::ChannelKind::Telegram && !prefs.telegram_enabled {
            continue;
        }
        match state.transports.send_rendered(channel, &title, &body).await {
            Ok(_) => delivered = true,
            Err(e) => {
                tracing::warn!(%user_id, channel_id = %channel.id, error = %e, "digest channel delivery failed");
            }
        }
    }

    // Legacy path: a chat id on the preferences without a channel row.
    if !delivered && prefs.telegram_enabled {
        if let Some(chat_id) = &prefs.telegram_chat_id {
            match state
                .transports
                .send_telegram(chat_id, &format!("*{title}*\n\n{body}"))
                .await
            {
                Ok(_) => delivered = true,
                Err(e) => tracing::warn!(%user_id, error = %e, "telegram digest delivery failed"),
            }
        }
    }

    if delivered {
        state.preferences.mark_sent(&user_id, now).await;
        tracing::info!(%user_id, digest_type = digest_label, items = items.len(), "digest sent");
    } else {
        // Leave the cycle unsent so the next eligible tick retries.
        state.kv.delete(&lock_key);
        tracing::warn!(%user_id, "digest produced but no channel accepted it");
    }

    metrics::histogram!("digest_duration_seconds", "digest_type" => digest_label)
        .record(started.elapsed().as_secs_f64());
    Ok(())
}

/// Daily top-news digest for the public channel.
pub async fn channel_digest(state: &AppState) -> Result<()> {
    let Some(channel_id) = state.config.telegram.channel_id.clone() else {
        tracing::debug!("no public channel configured, skipping channel digest");
        return Ok(());
    };
    let started = Instant::now();
    let cutoff = Utc::now() - Duration::days(1);
    let items = state
        .news
        .published_since(cutoff, None, state.config.digest.channel_items)
        .await;
    if items.is_empty() {
        tracing::info!("no news for channel digest");
        return Ok(());
    }

    let body = render_digest(&items, DigestFormat::Short, 1);
    state
        .transports
        .send_telegram(&channel_id, &format!("*Daily competitor digest*\n\n{body}"))
        .await?;
    metrics::histogram!("digest_duration_seconds", "digest_type" => "channel")
        .record(started.elapsed().as_secs_f64());
    Ok(())
}

/// Markdown rendering grouped by topic, best items first.
pub fn render_digest(items: &[NewsItem], format: DigestFormat, period_days: i64) -> String {
    if items.is_empty() {
        return "No new competitor activity in this period.".to_string();
    }

    let mut grouped: BTreeMap<String, Vec<&NewsItem>> = BTreeMap::new();
    for item in items {
        let key = item
            .topic
            .map(topic_label)
            .unwrap_or("other")
            .to_string();
        grouped.entry(key).or_default().push(item);
    }

    let mut out = format!(
        "{} item(s) over the last {} day(s)\n",
        items.len(),
        period_days
    );
    for (topic, entries) in grouped {
        out.push_str(&format!("\n*{topic}*\n"));
        for item in entries {
            match format {
                DigestFormat::Short => {
                    out.push_str(&format!("- [{}]({})\n", item.title, item.source_url));
                }
                DigestFormat::Detailed => {
                    out.push_str(&format!("- [{}]({})\n", item.title, item.source_url));
                    if let Some(summary) = &item.summary {
                        out.push_str(&format!("  {summary}\n"));
                    }
                }
            }
        }
    }
    out
}

fn topic_label(topic: NewsTopic) -> &'static str {
    match topic {
        NewsTopic::Product => "product",
        NewsTopic::Strategy => "strategy",
        NewsTopic::Finance => "finance",
        NewsTopic::Technology => "technology",
        NewsTopic::Security => "security",
        NewsTopic::Research => "research",
        NewsTopic::Community => "community",
        NewsTopic::Talent => "talent",
        NewsTopic::Regulation => "regulation",
        NewsTopic::Market => "market",
        NewsTopic::Other => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rw_domain::model::{Sentiment, SourceKind};

    fn prefs(timezone: &str, time: &str, days: Vec<u8>) -> DigestPreferences {
        let mut prefs = DigestPreferences::new(Uuid::new_v4());
        prefs.timezone = timezone.to_string();
        prefs.time = Some(time.to_string());
        prefs.days = days;
        prefs
    }

    #[test]
    fn berlin_monday_window_accepted_then_rejected() {
        // Monday 2025-03-10, schedule 09:00 Europe/Berlin (UTC+1),
        // allowed days Mon..Fri (Sunday-indexed), last sent Sunday.
        let mut p = prefs("Europe/Berlin", "09:00", vec![1, 2, 3, 4, 5]);
        p.last_sent_utc = Some(Utc.with_ymd_and_hms(2025, 3, 9, 8, 0, 0).unwrap());

        let tick = Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 0).unwrap(); // 09:30 Berlin
        assert!(is_due_at(&p, tick, 9, 3600));

        // After sending, a second tick the same day is rejected.
        p.last_sent_utc = Some(tick);
        let second = Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap(); // 10:30 Berlin
        assert!(!is_due_at(&p, second, 9, 3600));

        // Even without the sent stamp, 10:30 is outside the window.
        p.last_sent_utc = None;
        assert!(!is_due_at(&p, second, 9, 3600));
    }

    #[test]
    fn window_boundaries_are_exact() {
        let p = prefs("UTC", "09:00", vec![]);
        let at_0859 = Utc.with_ymd_and_hms(2025, 3, 10, 8, 59, 0).unwrap();
        let at_0900 = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let at_0959 = Utc.with_ymd_and_hms(2025, 3, 10, 9, 59, 0).unwrap();
        let at_1001 = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 1).unwrap();

        assert!(!is_due_at(&p, at_0859, 9, 3600), "before scheduled time");
        assert!(is_due_at(&p, at_0900, 9, 3600));
        assert!(is_due_at(&p, at_0959, 9, 3600));
        assert!(!is_due_at(&p, at_1001, 9, 3600), "outside the 1-hour window");
    }

    #[test]
    fn day_sets_tolerate_both_indexings() {
        // Monday: num_days_from_monday = 0, num_days_from_sunday = 1.
        let monday = Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap();
        let monday_indexed = prefs("UTC", "09:00", vec![0, 1, 2, 3, 4]);
        let sunday_indexed = prefs("UTC", "09:00", vec![1, 2, 3, 4, 5]);

        assert!(is_due_at(&monday_indexed, monday, 9, 3600));
        assert!(is_due_at(&sunday_indexed, monday, 9, 3600));
        // A Saturday-only set matches Monday under neither indexing.
        assert!(!is_due_at(&prefs("UTC", "09:00", vec![6]), monday, 9, 3600));
    }

    #[test]
    fn weekly_rejects_same_iso_week() {
        let mut p = prefs("UTC", "09:00", vec![]);
        p.digest_frequency = DigestFrequency::Weekly;
        // Sent Tuesday; the Thursday tick of the same week is rejected.
        p.last_sent_utc = Some(Utc.with_ymd_and_hms(2025, 3, 11, 9, 0, 0).unwrap());
        let thursday = Utc.with_ymd_and_hms(2025, 3, 13, 9, 30, 0).unwrap();
        assert!(!is_due_at(&p, thursday, 9, 3600));

        // Next week is fine again.
        let next_week = Utc.with_ymd_and_hms(2025, 3, 18, 9, 30, 0).unwrap();
        assert!(is_due_at(&p, next_week, 9, 3600));
    }

    #[test]
    fn disabled_and_off_users_never_due() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap();
        let mut disabled = prefs("UTC", "09:00", vec![]);
        disabled.digest_enabled = false;
        assert!(!is_due_at(&disabled, now, 9, 3600));

        let mut off = prefs("UTC", "09:00", vec![]);
        off.digest_frequency = DigestFrequency::Off;
        assert!(!is_due_at(&off, now, 9, 3600));
    }

    #[test]
    fn unparsable_time_falls_back_to_default_hour() {
        let p = prefs("UTC", "nonsense", vec![]);
        let at_default = Utc.with_ymd_and_hms(2025, 3, 10, 9, 10, 0).unwrap();
        assert!(is_due_at(&p, at_default, 9, 3600));
    }

    #[test]
    fn render_groups_by_topic() {
        let item = |title: &str, topic: Option<NewsTopic>| NewsItem {
            id: Uuid::new_v4(),
            title: title.into(),
            summary: Some("summary".into()),
            content: None,
            source_url: format!("https://ex.com/{title}"),
            source_kind: SourceKind::Blog,
            company_id: None,
            category: None,
            topic,
            sentiment: Sentiment::Neutral,
            priority_score: 0.5,
            published_at: Utc::now(),
            raw_snapshot_url: None,
            created_at: Utc::now(),
        };
        let items = vec![
            item("a", Some(NewsTopic::Product)),
            item("b", Some(NewsTopic::Finance)),
            item("c", None),
        ];
        let rendered = render_digest(&items, DigestFormat::Detailed, 1);
        assert!(rendered.contains("*product*"));
        assert!(rendered.contains("*finance*"));
        assert!(rendered.contains("*other*"));
        assert!(rendered.contains("summary"));

        assert_eq!(
            render_digest(&[], DigestFormat::Short, 1),
            "No new competitor activity in this period."
        );
    }
}
