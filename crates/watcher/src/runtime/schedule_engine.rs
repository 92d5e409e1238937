//! Effective-schedule resolution and due-ness. Rules are resolved at
//! the highest enabled specificity: exact source, then company, then
//! source kind, then a built-in per-kind default.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use rw_domain::model::{CrawlMode, CrawlScope, SourceKind};
use rw_store::{CrawlSchedule, ScheduleStore, SourceProfile};

use super::queue::Task;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Built-in crawl cadence per source kind.
pub fn default_frequency_secs(kind: SourceKind) -> u64 {
    match kind {
        SourceKind::Blog => 15 * 60,
        SourceKind::NewsSite => 10 * 60,
        SourceKind::Twitter => 5 * 60,
        SourceKind::Github => 30 * 60,
        SourceKind::Reddit => 20 * 60,
        SourceKind::PressRelease => 60 * 60,
        SourceKind::Facebook | SourceKind::Instagram | SourceKind::Tiktok => 10 * 60,
        SourceKind::Linkedin => 15 * 60,
        SourceKind::Youtube => 20 * 60,
    }
}

#[derive(Clone, Debug)]
pub struct EffectiveSchedule {
    pub frequency_seconds: u64,
    pub jitter_seconds: u64,
    pub mode: CrawlMode,
    /// The winning rule; `None` when the built-in default applies.
    pub schedule: Option<CrawlSchedule>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve the effective schedule for a (company, source-kind) pair.
/// Disabled rules never win; a disabled exact rule falls through to
/// the broader scopes.
pub async fn resolve_effective(
    schedules: &ScheduleStore,
    company_id: Uuid,
    kind: SourceKind,
) -> EffectiveSchedule {
    let scopes = [
        (CrawlScope::Source, format!("{company_id}:{kind}")),
        (CrawlScope::Company, company_id.to_string()),
        (CrawlScope::SourceKind, kind.to_string()),
    ];
    for (scope, key) in scopes {
        if let Some(schedule) = schedules.get(scope, &key).await {
            if schedule.enabled {
                return EffectiveSchedule {
                    frequency_seconds: schedule.frequency_seconds,
                    jitter_seconds: schedule.jitter_seconds,
                    mode: schedule.mode,
                    schedule: Some(schedule),
                };
            }
        }
    }
    EffectiveSchedule {
        frequency_seconds: default_frequency_secs(kind),
        jitter_seconds: 0,
        mode: CrawlMode::AlwaysUpdate,
        schedule: None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Due-ness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A profile is due when `now >= last_run_at + frequency + jitter`.
/// Never-run profiles are due immediately.
pub fn is_due_with_jitter(
    profile: &SourceProfile,
    frequency_seconds: u64,
    jitter_draw_seconds: u64,
    now: DateTime<Utc>,
) -> bool {
    let Some(last_run_at) = profile.last_run_at else {
        return true;
    };
    let next_run =
        last_run_at + Duration::seconds((frequency_seconds + jitter_draw_seconds) as i64);
    now >= next_run
}

pub fn is_due(profile: &SourceProfile, effective: &EffectiveSchedule, now: DateTime<Utc>) -> bool {
    if let Some(window) = effective.schedule.as_ref().and_then(|s| s.run_window.as_ref()) {
        if !in_run_window(window, now) {
            return false;
        }
    }
    let jitter_draw = if effective.jitter_seconds > 0 {
        rand::thread_rng().gen_range(0..=effective.jitter_seconds)
    } else {
        0
    };
    is_due_with_jitter(profile, effective.frequency_seconds, jitter_draw, now)
}

/// `[start, end)` check over the UTC time of day. Windows that wrap
/// midnight (start > end) are supported; an unparsable bound never
/// blocks the schedule.
pub fn in_run_window(window: &rw_store::RunWindow, now: DateTime<Utc>) -> bool {
    let (Some(start), Some(end)) = (parse_minutes(&window.start), parse_minutes(&window.end))
    else {
        return true;
    };
    use chrono::Timelike;
    let minute_of_day = now.hour() * 60 + now.minute();
    if start <= end {
        (start..end).contains(&minute_of_day)
    } else {
        minute_of_day >= start || minute_of_day < end
    }
}

fn parse_minutes(hhmm: &str) -> Option<u32> {
    let (h, m) = hhmm.split_once(':')?;
    let (h, m) = (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?);
    (h < 24 && m < 60).then_some(h * 60 + m)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Beat schedule export
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One periodic entry in the beat loop.
#[derive(Clone, Debug, PartialEq)]
pub struct BeatEntry {
    pub name: String,
    pub task: Task,
    pub period_secs: u64,
}

/// The static base schedule the beat loop always runs.
pub fn base_beat_schedule() -> Vec<BeatEntry> {
    vec![
        BeatEntry { name: "plan-crawls".into(), task: Task::PlanCrawls, period_secs: 15 * 60 },
        BeatEntry {
            name: "fan-out-change-events".into(),
            task: Task::FanOutChangeEvents,
            period_secs: 60,
        },
        BeatEntry {
            name: "dispatch-deliveries".into(),
            task: Task::DispatchDeliveries,
            period_secs: 60,
        },
        BeatEntry { name: "digest-tick".into(), task: Task::DigestTick, period_secs: 60 * 60 },
        BeatEntry {
            name: "channel-digest".into(),
            task: Task::ChannelDigest,
            period_secs: 24 * 60 * 60,
        },
        BeatEntry {
            name: "check-daily-trends".into(),
            task: Task::CheckDailyTrends,
            period_secs: 6 * 60 * 60,
        },
        BeatEntry {
            name: "check-company-activity".into(),
            task: Task::CheckCompanyActivity,
            period_secs: 4 * 60 * 60,
        },
        BeatEntry { name: "sweep-runs".into(), task: Task::SweepRuns, period_secs: 10 * 60 },
        BeatEntry { name: "cleanup".into(), task: Task::Cleanup, period_secs: 24 * 60 * 60 },
    ]
}

/// Merge dynamic schedule rows over the base schedule. Dynamic entries
/// win on name collision; the merge is pure and idempotent.
pub fn merge_beat_schedule(base: &[BeatEntry], dynamic: &[CrawlSchedule]) -> Vec<BeatEntry> {
    let mut merged: Vec<BeatEntry> = base.to_vec();
    for schedule in dynamic {
        let name = format!("crawl-{}-{}", scope_tag(schedule.scope), schedule.scope_key);
        let entry = BeatEntry {
            name: name.clone(),
            task: Task::PlanCrawls,
            period_secs: schedule.frequency_seconds,
        };
        match merged.iter_mut().find(|e| e.name == name) {
            Some(existing) => *existing = entry,
            None => merged.push(entry),
        }
    }
    merged
}

fn scope_tag(scope: CrawlScope) -> &'static str {
    match scope {
        CrawlScope::SourceKind => "source_kind",
        CrawlScope::Company => "company",
        CrawlScope::Source => "source",
    }
}
