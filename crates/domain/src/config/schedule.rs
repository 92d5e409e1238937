use serde::{Deserialize, Serialize};

use super::env_parse;
use crate::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Beat / worker scheduling configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// `RW_BEAT_TICK_SECS` — cadence of the beat loop evaluating the
    /// merged (base + dynamic) schedule.
    #[serde(default = "d_beat_tick_secs")]
    pub beat_tick_secs: u64,
    /// `RW_TASK_SOFT_DEADLINE_SECS` — soft per-task deadline.
    #[serde(default = "d_soft_deadline")]
    pub task_soft_deadline_secs: u64,
    /// `RW_TASK_HARD_DEADLINE_SECS` — hard per-task deadline; the
    /// sweeper fails `running` runs older than this.
    #[serde(default = "d_hard_deadline")]
    pub task_hard_deadline_secs: u64,
    /// `RW_DEDUP_TTL_SECS` — TTL for KV dedup locks guarding expensive
    /// recompute tasks.
    #[serde(default = "d_dedup_ttl")]
    pub dedup_ttl_secs: u64,
    /// `RW_WORKERS_PER_QUEUE` — worker count per typed queue.
    #[serde(default = "d_workers")]
    pub workers_per_queue: usize,
    /// `RW_SCHEDULE_LOAD_RETRIES` — retries when merging dynamic
    /// schedule rows into the base beat schedule.
    #[serde(default = "d_load_retries")]
    pub schedule_load_retries: u32,
    /// `RW_SCHEDULE_LOAD_BACKOFF_SECS` — backoff between merge retries.
    #[serde(default = "d_load_backoff")]
    pub schedule_load_backoff_secs: u64,
}

fn d_beat_tick_secs() -> u64 {
    30
}
fn d_soft_deadline() -> u64 {
    25 * 60
}
fn d_hard_deadline() -> u64 {
    30 * 60
}
fn d_dedup_ttl() -> u64 {
    900
}
fn d_workers() -> usize {
    4
}
fn d_load_retries() -> u32 {
    3
}
fn d_load_backoff() -> u64 {
    5
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            beat_tick_secs: d_beat_tick_secs(),
            task_soft_deadline_secs: d_soft_deadline(),
            task_hard_deadline_secs: d_hard_deadline(),
            dedup_ttl_secs: d_dedup_ttl(),
            workers_per_queue: d_workers(),
            schedule_load_retries: d_load_retries(),
            schedule_load_backoff_secs: d_load_backoff(),
        }
    }
}

impl ScheduleConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            beat_tick_secs: env_parse("RW_BEAT_TICK_SECS", d.beat_tick_secs)?,
            task_soft_deadline_secs: env_parse(
                "RW_TASK_SOFT_DEADLINE_SECS",
                d.task_soft_deadline_secs,
            )?,
            task_hard_deadline_secs: env_parse(
                "RW_TASK_HARD_DEADLINE_SECS",
                d.task_hard_deadline_secs,
            )?,
            dedup_ttl_secs: env_parse("RW_DEDUP_TTL_SECS", d.dedup_ttl_secs)?,
            workers_per_queue: env_parse("RW_WORKERS_PER_QUEUE", d.workers_per_queue)?,
            schedule_load_retries: env_parse("RW_SCHEDULE_LOAD_RETRIES", d.schedule_load_retries)?,
            schedule_load_backoff_secs: env_parse(
                "RW_SCHEDULE_LOAD_BACKOFF_SECS",
                d.schedule_load_backoff_secs,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_default_to_25_and_30_minutes() {
        let cfg = ScheduleConfig::default();
        assert_eq!(cfg.task_soft_deadline_secs, 1500);
        assert_eq!(cfg.task_hard_deadline_secs, 1800);
        assert!(cfg.task_soft_deadline_secs < cfg.task_hard_deadline_secs);
    }

    #[test]
    fn dedup_ttl_defaults_to_900() {
        assert_eq!(ScheduleConfig::default().dedup_ttl_secs, 900);
    }
}
