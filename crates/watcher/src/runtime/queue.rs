//! Typed task queues and the worker pool. A single beat process emits
//! time-based tasks; interchangeable workers consume them per queue.
//! The telegram queue runs a single worker so the per-bot rate limit
//! is respected by construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use rw_domain::model::{DigestFrequency, SnapshotKind};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Default,
    Scraping,
    Analytics,
    Telegram,
}

impl QueueName {
    pub fn all() -> &'static [QueueName] {
        &[QueueName::Default, QueueName::Scraping, QueueName::Analytics, QueueName::Telegram]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Default => "default",
            QueueName::Scraping => "scraping",
            QueueName::Analytics => "analytics",
            QueueName::Telegram => "telegram",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    PlanCrawls,
    IngestCompany { company_id: Uuid },
    ObserveCompany { company_id: Uuid, kind: SnapshotKind },
    InitialScan { company_id: Uuid },
    FanOutChangeEvents,
    DispatchDeliveries,
    DigestTick,
    UserDigest { user_id: Uuid, frequency: DigestFrequency },
    ChannelDigest,
    CheckDailyTrends,
    CheckCompanyActivity,
    SweepRuns,
    Cleanup,
}

impl Task {
    pub fn queue(&self) -> QueueName {
        match self {
            Task::PlanCrawls
            | Task::IngestCompany { .. }
            | Task::ObserveCompany { .. }
            | Task::InitialScan { .. } => QueueName::Scraping,
            Task::CheckDailyTrends | Task::CheckCompanyActivity => QueueName::Analytics,
            Task::UserDigest { .. } | Task::ChannelDigest => QueueName::Telegram,
            Task::FanOutChangeEvents
            | Task::DispatchDeliveries
            | Task::DigestTick
            | Task::SweepRuns
            | Task::Cleanup => QueueName::Default,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Task::PlanCrawls => "plan_crawls",
            Task::IngestCompany { .. } => "ingest_company",
            Task::ObserveCompany { .. } => "observe_company",
            Task::InitialScan { .. } => "initial_scan",
            Task::FanOutChangeEvents => "fan_out_change_events",
            Task::DispatchDeliveries => "dispatch_deliveries",
            Task::DigestTick => "digest_tick",
            Task::UserDigest { .. } => "user_digest",
            Task::ChannelDigest => "channel_digest",
            Task::CheckDailyTrends => "check_daily_trends",
            Task::CheckCompanyActivity => "check_company_activity",
            Task::SweepRuns => "sweep_runs",
            Task::Cleanup => "cleanup",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Task>>>;

#[derive(Clone)]
pub struct TaskRouter {
    senders: HashMap<QueueName, mpsc::UnboundedSender<Task>>,
}

impl TaskRouter {
    pub fn new() -> (Self, HashMap<QueueName, SharedReceiver>) {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for queue in QueueName::all() {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(*queue, tx);
            receivers.insert(*queue, Arc::new(Mutex::new(rx)));
        }
        (Self { senders }, receivers)
    }

    pub fn enqueue(&self, task: Task) {
        let queue = task.queue();
        if let Some(sender) = self.senders.get(&queue) {
            if sender.send(task).is_err() {
                tracing::warn!(queue = queue.as_str(), "queue closed, task dropped");
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Worker pool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Spawn workers for every queue. The telegram queue gets exactly one
/// worker; the others get `workers_per_queue`.
pub fn spawn_workers(
    state: AppState,
    router: TaskRouter,
    receivers: HashMap<QueueName, SharedReceiver>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();
    for (queue, receiver) in receivers {
        let worker_count = match queue {
            QueueName::Telegram => 1,
            _ => state.config.schedule.workers_per_queue.max(1),
        };
        for worker_id in 0..worker_count {
            let state = state.clone();
            let router = router.clone();
            let receiver = receiver.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(state, router, queue, worker_id, receiver).await;
            }));
        }
    }
    handles
}

async fn worker_loop(
    state: AppState,
    router: TaskRouter,
    queue: QueueName,
    worker_id: usize,
    receiver: SharedReceiver,
) {
    loop {
        let task = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };
        let Some(task) = task else {
            tracing::info!(queue = queue.as_str(), worker_id, "queue closed, worker exiting");
            return;
        };
        run_task(&state, &router, queue, task).await;
    }
}

/// Execute one task under the hard deadline, recording queue metrics.
pub async fn run_task(state: &AppState, router: &TaskRouter, queue: QueueName, task: Task) {
    let name = task.name();
    let started = std::time::Instant::now();
    metrics::gauge!("tasks_in_progress", "queue" => queue.as_str()).increment(1.0);

    let hard_deadline = Duration::from_secs(state.config.schedule.task_hard_deadline_secs);
    let soft_deadline = Duration::from_secs(state.config.schedule.task_soft_deadline_secs);

    let outcome = tokio::time::timeout(hard_deadline, super::execute(state, router, task)).await;
    let elapsed = started.elapsed();
    if elapsed > soft_deadline {
        tracing::warn!(task = name, elapsed_secs = elapsed.as_secs(), "task exceeded soft deadline");
    }

    let status = match outcome {
        Ok(Ok(())) => "success",
        Ok(Err(e)) => {
            tracing::error!(task = name, error = %e, "task failed");
            "failed"
        }
        Err(_) => {
            tracing::error!(task = name, "task hit the hard deadline and was cancelled");
            "deadline_exceeded"
        }
    };

    metrics::gauge!("tasks_in_progress", "queue" => queue.as_str()).decrement(1.0);
    metrics::counter!("tasks_total", "queue" => queue.as_str(), "status" => status).increment(1);
    metrics::histogram!("task_duration_seconds", "queue" => queue.as_str())
        .record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_route_to_their_queues() {
        assert_eq!(Task::PlanCrawls.queue(), QueueName::Scraping);
        assert_eq!(Task::IngestCompany { company_id: Uuid::new_v4() }.queue(), QueueName::Scraping);
        assert_eq!(Task::CheckDailyTrends.queue(), QueueName::Analytics);
        assert_eq!(
            Task::UserDigest { user_id: Uuid::new_v4(), frequency: DigestFrequency::Daily }.queue(),
            QueueName::Telegram
        );
        assert_eq!(Task::DispatchDeliveries.queue(), QueueName::Default);
        assert_eq!(Task::Cleanup.queue(), QueueName::Default);
    }

    #[tokio::test]
    async fn router_delivers_to_queue_receiver() {
        let (router, receivers) = TaskRouter::new();
        router.enqueue(Task::PlanCrawls);
        let mut rx = receivers[&QueueName::Scraping].lock().await;
        assert_eq!(rx.recv().await, Some(Task::PlanCrawls));
    }
}
