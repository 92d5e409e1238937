//! Runtime wiring: the beat loop, typed queues, and the task
//! executor dispatching into the pipeline components.

pub mod beat;
pub mod change_detector;
pub mod diff;
pub mod digest;
pub mod dispatcher;
pub mod ingest;
pub mod maintenance;
pub mod nlp;
pub mod notifications;
pub mod planner;
pub mod queue;
pub mod schedule_engine;
pub mod transports;

use rw_domain::Result;

use crate::state::AppState;
use queue::{Task, TaskRouter};

/// Execute one task. Every error path either updated a record already
/// or is logged by the worker loop; nothing is silently swallowed.
pub async fn execute(state: &AppState, router: &TaskRouter, task: Task) -> Result<()> {
    match task {
        Task::PlanCrawls => planner::plan_crawls(state, router).await,
        Task::IngestCompany { company_id } => ingest::ingest_company(state, company_id).await,
        Task::ObserveCompany { company_id, kind } => {
            let Some(company) = state.companies.get(&company_id).await else {
                return Ok(());
            };
            let ctx = rw_providers::CompanyContext {
                id: Some(company.id),
                name: company.name.clone(),
                website: company.website.clone(),
                news_page_url: company.news_page_url.clone(),
            };
            change_detector::observe(state, company_id, &ctx, kind).await.map(|_| ())
        }
        Task::InitialScan { company_id } => planner::initial_scan(state, company_id).await,
        Task::FanOutChangeEvents => notifications::fan_out_change_events(state).await,
        Task::DispatchDeliveries => dispatcher::dispatch_deliveries(state).await,
        Task::DigestTick => digest::digest_tick(state, router).await,
        Task::UserDigest { user_id, frequency } => {
            digest::generate_user_digest(state, user_id, frequency).await
        }
        Task::ChannelDigest => digest::channel_digest(state).await,
        Task::CheckDailyTrends => notifications::check_daily_trends(state).await,
        Task::CheckCompanyActivity => notifications::check_company_activity(state).await,
        Task::SweepRuns => maintenance::sweep_runs(state).await,
        Task::Cleanup => maintenance::cleanup(state).await,
    }
}
