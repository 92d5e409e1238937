use std::sync::Arc;

use rw_domain::config::Config;
use rw_watcher::runtime::queue::{spawn_workers, TaskRouter};
use rw_watcher::runtime::beat;
use rw_watcher::state::AppState;
use rw_watcher::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing or invalid required environment is fatal.
    let config = Arc::new(Config::from_env()?);

    observability::init_tracing(&config.observability)?;
    observability::init_metrics(&config.observability)?;

    tracing::info!(
        state_dir = %config.storage.state_dir.display(),
        "RivalWatch starting"
    );

    let state = AppState::build(config)?;

    let (router, receivers) = TaskRouter::new();
    let workers = spawn_workers(state.clone(), router.clone(), receivers);
    tracing::info!(workers = workers.len(), "worker pool running");

    let beat_state = state.clone();
    let beat_router = router.clone();
    let beat_handle = tokio::spawn(async move {
        beat::run_beat(beat_state, beat_router).await;
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    beat_handle.abort();
    for worker in workers {
        worker.abort();
    }
    Ok(())
}
