pub mod modules;
pub mod schema;
pub mod shared;

use anyhow::Context;
use modules::{
    analysis::BlunderDetector,
    engine::{EngineFactory, UciEngineFactory},
    games::{ChessComClient, GameSource},
    jobs::{AnalysisWorker, JobRepository, JobRepositoryImpl, WorkerSettings},
    notifications,
};
use shared::{Database, WorkerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Start-up wiring: configuration, database, collaborators, then the worker
/// loop until Ctrl-C / SIGTERM (or a single job in dev mode).
pub async fn run() -> anyhow::Result<()> {
    shared::utils::logger::init_logger();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;

    let database = Database::connect(&config.database).context("Failed to connect to the database")?;
    database
        .run_migrations()
        .context("Failed to apply database migrations")?;

    let job_repository: Arc<dyn JobRepository> =
        Arc::new(JobRepositoryImpl::new(database.pool().clone()));

    match job_repository.get_statistics().await {
        Ok(stats) => log::info!(
            "Job queue: {} pending, {} processing, {} completed, {} failed",
            stats.pending_count,
            stats.processing_count,
            stats.completed_count,
            stats.failed_count
        ),
        Err(e) => log::warn!("Could not read job statistics: {}", e),
    }

    let game_source: Arc<dyn GameSource> = Arc::new(
        ChessComClient::new(&config.archive).context("Failed to build the game archive client")?,
    );

    let engine_factory = UciEngineFactory::new(config.engine.clone());
    log::info!("Using engine at {}", engine_factory.binary_path().display());
    let engine_factory: Arc<dyn EngineFactory> = Arc::new(engine_factory);

    let notifier = notifications::from_config(&config.notification)
        .context("Failed to build the notifier")?;
    if notifier.is_none() {
        log::info!("Notifications disabled");
    }

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let mut worker = AnalysisWorker::new(
        job_repository,
        game_source,
        engine_factory,
        BlunderDetector::new(config.blunder_threshold_cp),
        notifier,
        WorkerSettings::from_config(&config),
        shutdown,
    );

    if config.dev_mode {
        log::info!("Dev mode: processing a single job");
        worker.recover_stale().await;
        match worker.process_next_job().await? {
            Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
            None => log::info!("No pending jobs"),
        }
        return Ok(());
    }

    worker.run().await;
    Ok(())
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        log::info!("Shutdown signal received");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("SIGTERM handler unavailable ({}), listening for Ctrl-C only", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
