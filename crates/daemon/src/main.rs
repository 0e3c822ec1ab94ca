//! Poolkeeper - Main Entry Point
//! SQLite-backed queues drained by a supervised pool of subprocess workers

mod config;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{DaemonConfig, LogFormat};
use poolkeeper_core::application::WorkerPool;
use poolkeeper_core::port::time_provider::SystemTimeProvider;
use poolkeeper_infra_sqlite::{create_pool, run_migrations, SqliteQueue};
use poolkeeper_infra_system::SubprocessProcessor;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env()?;

    // 2. Initialize logging
    init_logging(config.log_format)?;
    info!("Poolkeeper v{} starting...", VERSION);
    info!(db_path = %config.db_path, "Initializing database...");

    // 3. Initialize database
    let db = create_pool(&config.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&db)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let fetcher = Arc::new(SqliteQueue::new(db, time_provider.clone()));
    let processor = Arc::new(SubprocessProcessor::new(
        time_provider,
        config.env_allowlist.clone(),
    ));

    // 5. Spawn and start the pool
    let pool = WorkerPool::spawn(config.pool.clone(), fetcher, processor)
        .map_err(|e| anyhow::anyhow!("Worker pool start failed: {}", e))?;
    pool.start()
        .map_err(|e| anyhow::anyhow!("Worker pool start failed: {}", e))?;

    info!(
        concurrency = config.pool.concurrency,
        queues = ?config.pool.queues,
        "System ready. Waiting for work..."
    );
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping pool...");

    // 7. Graceful shutdown
    pool.stop()
        .map_err(|e| anyhow::anyhow!("Worker pool stop failed: {}", e))?;
    pool.wait_shutdown().await;

    match tokio::time::timeout(config.drain_timeout, pool.drained()).await {
        Ok(Ok(())) => info!("All processors drained"),
        Ok(Err(e)) => warn!(error = %e, "Worker pool exited abnormally"),
        Err(_) => warn!(
            drain_timeout_secs = config.drain_timeout.as_secs(),
            "Drain timeout reached with processors still busy"
        ),
    }

    info!("Shutdown complete.");
    Ok(())
}

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("poolkeeper=info"))?;

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }
    Ok(())
}
