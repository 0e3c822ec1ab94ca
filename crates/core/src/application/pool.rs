// Worker Pool - wires manager, fetcher and processors together

use crate::application::fetcher::FetcherHandle;
use crate::application::manager::{Manager, ManagerHandle, PoolSnapshot};
use crate::application::worker::{shutdown_channel, ProcessorSpawner, ShutdownToken};
use crate::config::PoolConfig;
use crate::error::{AppError, Result};
use crate::port::{Fetcher, Processor};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Running pool: a manager task plus its fetcher and processors
pub struct WorkerPool {
    manager: ManagerHandle,
    shutdown: ShutdownToken,
    task: JoinHandle<()>,
}

impl WorkerPool {
    /// Spawn the manager actor with `config.concurrency` idle processors
    ///
    /// Nothing is fetched until `start` is called.
    ///
    /// # Example
    /// ```text
    /// let pool = WorkerPool::spawn(config, fetcher, processor)?;
    /// pool.start()?;
    /// ...
    /// pool.stop()?;
    /// pool.wait_shutdown().await;
    /// pool.drained().await?;
    /// ```
    pub fn spawn(
        config: PoolConfig,
        fetcher: Arc<dyn Fetcher>,
        processor: Arc<dyn Processor>,
    ) -> Result<Self> {
        config.validate()?;

        let (manager, inbox) = ManagerHandle::channel();
        let fetcher = FetcherHandle::spawn(fetcher, manager.clone());
        let spawner = ProcessorSpawner::new(processor, manager.clone());
        let (shutdown_tx, shutdown) = shutdown_channel();

        let core = match Manager::new(&config, fetcher.clone(), spawner, shutdown_tx, manager.clone())
        {
            Ok(core) => core,
            Err(e) => {
                fetcher.terminate();
                return Err(e);
            }
        };

        info!(
            concurrency = config.concurrency,
            queues = ?config.queues,
            "Worker pool spawned"
        );
        let task = tokio::spawn(core.run(inbox));

        Ok(Self {
            manager,
            shutdown,
            task,
        })
    }

    /// Address of the manager (for collaborators and tests)
    pub fn handle(&self) -> ManagerHandle {
        self.manager.clone()
    }

    pub fn start(&self) -> Result<()> {
        self.manager.start()
    }

    pub fn stop(&self) -> Result<()> {
        self.manager.stop()
    }

    pub async fn snapshot(&self) -> Result<PoolSnapshot> {
        self.manager.snapshot().await
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Wait for the shutdown signal that follows `stop`
    ///
    /// Busy processors may still be running when this returns.
    pub async fn wait_shutdown(&self) {
        let mut token = self.shutdown.clone();
        token.wait().await;
    }

    /// Wait until the manager exits: stopped and no processor busy
    pub async fn drained(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| AppError::Internal(format!("manager task failed: {}", e)))
    }
}
