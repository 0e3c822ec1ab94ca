//! Fetcher actor - serializes fetch requests against the `Fetcher` port
//!
//! One fetch runs at a time. Each result is reported back to the manager:
//! an item becomes `assign`, an empty queue, a backend error or a panicking
//! fetch becomes `work_not_found`, so the fetch cycle is never lost.

use crate::application::manager::ManagerHandle;
use crate::application::worker::{
    execute_guarded_async, shutdown_channel, PanicGuardResult, ShutdownSender, ShutdownToken,
};
use crate::domain::QueueName;
use crate::error::{AppError, Result};
use crate::port::Fetcher;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Cloneable address of the fetcher actor
#[derive(Clone)]
pub struct FetcherHandle {
    tx: mpsc::UnboundedSender<QueueName>,
    shutdown: Arc<ShutdownSender>,
}

impl FetcherHandle {
    /// Spawn the fetcher actor reporting to `manager`
    pub fn spawn(fetcher: Arc<dyn Fetcher>, manager: ManagerHandle) -> Self {
        let (handle, rx, token) = Self::detached();
        let actor = FetcherActor { fetcher, manager };
        tokio::spawn(actor.run(rx, token));
        handle
    }

    /// Handle whose requests are left for the caller to consume
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<QueueName>, ShutdownToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, token) = shutdown_channel();
        let handle = Self {
            tx,
            shutdown: Arc::new(shutdown),
        };
        (handle, rx, token)
    }

    /// Request one fetch for `queue` (fire-and-forget)
    pub fn fetch(&self, queue: QueueName) -> Result<()> {
        self.tx
            .send(queue)
            .map_err(|_| AppError::CollaboratorUnavailable("fetcher".to_string()))
    }

    /// Stop the actor, abandoning any fetch in flight
    pub fn terminate(&self) {
        self.shutdown.shutdown();
    }

    pub fn is_alive(&self) -> bool {
        !self.shutdown.is_shutdown() && !self.tx.is_closed()
    }
}

struct FetcherActor {
    fetcher: Arc<dyn Fetcher>,
    manager: ManagerHandle,
}

impl FetcherActor {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<QueueName>, mut shutdown: ShutdownToken) {
        info!("Fetcher started");
        loop {
            let queue = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                next = rx.recv() => match next {
                    Some(queue) => queue,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    debug!("Fetch abandoned on shutdown");
                    break;
                }
                reported = self.fetch(queue) => {
                    if !reported {
                        break;
                    }
                }
            }
        }
        info!("Fetcher stopped");
    }

    /// Fetch once and report; false when the manager is gone
    async fn fetch(&self, queue: QueueName) -> bool {
        let outcome = execute_guarded_async("Fetcher#fetch", self.fetcher.fetch(&queue)).await;

        let reported = match outcome {
            PanicGuardResult::Success(Ok(Some(item))) => {
                debug!(queue = %queue, item_id = %item.id, "Work found");
                self.manager.assign(queue, item)
            }
            PanicGuardResult::Success(Ok(None)) => {
                debug!(queue = %queue, "No work found");
                self.manager.work_not_found(queue)
            }
            PanicGuardResult::Success(Err(e)) => {
                warn!(queue = %queue, error = %e, "Fetch failed");
                self.manager.work_not_found(queue)
            }
            PanicGuardResult::Panicked(_) => self.manager.work_not_found(queue),
        };

        if reported.is_err() {
            warn!("Manager unavailable, fetcher exiting");
            return false;
        }
        true
    }
}
