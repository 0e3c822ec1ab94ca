// Worker - one processor slot: mailbox loop + supervision link

pub mod constants;
mod panic_guard;
mod shutdown;

pub use panic_guard::{execute_guarded, execute_guarded_async, panic_message, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::manager::ManagerHandle;
use crate::domain::{ProcessorId, QueueName, WorkItem};
use crate::error::{AppError, Result};
use crate::port::Processor;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Commands accepted by a worker mailbox
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    Process { queue: QueueName, item: WorkItem },
    Terminate,
}

/// Address of one worker task
///
/// Owned by exactly one of the manager's ready pool or busy set.
#[derive(Debug)]
pub struct ProcessorHandle {
    id: ProcessorId,
    tx: mpsc::UnboundedSender<WorkerCommand>,
}

impl ProcessorHandle {
    pub fn id(&self) -> ProcessorId {
        self.id
    }

    /// Hand one work item to the worker (fire-and-forget)
    pub fn process(&self, queue: QueueName, item: WorkItem) -> Result<()> {
        self.tx
            .send(WorkerCommand::Process { queue, item })
            .map_err(|_| AppError::CollaboratorUnavailable(format!("processor {}", self.id)))
    }

    /// Ask the worker to exit once its mailbox reaches this message
    pub fn terminate(&self) {
        let _ = self.tx.send(WorkerCommand::Terminate);
    }

    /// False once the worker task has exited (normally or by panic)
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Creates workers linked to a manager
///
/// A linked worker that panics is reported to the manager as
/// `processor_died`; one that exits on `Terminate` is not.
pub struct ProcessorSpawner {
    processor: Arc<dyn Processor>,
    manager: ManagerHandle,
}

impl ProcessorSpawner {
    pub fn new(processor: Arc<dyn Processor>, manager: ManagerHandle) -> Self {
        Self { processor, manager }
    }

    /// Spawn a new supervised worker task
    pub fn spawn_linked(&self) -> ProcessorHandle {
        let id = ProcessorId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = Worker {
            id,
            processor: Arc::clone(&self.processor),
            manager: self.manager.clone(),
        };
        let task = tokio::spawn(worker.run(rx));
        tokio::spawn(supervise(id, task, self.manager.clone()));

        debug!(processor_id = %id, "Processor spawned");
        ProcessorHandle { id, tx }
    }
}

struct Worker {
    id: ProcessorId,
    processor: Arc<dyn Processor>,
    manager: ManagerHandle,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<WorkerCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                WorkerCommand::Process { queue, item } => {
                    self.process(&queue, &item).await;

                    if self.manager.processor_done(queue, self.id).is_err() {
                        warn!(processor_id = %self.id, "Manager unavailable, processor exiting");
                        break;
                    }
                }
                WorkerCommand::Terminate => break,
            }
        }
        debug!(processor_id = %self.id, "Processor stopped");
    }

    /// Run the processor; a handled failure still counts as done
    async fn process(&self, queue: &str, item: &WorkItem) {
        info!(
            processor_id = %self.id,
            queue = %queue,
            item_id = %item.id,
            "Processing work item"
        );
        let started = Instant::now();

        match self.processor.process(queue, item).await {
            Ok(()) => info!(
                processor_id = %self.id,
                queue = %queue,
                item_id = %item.id,
                duration_ms = started.elapsed().as_millis() as u64,
                "Work item processed"
            ),
            Err(e) => warn!(
                processor_id = %self.id,
                queue = %queue,
                item_id = %item.id,
                error = %e,
                "Work item failed"
            ),
        }
    }
}

/// Supervision link: report an abnormal worker exit to the manager
async fn supervise(id: ProcessorId, task: JoinHandle<()>, manager: ManagerHandle) {
    let reason = match task.await {
        Ok(()) => return,
        Err(join_err) if join_err.is_panic() => panic_message(join_err.into_panic().as_ref()),
        Err(join_err) => join_err.to_string(),
    };

    if manager.processor_died(id, reason).is_err() {
        debug!(processor_id = %id, "Manager gone, processor death not reported");
    }
}
