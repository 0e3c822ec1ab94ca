// Manager mailbox address

use super::message::ManagerMessage;
use super::snapshot::PoolSnapshot;
use crate::domain::{ProcessorId, QueueName, WorkItem};
use crate::error::{AppError, Result};
use tokio::sync::{mpsc, oneshot};

/// Cloneable address of the manager actor
///
/// Every call is a fire-and-forget send; the only failure is a closed
/// mailbox (`AppError::ManagerUnavailable`).
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    tx: mpsc::UnboundedSender<ManagerMessage>,
}

impl ManagerHandle {
    /// Create a handle and the mailbox it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ManagerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn start(&self) -> Result<()> {
        self.send(ManagerMessage::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(ManagerMessage::Stop)
    }

    pub fn dispatch(&self) -> Result<()> {
        self.send(ManagerMessage::Dispatch)
    }

    pub fn assign(&self, queue: QueueName, item: WorkItem) -> Result<()> {
        self.send(ManagerMessage::Assign { queue, item })
    }

    pub fn work_not_found(&self, queue: QueueName) -> Result<()> {
        self.send(ManagerMessage::WorkNotFound { queue })
    }

    pub fn processor_done(&self, queue: QueueName, processor: ProcessorId) -> Result<()> {
        self.send(ManagerMessage::ProcessorDone { queue, processor })
    }

    pub fn processor_died(&self, processor: ProcessorId, reason: impl Into<String>) -> Result<()> {
        self.send(ManagerMessage::ProcessorDied {
            processor,
            reason: reason.into(),
        })
    }

    pub(crate) fn signal_shutdown(&self) -> Result<()> {
        self.send(ManagerMessage::SignalShutdown)
    }

    /// Observe the manager state between two handler turns
    pub async fn snapshot(&self) -> Result<PoolSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(ManagerMessage::Snapshot { reply })?;
        rx.await.map_err(|_| AppError::ManagerUnavailable)
    }

    fn send(&self, message: ManagerMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| AppError::ManagerUnavailable)
    }
}
