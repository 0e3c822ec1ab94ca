// Manager mailbox messages

use super::snapshot::PoolSnapshot;
use crate::domain::{ProcessorId, QueueName, WorkItem};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum ManagerMessage {
    Start,
    Stop,
    Dispatch,
    Assign {
        queue: QueueName,
        item: WorkItem,
    },
    WorkNotFound {
        queue: QueueName,
    },
    ProcessorDone {
        queue: QueueName,
        processor: ProcessorId,
    },
    ProcessorDied {
        processor: ProcessorId,
        reason: String,
    },
    /// Posted by `stop` so the signal fires after the stopping turn
    SignalShutdown,
    Snapshot {
        reply: oneshot::Sender<PoolSnapshot>,
    },
}

impl ManagerMessage {
    /// Handler label used in fault logs
    pub fn label(&self) -> &'static str {
        match self {
            ManagerMessage::Start => "Manager#start",
            ManagerMessage::Stop => "Manager#stop",
            ManagerMessage::Dispatch => "Manager#dispatch",
            ManagerMessage::Assign { .. } => "Manager#assign",
            ManagerMessage::WorkNotFound { .. } => "Manager#work_not_found",
            ManagerMessage::ProcessorDone { .. } => "Manager#processor_done",
            ManagerMessage::ProcessorDied { .. } => "Manager#processor_died",
            ManagerMessage::SignalShutdown => "Manager#signal_shutdown",
            ManagerMessage::Snapshot { .. } => "Manager#snapshot",
        }
    }
}
