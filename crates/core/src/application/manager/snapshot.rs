// Point-in-time view of manager state

use crate::domain::{ProcessorId, ProcessorState, QueueName};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub concurrency: usize,
    pub ready: Vec<ProcessorId>,
    pub busy: Vec<ProcessorId>,
    /// Rotation slots, head first
    pub rotation: Vec<QueueName>,
    pub stopped: bool,
    pub shutdown_signalled: bool,
    pub invariant_violations: u64,
}

impl PoolSnapshot {
    /// Processors currently tracked (ready + busy)
    pub fn live_processors(&self) -> usize {
        self.ready.len() + self.busy.len()
    }

    /// Current rotation weight of `queue`
    pub fn weight(&self, queue: &str) -> usize {
        self.rotation.iter().filter(|q| q.as_str() == queue).count()
    }

    pub fn tracks(&self, processor: ProcessorId) -> bool {
        self.ready.contains(&processor) || self.busy.contains(&processor)
    }

    /// Untracked processors are reported as dead
    pub fn state_of(&self, processor: ProcessorId) -> ProcessorState {
        if self.busy.contains(&processor) {
            ProcessorState::Busy
        } else if self.ready.contains(&processor) {
            ProcessorState::Ready
        } else {
            ProcessorState::Dead
        }
    }
}
