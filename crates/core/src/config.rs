// Pool Configuration
// Passed explicitly to the manager; nothing reads process-wide state after construction

use crate::application::worker::constants::{DEFAULT_CONCURRENCY, DEFAULT_EMPTY_QUEUE_DELAY};
use crate::domain::{expand_weights, QueueConfig, QueueName, QueueRotation};
use crate::error::{AppError, Result};
use std::time::Duration;

/// Static pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrent processors (and in-flight fetch cycles)
    pub concurrency: usize,
    /// Queue names, repeated once per unit of weight
    pub queues: Vec<QueueName>,
    /// Pause before re-issuing a fetch cycle that found nothing
    pub empty_queue_delay: Duration,
}

impl PoolConfig {
    pub fn new(concurrency: usize, queues: Vec<QueueName>) -> Self {
        Self {
            concurrency,
            queues,
            empty_queue_delay: DEFAULT_EMPTY_QUEUE_DELAY,
        }
    }

    /// Build from weighted queue configs (`default:3,low` style)
    pub fn from_weighted(concurrency: usize, queues: &[QueueConfig]) -> Result<Self> {
        for queue in queues {
            queue.validate()?;
        }
        Ok(Self::new(concurrency, expand_weights(queues)))
    }

    pub fn with_empty_queue_delay(mut self, delay: Duration) -> Self {
        self.empty_queue_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(AppError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        QueueRotation::new(&self.queues)?;
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, vec!["default".to_string()])
    }
}
