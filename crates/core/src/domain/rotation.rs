//! Queue rotation - weighted round robin with backpressure adjustment
//!
//! A queue name occupies one slot per unit of its current weight. Selection
//! takes the head slot and moves it to the tail, so over a full cycle every
//! queue is polled proportionally to its weight.
//!
//! Weights move between 1 and the configured weight, one slot at a time:
//! - `work_not_found`: drop one slot (never the last one)
//! - `work_found`: append one slot (never above the configured weight)

use super::error::{DomainError, Result};
use super::queue::{validate_queue_name, QueueName};
use std::collections::{HashMap, VecDeque};

/// Mutable weighted rotation over the configured queues
#[derive(Debug, Clone)]
pub struct QueueRotation {
    entries: VecDeque<QueueName>,
    original_weights: HashMap<QueueName, usize>,
}

impl QueueRotation {
    /// Build a rotation from a repetition-encoded queue list
    ///
    /// `["a", "a", "b"]` gives `a` weight 2 and `b` weight 1.
    pub fn new(queues: &[QueueName]) -> Result<Self> {
        if queues.is_empty() {
            return Err(DomainError::EmptyQueueList);
        }

        let mut original_weights = HashMap::new();
        for queue in queues {
            validate_queue_name(queue)?;
            *original_weights.entry(queue.clone()).or_insert(0) += 1;
        }

        Ok(Self {
            entries: queues.iter().cloned().collect(),
            original_weights,
        })
    }

    /// Take the head queue and move it to the tail
    pub fn next_queue(&mut self) -> Option<QueueName> {
        let queue = self.entries.pop_front()?;
        self.entries.push_back(queue.clone());
        Some(queue)
    }

    /// Lower the weight of a queue observed empty
    ///
    /// Returns the new weight when a slot was removed.
    pub fn work_not_found(&mut self, queue: &str) -> Option<usize> {
        let current = self.current_weight(queue);
        if current <= 1 {
            return None;
        }

        let index = self.entries.iter().position(|q| q == queue)?;
        self.entries.remove(index);
        Some(current - 1)
    }

    /// Restore one slot for a queue that produced work
    ///
    /// Returns the new weight when a slot was added.
    pub fn work_found(&mut self, queue: &str) -> Option<usize> {
        let original = self.original_weight(queue);
        let current = self.current_weight(queue);
        if current >= original {
            return None;
        }

        self.entries.push_back(queue.to_string());
        Some(current + 1)
    }

    pub fn current_weight(&self, queue: &str) -> usize {
        self.entries.iter().filter(|q| q.as_str() == queue).count()
    }

    pub fn original_weight(&self, queue: &str) -> usize {
        self.original_weights.get(queue).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current slot order, head first
    pub fn entries(&self) -> Vec<QueueName> {
        self.entries.iter().cloned().collect()
    }
}
