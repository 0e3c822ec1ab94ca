// Processor Port
// Executes the business logic for one work item

use crate::domain::WorkItem;
use async_trait::async_trait;
use thiserror::Error;

/// Handled processing failures
///
/// A processor reporting one of these is still "done" from the pool's
/// point of view. Only a panic counts as a worker fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Processing failed: {0}")]
    Failed(String),

    #[error("Processing timed out after {0}ms")]
    Timeout(i64),

    #[error("Invalid work item body: {0}")]
    InvalidBody(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Processor trait
///
/// Implementations:
/// - SubprocessProcessor: runs the command described by the item body
/// - MockProcessor: scripted outcomes for tests
#[async_trait]
pub trait Processor: Send + Sync {
    /// Execute one work item fetched from `queue`
    async fn process(&self, queue: &str, item: &WorkItem) -> Result<(), ProcessError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Mock processor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with message (handled failure)
        Fail(String),
        /// Panic with message (worker fault)
        Panic(String),
        /// Wait for `release` before succeeding
        Block,
    }

    /// Mock Processor with per-queue behavior
    pub struct MockProcessor {
        default_behavior: MockBehavior,
        behaviors: Mutex<HashMap<String, MockBehavior>>,
        processed: Mutex<Vec<(String, String)>>,
        started: Mutex<Vec<(String, String)>>,
        gate: Arc<Semaphore>,
    }

    impl MockProcessor {
        pub fn new(default_behavior: MockBehavior) -> Self {
            Self {
                default_behavior,
                behaviors: Mutex::new(HashMap::new()),
                processed: Mutex::new(Vec::new()),
                started: Mutex::new(Vec::new()),
                gate: Arc::new(Semaphore::new(0)),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_blocking() -> Self {
            Self::new(MockBehavior::Block)
        }

        pub fn set_behavior(&self, queue: &str, behavior: MockBehavior) {
            self.behaviors
                .lock()
                .unwrap()
                .insert(queue.to_string(), behavior);
        }

        /// Let `count` blocked items finish
        pub fn release(&self, count: usize) {
            self.gate.add_permits(count);
        }

        /// (queue, item id) pairs whose processing started
        pub fn started(&self) -> Vec<(String, String)> {
            self.started.lock().unwrap().clone()
        }

        /// (queue, item id) pairs that returned (Ok or Err)
        pub fn processed(&self) -> Vec<(String, String)> {
            self.processed.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.started.lock().unwrap().len()
        }

        /// Poll until at least `count` items started or `timeout` passes
        pub async fn wait_for_started(&self, count: usize, timeout: Duration) -> bool {
            let deadline = tokio::time::Instant::now() + timeout;
            while tokio::time::Instant::now() < deadline {
                if self.call_count() >= count {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.call_count() >= count
        }
    }

    #[async_trait]
    impl Processor for MockProcessor {
        async fn process(&self, queue: &str, item: &WorkItem) -> Result<(), ProcessError> {
            self.started
                .lock()
                .unwrap()
                .push((queue.to_string(), item.id.clone()));

            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(queue)
                .cloned()
                .unwrap_or_else(|| self.default_behavior.clone());

            let result = match behavior {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(msg) => Err(ProcessError::Failed(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for supervision testing
                }
                MockBehavior::Block => {
                    let permit = self
                        .gate
                        .acquire()
                        .await
                        .map_err(|e| ProcessError::Failed(e.to_string()))?;
                    permit.forget();
                    Ok(())
                }
            };

            self.processed
                .lock()
                .unwrap()
                .push((queue.to_string(), item.id.clone()));
            result
        }
    }
}
