// Fetcher Port
// Retrieves at most one work item from a named queue backend

use crate::domain::WorkItem;
use async_trait::async_trait;
use thiserror::Error;

/// Fetch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Undecodable work item: {0}")]
    Decode(String),
}

/// Fetcher trait
///
/// Implementations:
/// - SqliteQueue: claims the oldest row of a queue table
/// - MockFetcher: scripted items for tests
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Try to retrieve one work item from `queue`
    ///
    /// `Ok(None)` means the queue had nothing to hand out.
    async fn fetch(&self, queue: &str) -> Result<Option<WorkItem>, FetchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    /// How the mock reacts to a fetch on a given queue
    #[derive(Debug, Clone)]
    pub enum FetchBehavior {
        /// Hand out scripted items, `None` once drained
        Scripted,
        /// Always fail with message
        Fail(String),
        /// Panic with message (for fault containment testing)
        Panic(String),
    }

    /// Mock Fetcher with per-queue scripted items
    pub struct MockFetcher {
        items: Mutex<HashMap<String, VecDeque<WorkItem>>>,
        behaviors: Mutex<HashMap<String, FetchBehavior>>,
        calls: Mutex<Vec<String>>,
    }

    impl Default for MockFetcher {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self {
                items: Mutex::new(HashMap::new()),
                behaviors: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Queue a work item to be returned by a later fetch
        pub fn push(&self, queue: &str, item: WorkItem) {
            self.items
                .lock()
                .unwrap()
                .entry(queue.to_string())
                .or_default()
                .push_back(item);
        }

        pub fn set_behavior(&self, queue: &str, behavior: FetchBehavior) {
            self.behaviors
                .lock()
                .unwrap()
                .insert(queue.to_string(), behavior);
        }

        /// Queue names fetched so far, in call order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn remaining(&self, queue: &str) -> usize {
            self.items
                .lock()
                .unwrap()
                .get(queue)
                .map(VecDeque::len)
                .unwrap_or(0)
        }

        /// Poll until at least `count` fetches happened or `timeout` passes
        pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
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
    impl Fetcher for MockFetcher {
        async fn fetch(&self, queue: &str) -> Result<Option<WorkItem>, FetchError> {
            self.calls.lock().unwrap().push(queue.to_string());

            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(queue)
                .cloned()
                .unwrap_or(FetchBehavior::Scripted);

            match behavior {
                FetchBehavior::Scripted => Ok(self
                    .items
                    .lock()
                    .unwrap()
                    .get_mut(queue)
                    .and_then(VecDeque::pop_front)),
                FetchBehavior::Fail(msg) => Err(FetchError::Backend(msg)),
                FetchBehavior::Panic(msg) => {
                    panic!("{}", msg);
                }
            }
        }
    }
}
