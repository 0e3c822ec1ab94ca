// Work Item - opaque unit of work handed from fetcher to processor

use serde::{Deserialize, Serialize};

/// One fetched unit of work
///
/// The core never inspects `body`; adapters decide what it means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub body: serde_json::Value,
    pub enqueued_at: i64,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, body: serde_json::Value, enqueued_at: i64) -> Self {
        Self {
            id: id.into(),
            body,
            enqueued_at,
        }
    }

    /// Create a work item stamped with the current time (for tests and seeding)
    pub fn new_test(id: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(id, body, chrono::Utc::now().timestamp_millis())
    }
}
