// SQLite queue table - Fetcher implementation
//
// `fetch` claims and removes the oldest item of a queue in one statement,
// so concurrent fetchers never receive the same item. Delivery is
// at-most-once: an item whose processor crashes is not redelivered.

use crate::error::describe_sqlx_error;
use async_trait::async_trait;
use poolkeeper_core::domain::WorkItem;
use poolkeeper_core::error::{AppError, Result};
use poolkeeper_core::port::{FetchError, Fetcher, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

pub struct SqliteQueue {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteQueue {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Append a work item to `queue`, returning its id
    pub async fn enqueue(&self, queue: &str, body: &serde_json::Value) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = self.time_provider.now_millis();

        sqlx::query("INSERT INTO work_items (id, queue, body, enqueued_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(queue)
            .bind(body.to_string())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(describe_sqlx_error(&e)))?;

        debug!(queue = %queue, item_id = %id, "Work item enqueued");
        Ok(id)
    }

    /// Number of items waiting in `queue`
    pub async fn depth(&self, queue: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM work_items WHERE queue = ?")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(describe_sqlx_error(&e)))
    }
}

#[async_trait]
impl Fetcher for SqliteQueue {
    async fn fetch(&self, queue: &str) -> std::result::Result<Option<WorkItem>, FetchError> {
        let row = sqlx::query_as::<_, WorkItemRow>(
            r#"
            DELETE FROM work_items
            WHERE seq = (
                SELECT seq FROM work_items
                WHERE queue = ?
                ORDER BY enqueued_at ASC, seq ASC
                LIMIT 1
            )
            RETURNING id, body, enqueued_at
            "#,
        )
        .bind(queue)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FetchError::Backend(describe_sqlx_error(&e)))?;

        row.map(WorkItemRow::into_work_item).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WorkItemRow {
    id: String,
    body: String,
    enqueued_at: i64,
}

impl WorkItemRow {
    fn into_work_item(self) -> std::result::Result<WorkItem, FetchError> {
        let body = serde_json::from_str(&self.body)
            .map_err(|e| FetchError::Decode(format!("item {}: {}", self.id, e)))?;
        Ok(WorkItem::new(self.id, body, self.enqueued_at))
    }
}
