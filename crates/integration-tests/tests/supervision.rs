//! Supervision: crashed processors are replaced and faults stay contained

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use poolkeeper_core::application::{PoolSnapshot, WorkerPool};
use poolkeeper_core::domain::{ProcessorId, ProcessorState, WorkItem};
use poolkeeper_core::port::fetcher::mocks::{FetchBehavior, MockFetcher};
use poolkeeper_core::port::processor::mocks::{MockBehavior, MockProcessor};
use poolkeeper_core::PoolConfig;

const WAIT: Duration = Duration::from_secs(2);

fn config(concurrency: usize, queues: &[&str]) -> PoolConfig {
    PoolConfig::new(concurrency, queues.iter().map(|q| q.to_string()).collect())
        .with_empty_queue_delay(Duration::from_millis(10))
}

fn item(id: &str) -> WorkItem {
    WorkItem::new_test(id, serde_json::json!({}))
}

async fn wait_for_snapshot<F>(pool: &WorkerPool, check: F) -> PoolSnapshot
where
    F: Fn(&PoolSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let snapshot = pool.snapshot().await.unwrap();
        if check(&snapshot) || tokio::time::Instant::now() >= deadline {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_crashed_processor_is_replaced() {
    let fetcher = Arc::new(MockFetcher::new());
    let processor = Arc::new(MockProcessor::new(MockBehavior::Panic("boom".to_string())));
    fetcher.push("default", item("poison"));

    let pool = WorkerPool::spawn(config(2, &["default"]), fetcher, processor.clone()).unwrap();
    let original: HashSet<ProcessorId> = pool.snapshot().await.unwrap().ready.into_iter().collect();

    pool.start().unwrap();
    assert!(processor.wait_for_started(1, WAIT).await);

    let snapshot = wait_for_snapshot(&pool, |s| {
        s.busy.is_empty() && original.iter().filter(|id| s.tracks(**id)).count() == 1
    })
    .await;

    assert_eq!(snapshot.live_processors(), 2);
    assert_eq!(
        original.iter().filter(|id| snapshot.tracks(**id)).count(),
        1,
        "exactly one original processor should have been replaced"
    );
    let dead: Vec<_> = original
        .iter()
        .filter(|id| snapshot.state_of(**id) == ProcessorState::Dead)
        .collect();
    assert_eq!(dead.len(), 1);
    assert!(!snapshot.stopped);
}

#[tokio::test]
async fn test_pool_keeps_working_after_crash() {
    let fetcher = Arc::new(MockFetcher::new());
    let processor = Arc::new(MockProcessor::new_success());
    processor.set_behavior("poison", MockBehavior::Panic("bad item".to_string()));
    fetcher.push("poison", item("p-1"));
    for i in 0..5 {
        fetcher.push("default", item(&format!("ok-{}", i)));
    }

    let pool = WorkerPool::spawn(config(1, &["poison", "default"]), fetcher, processor.clone())
        .unwrap();
    pool.start().unwrap();

    assert!(processor.wait_for_started(6, WAIT).await);
    let snapshot = wait_for_snapshot(&pool, |s| s.busy.is_empty() && s.ready.len() == 1).await;

    let succeeded = processor
        .processed()
        .into_iter()
        .filter(|(q, _)| q == "default")
        .count();
    assert_eq!(succeeded, 5);
    assert_eq!(snapshot.live_processors(), 1);
}

#[tokio::test]
async fn test_handled_failure_keeps_processor() {
    let fetcher = Arc::new(MockFetcher::new());
    let processor = Arc::new(MockProcessor::new(MockBehavior::Fail("rejected".to_string())));
    fetcher.push("default", item("bad-1"));

    let pool = WorkerPool::spawn(config(1, &["default"]), fetcher, processor.clone()).unwrap();
    let original = pool.snapshot().await.unwrap().ready[0];

    pool.start().unwrap();
    assert!(processor.wait_for_started(1, WAIT).await);

    let snapshot = wait_for_snapshot(&pool, |s| s.ready.len() == 1).await;
    assert_eq!(snapshot.ready, vec![original]);
    assert_eq!(snapshot.state_of(original), ProcessorState::Ready);
}

#[tokio::test]
async fn test_fetch_panic_is_contained() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.set_behavior("broken", FetchBehavior::Panic("fetch exploded".to_string()));
    fetcher.push("healthy", item("h-1"));
    let processor = Arc::new(MockProcessor::new_success());

    let pool = WorkerPool::spawn(config(1, &["broken", "healthy"]), fetcher.clone(), processor.clone())
        .unwrap();
    pool.start().unwrap();

    assert!(processor.wait_for_started(1, WAIT).await);
    assert!(fetcher.calls().iter().any(|q| q == "broken"));

    let snapshot = wait_for_snapshot(&pool, |s| s.weight("broken") == 1).await;
    assert_eq!(snapshot.weight("broken"), 1);
    assert!(!snapshot.stopped);
}

#[tokio::test]
async fn test_fetch_errors_keep_cycle_alive() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.set_behavior("default", FetchBehavior::Fail("db locked".to_string()));

    let pool = WorkerPool::spawn(
        config(1, &["default"]),
        fetcher.clone(),
        Arc::new(MockProcessor::new_success()),
    )
    .unwrap();
    pool.start().unwrap();

    assert!(fetcher.wait_for_calls(5, WAIT).await);
    let snapshot = pool.snapshot().await.unwrap();
    assert_eq!(snapshot.ready.len(), 1);
    assert_eq!(snapshot.invariant_violations, 0);
}
