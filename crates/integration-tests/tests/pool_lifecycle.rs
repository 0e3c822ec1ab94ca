//! Worker pool lifecycle: start, steady-state processing, stop and drain
//!
//! Runs the real manager, fetcher and processor actors against the port mocks.

use std::sync::Arc;
use std::time::Duration;

use poolkeeper_core::application::{PoolSnapshot, WorkerPool};
use poolkeeper_core::domain::{QueueConfig, WorkItem};
use poolkeeper_core::port::fetcher::mocks::MockFetcher;
use poolkeeper_core::port::processor::mocks::MockProcessor;
use poolkeeper_core::PoolConfig;

const WAIT: Duration = Duration::from_secs(2);

fn config(concurrency: usize, queues: &[&str]) -> PoolConfig {
    PoolConfig::new(concurrency, queues.iter().map(|q| q.to_string()).collect())
        .with_empty_queue_delay(Duration::from_millis(10))
}

fn item(id: &str) -> WorkItem {
    WorkItem::new_test(id, serde_json::json!({ "id": id }))
}

/// Poll the manager until `check` holds or the wait expires
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
async fn test_nothing_fetched_before_start() {
    let fetcher = Arc::new(MockFetcher::new());
    let pool = WorkerPool::spawn(
        config(3, &["default"]),
        fetcher.clone(),
        Arc::new(MockProcessor::new_success()),
    )
    .unwrap();

    let snapshot = pool.snapshot().await.unwrap();
    assert_eq!(snapshot.ready.len(), 3);
    assert!(snapshot.busy.is_empty());
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_start_polls_every_queue() {
    let fetcher = Arc::new(MockFetcher::new());
    let pool = WorkerPool::spawn(
        config(3, &["a", "b"]),
        fetcher.clone(),
        Arc::new(MockProcessor::new_success()),
    )
    .unwrap();

    pool.start().unwrap();

    assert!(fetcher.wait_for_calls(3, WAIT).await);
    let calls = fetcher.calls();
    assert!(calls.iter().any(|q| q == "a"));
    assert!(calls.iter().any(|q| q == "b"));
}

#[tokio::test]
async fn test_processes_all_items() {
    let fetcher = Arc::new(MockFetcher::new());
    let processor = Arc::new(MockProcessor::new_success());
    for i in 0..10 {
        fetcher.push("default", item(&format!("item-{}", i)));
    }

    let pool = WorkerPool::spawn(config(2, &["default"]), fetcher.clone(), processor.clone())
        .unwrap();
    pool.start().unwrap();

    assert!(processor.wait_for_started(10, WAIT).await);
    assert_eq!(fetcher.remaining("default"), 0);

    let snapshot = wait_for_snapshot(&pool, |s| s.busy.is_empty()).await;
    assert_eq!(snapshot.live_processors(), 2);
    assert_eq!(snapshot.invariant_violations, 0);
}

#[tokio::test]
async fn test_weighted_queues_all_served() {
    let fetcher = Arc::new(MockFetcher::new());
    let processor = Arc::new(MockProcessor::new_success());
    fetcher.push("critical", item("c-1"));
    fetcher.push("low", item("l-1"));

    let config = PoolConfig::from_weighted(
        2,
        &[QueueConfig::new("critical", 3), QueueConfig::new("low", 1)],
    )
    .unwrap()
    .with_empty_queue_delay(Duration::from_millis(10));

    let pool = WorkerPool::spawn(config, fetcher.clone(), processor.clone()).unwrap();
    pool.start().unwrap();

    assert!(processor.wait_for_started(2, WAIT).await);
    let queues: Vec<String> = processor.started().into_iter().map(|(q, _)| q).collect();
    assert!(queues.contains(&"critical".to_string()));
    assert!(queues.contains(&"low".to_string()));

    let snapshot = pool.snapshot().await.unwrap();
    assert!(snapshot.weight("critical") >= 1 && snapshot.weight("critical") <= 3);
    assert_eq!(snapshot.weight("low"), 1);
}

#[tokio::test]
async fn test_idle_pool_stops_and_drains() {
    let fetcher = Arc::new(MockFetcher::new());
    let pool = WorkerPool::spawn(
        config(2, &["default"]),
        fetcher.clone(),
        Arc::new(MockProcessor::new_success()),
    )
    .unwrap();
    pool.start().unwrap();
    assert!(fetcher.wait_for_calls(2, WAIT).await);

    pool.stop().unwrap();

    tokio::time::timeout(WAIT, pool.wait_shutdown())
        .await
        .expect("shutdown should be signalled");
    assert!(pool.shutdown_token().is_shutdown());
    tokio::time::timeout(WAIT, pool.drained())
        .await
        .expect("idle pool should drain")
        .unwrap();
}

#[tokio::test]
async fn test_stop_signals_before_busy_processor_finishes() {
    let fetcher = Arc::new(MockFetcher::new());
    let processor = Arc::new(MockProcessor::new_blocking());
    fetcher.push("default", item("slow"));

    let pool = WorkerPool::spawn(config(2, &["default"]), fetcher, processor.clone()).unwrap();
    pool.start().unwrap();
    assert!(processor.wait_for_started(1, WAIT).await);

    pool.stop().unwrap();
    tokio::time::timeout(WAIT, pool.wait_shutdown())
        .await
        .expect("shutdown should be signalled while a processor is busy");

    let snapshot = pool.snapshot().await.unwrap();
    assert!(snapshot.stopped);
    assert!(snapshot.shutdown_signalled);
    assert_eq!(snapshot.busy.len(), 1);
    assert!(snapshot.ready.is_empty());

    processor.release(1);
    tokio::time::timeout(WAIT, pool.drained())
        .await
        .expect("pool should drain once the item finishes")
        .unwrap();
    assert_eq!(processor.processed(), vec![("default".to_string(), "slow".to_string())]);
}

#[tokio::test]
async fn test_no_fetches_after_stop() {
    let fetcher = Arc::new(MockFetcher::new());
    let pool = WorkerPool::spawn(
        config(2, &["default"]),
        fetcher.clone(),
        Arc::new(MockProcessor::new_success()),
    )
    .unwrap();
    pool.start().unwrap();
    assert!(fetcher.wait_for_calls(4, WAIT).await);

    pool.stop().unwrap();
    pool.wait_shutdown().await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    let after_stop = fetcher.call_count();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fetcher.call_count(), after_stop);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let result = WorkerPool::spawn(
        PoolConfig::new(0, vec!["default".to_string()]),
        Arc::new(MockFetcher::new()),
        Arc::new(MockProcessor::new_success()),
    );
    assert!(result.is_err());
}
