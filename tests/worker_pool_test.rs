//! Integration tests for the worker pool

mod common;

use async_trait::async_trait;
use common::StubFetcher;
use newsfan::aggregator::FeedIngestor;
use newsfan::models::Item;
use newsfan::pipeline::{SourceProcessor, WorkerPool, WorkerPoolConfig};
use newsfan::storage::ItemStore;
use newsfan::utils::error::{FetchError, PoolError, SourceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Processor that blocks every job until the gate opens
struct Gated {
    gate: Arc<Semaphore>,
    started: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl SourceProcessor for Gated {
    async fn process_source(
        &self,
        locator: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<Item>, FetchError> {
        let _ = self.started.send(locator.to_string());
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            permit = self.gate.acquire() => {
                drop(permit);
                Ok(vec![Item::new(locator, None)])
            }
        }
    }
}

fn config(workers: usize, queue_capacity: usize, job_timeout: Duration) -> WorkerPoolConfig {
    WorkerPoolConfig {
        workers,
        queue_capacity,
        job_timeout,
    }
}

async fn drain(mut errors: mpsc::UnboundedReceiver<SourceError>) -> Vec<SourceError> {
    let mut out = Vec::new();
    while let Some(e) = errors.recv().await {
        out.push(e);
    }
    out
}

#[tokio::test]
async fn test_submit_waits_while_queue_full() {
    let gate = Arc::new(Semaphore::new(0));
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let (error_tx, _error_rx) = mpsc::unbounded_channel();

    let processor = Arc::new(Gated {
        gate: Arc::clone(&gate),
        started: started_tx,
    });
    let pool = WorkerPool::new(
        processor,
        config(1, 1, Duration::from_secs(10)),
        error_tx,
        CancellationToken::new(),
    )
    .unwrap();

    // Worker picks up job 1 and blocks on the gate.
    pool.submit("1").await.unwrap();
    assert_eq!(started_rx.recv().await.as_deref(), Some("1"));

    // Job 2 fills the single queue slot.
    pool.submit("2").await.unwrap();
    assert_eq!(pool.pending(), 1);

    // Job 3 has nowhere to go.
    let blocked = tokio::time::timeout(Duration::from_millis(100), pool.submit("3")).await;
    assert!(blocked.is_err(), "submit should wait while the queue is full");

    gate.add_permits(10);

    let accepted = tokio::time::timeout(Duration::from_secs(5), pool.submit("3")).await;
    assert!(matches!(accepted, Ok(Ok(_))));

    pool.stop();
    pool.join().await;

    let stats = pool.stats();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.succeeded, 3);
}

#[tokio::test]
async fn test_job_timeout_does_not_stop_worker() {
    let fetcher = StubFetcher::new()
        .items("slow", Duration::from_secs(30), 1)
        .items("a", Duration::from_millis(1), 1)
        .items("b", Duration::from_millis(1), 1);
    let store = Arc::new(ItemStore::new());
    let ingestor = Arc::new(FeedIngestor::new(Arc::new(fetcher), Arc::clone(&store)));

    let (error_tx, error_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::new(
        ingestor,
        config(1, 10, Duration::from_millis(100)),
        error_tx,
        CancellationToken::new(),
    )
    .unwrap();

    for locator in ["slow", "a", "b"] {
        pool.submit(locator).await.unwrap();
    }
    pool.stop();
    pool.join().await;

    let errors = drain(error_rx).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].locator, "slow");
    assert!(matches!(errors[0].error, FetchError::Timeout));

    let stats = pool.stats();
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.timed_out, 1);

    assert!(store.contains("a/0"));
    assert!(store.contains("b/0"));
    assert!(!store.contains("slow/0"));
}

#[tokio::test]
async fn test_failures_go_to_error_sink() {
    let fetcher = StubFetcher::new().items("good", Duration::ZERO, 2);
    let store = Arc::new(ItemStore::new());
    let ingestor = Arc::new(FeedIngestor::new(Arc::new(fetcher), Arc::clone(&store)));

    let (error_tx, error_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::new(
        ingestor,
        config(3, 10, Duration::from_secs(5)),
        error_tx,
        CancellationToken::new(),
    )
    .unwrap();

    pool.submit("good").await.unwrap();
    pool.submit("unknown").await.unwrap();
    pool.stop();
    pool.join().await;

    let errors = drain(error_rx).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].locator, "unknown");
    assert_eq!(store.count(), 2);
}

#[tokio::test]
async fn test_submit_after_stop_fails_fast() {
    let (error_tx, _error_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::new(
        Arc::new(FeedIngestor::new(
            Arc::new(StubFetcher::new()),
            Arc::new(ItemStore::new()),
        )),
        config(2, 1, Duration::from_secs(1)),
        error_tx,
        CancellationToken::new(),
    )
    .unwrap();

    pool.stop();
    let result = tokio::time::timeout(Duration::from_millis(100), pool.submit("late")).await;
    assert_eq!(result, Ok(Err(PoolError::Stopped)));
    pool.join().await;
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_jobs() {
    let gate = Arc::new(Semaphore::new(0));
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let (error_tx, error_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let pool = WorkerPool::new(
        Arc::new(Gated {
            gate,
            started: started_tx,
        }),
        config(1, 4, Duration::from_secs(30)),
        error_tx,
        cancel.clone(),
    )
    .unwrap();

    pool.submit("stuck").await.unwrap();
    pool.submit("queued").await.unwrap();
    assert_eq!(started_rx.recv().await.as_deref(), Some("stuck"));

    cancel.cancel();
    pool.stop();
    tokio::time::timeout(Duration::from_secs(5), pool.join())
        .await
        .expect("cancelled pool should exit promptly");

    // Cancellation is not a failure.
    assert!(drain(error_rx).await.is_empty());
    assert_eq!(pool.stats().cancelled, 2);
}

#[tokio::test]
async fn test_worker_count() {
    let (error_tx, _error_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::new(
        Arc::new(FeedIngestor::new(
            Arc::new(StubFetcher::new()),
            Arc::new(ItemStore::new()),
        )),
        config(4, 8, Duration::from_secs(1)),
        error_tx,
        CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(pool.worker_count(), 4);
    assert_eq!(pool.pending(), 0);
    pool.stop();
    pool.join().await;
}
