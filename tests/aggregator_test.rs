//! End-to-end tests for the aggregator

mod common;

use common::{create_item, Behavior, StubFetcher};
use newsfan::aggregator::Aggregator;
use newsfan::config::PipelineConfig;
use newsfan::pipeline::{DispatchState, ErrorHandler};
use newsfan::utils::error::{FetchError, PipelineError, SourceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        workers: 3,
        queue_capacity: 8,
        submit_buffer: 4,
        job_timeout_secs: 5,
        sync_timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_sync_now_merges_and_orders() {
    let fetcher = StubFetcher::new()
        .source(
            "feed-1",
            Duration::from_millis(10),
            Behavior::Items(vec![create_item("B", Some(5)), create_item("shared", Some(1))]),
        )
        .source(
            "feed-2",
            Duration::from_millis(1),
            Behavior::Items(vec![
                create_item("A", Some(10)),
                create_item("C", None),
                create_item("shared", Some(1)),
            ]),
        );
    let aggregator = Aggregator::new(Arc::new(fetcher), &pipeline_config()).unwrap();

    let result = aggregator.sync_now(["feed-1", "feed-2"]).await;
    assert!(!result.is_partial());
    assert_eq!(result.items.len(), 5);

    let links: Vec<String> = aggregator.get_recent(10).into_iter().map(|i| i.link).collect();
    assert_eq!(links, vec!["A", "B", "shared", "C"]);
    assert_eq!(aggregator.count(), 4);

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_fetch_all_leaves_store_untouched() {
    let fetcher = StubFetcher::new().items("feed", Duration::ZERO, 3);
    let aggregator = Aggregator::new(Arc::new(fetcher), &pipeline_config()).unwrap();

    let result = aggregator.fetch_all(["feed"]).await;
    assert_eq!(result.items.len(), 3);
    assert_eq!(aggregator.count(), 0);

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_background_ingestion_and_error_handler() {
    let fetcher = StubFetcher::new()
        .items("ok-1", Duration::from_millis(5), 2)
        .items("ok-2", Duration::from_millis(5), 2)
        .source("down", Duration::from_millis(5), Behavior::Status(500));

    let failures = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failures);
    let on_error: ErrorHandler = Arc::new(move |_: &SourceError| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let aggregator =
        Aggregator::with_error_handler(Arc::new(fetcher), &pipeline_config(), on_error).unwrap();

    for locator in ["ok-1", "down", "ok-2"] {
        aggregator.submit(locator).await.unwrap();
    }
    aggregator
        .report_error(SourceError::new("elsewhere", FetchError::Timeout))
        .unwrap();

    aggregator.shutdown().await;

    assert_eq!(aggregator.dispatch_state(), DispatchState::Stopped);
    assert_eq!(aggregator.count(), 4);
    assert_eq!(failures.load(Ordering::SeqCst), 2);

    let status = aggregator.status();
    assert_eq!(status.item_count, 4);
    assert_eq!(status.pool.submitted, 3);
    assert_eq!(status.pool.succeeded, 2);
    assert_eq!(status.pool.failed, 1);
}

#[tokio::test]
async fn test_inputs_rejected_after_shutdown() {
    let aggregator = Aggregator::new(Arc::new(StubFetcher::new()), &pipeline_config()).unwrap();
    aggregator.shutdown().await;
    aggregator.shutdown().await;

    assert_eq!(aggregator.submit("late").await, Err(PipelineError::ShutDown));
    assert_eq!(
        aggregator.report_error(SourceError::new("late", FetchError::Timeout)),
        Err(PipelineError::ShutDown)
    );
}

#[tokio::test]
async fn test_abort_cancels_sync() {
    let fetcher = StubFetcher::new().items("slow", Duration::from_secs(30), 1);
    let aggregator = Arc::new(Aggregator::new(Arc::new(fetcher), &pipeline_config()).unwrap());

    let aborter = Arc::clone(&aggregator);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        aborter.abort();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), aggregator.sync_now(["slow"]))
        .await
        .expect("abort should end the sync promptly");

    assert_eq!(result.failures.len(), 1);
    assert!(result.failures[0].error.is_cancelled());
    assert_eq!(aggregator.count(), 0);

    aggregator.shutdown().await;
}
