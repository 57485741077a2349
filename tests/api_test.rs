//! HTTP route tests using tower's oneshot

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{create_item, Behavior, StubFetcher};
use newsfan::aggregator::Aggregator;
use newsfan::config::{PipelineConfig, ServerConfig};
use newsfan::server::{AppState, FeedServer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn router_with(fetcher: StubFetcher, feeds: &[&str]) -> (Router, Arc<Aggregator>) {
    let aggregator = Arc::new(Aggregator::new(Arc::new(fetcher), &PipelineConfig::default()).unwrap());
    let state = AppState::new(
        Arc::clone(&aggregator),
        feeds.iter().map(|f| f.to_string()).collect(),
        10,
    );
    let router = FeedServer::new(ServerConfig::default(), state).build_router();
    (router, aggregator)
}

async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_articles_default_and_count() {
    let (router, aggregator) = router_with(StubFetcher::new(), &[]);
    aggregator
        .store()
        .add_many((0..15).map(|i| create_item(&format!("item-{i}"), Some(i))));

    let (status, body) = get_json(router.clone(), "/articles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 10);
    assert_eq!(body[0]["link"], "item-14");

    let (_, body) = get_json(router.clone(), "/articles?count=3").await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (_, body) = get_json(router.clone(), "/articles?count=-1").await;
    assert_eq!(body.as_array().unwrap().len(), 10);

    let (status, body) = get_json(router, "/articles?count=lots").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_sync_all_ok() {
    let fetcher = StubFetcher::new()
        .items("one", Duration::ZERO, 2)
        .items("two", Duration::ZERO, 1);
    let (router, aggregator) = router_with(fetcher, &["one", "two"]);

    let (status, body) = get_json(router, "/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(aggregator.count(), 3);
}

#[tokio::test]
async fn test_sync_partial_content() {
    let fetcher = StubFetcher::new()
        .items("one", Duration::ZERO, 2)
        .source("broken", Duration::ZERO, Behavior::Status(500));
    let (router, _aggregator) = router_with(fetcher, &["one", "broken"]);

    let (status, body) = get_json(router, "/sync").await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body["articles"].as_array().unwrap().len(), 2);

    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().starts_with("broken"));
}

#[tokio::test]
async fn test_health() {
    let (router, _aggregator) = router_with(StubFetcher::new(), &[]);

    let (status, body) = get_json(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "newsfan");
}

#[tokio::test]
async fn test_status() {
    let (router, aggregator) = router_with(StubFetcher::new(), &["a", "b", "c"]);
    aggregator.store().add_one(create_item("x", None));

    let (status, body) = get_json(router, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["article_count"], 1);
    assert_eq!(body["feed_count"], 3);
    assert_eq!(body["dispatch_state"], "running");
    assert!(body["timestamp"].is_string());
    assert!(body["pool"]["submitted"].is_u64());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let _ = newsfan::metrics::init_metrics();
    let (router, _aggregator) = router_with(StubFetcher::new(), &[]);

    let (status, body) = get(router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("newsfan_"));
}

#[tokio::test]
async fn test_unknown_route() {
    let (router, _aggregator) = router_with(StubFetcher::new(), &[]);
    let (status, _) = get(router, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
