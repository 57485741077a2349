//! REST API handlers
//!
//! ```text
//! GET /articles?count=N   most recent items (default count when N is missing or not positive)
//! GET /sync               fetch every configured feed now; 206 when some failed
//! GET /health             liveness
//! GET /status             pipeline status
//! GET /metrics            Prometheus text format
//! ```

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Item;
use crate::pipeline::{DispatchState, StatsSnapshot};

use super::AppState;

// ============================================================================
// API Types
// ============================================================================

/// Query of `/articles`. `count` stays a string so junk falls back to the
/// default instead of rejecting the request.
#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    pub count: Option<String>,
}

impl ArticlesQuery {
    fn resolve(&self, default: usize) -> usize {
        self.count
            .as_deref()
            .and_then(|c| c.trim().parse::<i64>().ok())
            .filter(|&n| n > 0)
            .map_or(default, |n| usize::try_from(n).unwrap_or(default))
    }
}

/// Body of a partially failed `/sync`
#[derive(Debug, Serialize)]
pub struct PartialSyncResponse {
    pub articles: Vec<Item>,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub article_count: usize,
    pub feed_count: usize,
    pub dispatch_state: DispatchState,
    pub workers: usize,
    pub pending_jobs: usize,
    pub pool: StatsSnapshot,
    pub timestamp: String,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/articles", get(get_articles))
        .route("/sync", get(sync_feeds))
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_articles(
    State(state): State<AppState>,
    Query(query): Query<ArticlesQuery>,
) -> Json<Vec<Item>> {
    let n = query.resolve(state.default_count);
    Json(state.aggregator.get_recent(n))
}

/// Fetch all configured feeds concurrently and ingest what arrived
async fn sync_feeds(State(state): State<AppState>) -> Response {
    let result = state.aggregator.sync_now(state.feeds.iter().cloned()).await;

    if result.is_partial() {
        let body = PartialSyncResponse {
            errors: result.failures.iter().map(ToString::to_string).collect(),
            articles: result.items,
        };
        return (StatusCode::PARTIAL_CONTENT, Json(body)).into_response();
    }

    (StatusCode::OK, Json(result.items)).into_response()
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.aggregator.status();
    let label = match status.dispatch_state {
        DispatchState::Running => "running",
        DispatchState::Draining | DispatchState::Stopped => "stopping",
    };

    Json(StatusResponse {
        status: label.to_string(),
        article_count: status.item_count,
        feed_count: state.feeds.len(),
        dispatch_state: status.dispatch_state,
        workers: status.workers,
        pending_jobs: status.pending_jobs,
        pool: status.pool,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

async fn get_metrics() -> Response {
    match crate::metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
