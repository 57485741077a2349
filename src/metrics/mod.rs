//! Prometheus metrics for the aggregator
//!
//! Tracks per-source fetch outcomes, fetch latency, worker pool job results
//! and the size of the item store.
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! Until then, and if registration fails, recording functions are no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct FeedMetrics {
    sources_fetched: CounterVec,
    items_ingested: Counter,
    store_items: Gauge,
    fetch_duration: Histogram,
    pool_jobs: CounterVec,
}

static FEED_METRICS: OnceLock<FeedMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Register all metrics with the default Prometheus registry
///
/// Idempotent: later calls return `Ok(())` without registering again.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = newsfan::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics disabled");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.set(true).is_err() {
        return Ok(());
    }

    let metrics = FeedMetrics {
        sources_fetched: register_counter_vec!(
            "newsfan_sources_fetched_total",
            "Feed sources fetched, by outcome",
            &["outcome"]
        )?,
        items_ingested: register_counter!(
            "newsfan_items_ingested_total",
            "New items inserted into the store"
        )?,
        store_items: register_gauge!(
            "newsfan_store_items",
            "Number of distinct items currently held"
        )?,
        fetch_duration: register_histogram!(
            "newsfan_fetch_duration_seconds",
            "Time spent fetching a single source",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
        pool_jobs: register_counter_vec!(
            "newsfan_pool_jobs_total",
            "Worker pool jobs finished, by result",
            &["result"]
        )?,
    };

    FEED_METRICS
        .set(metrics)
        .map_err(|_| "Feed metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    FEED_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the outcome of fetching one source (`ok` or an error kind)
pub fn record_source_outcome(outcome: &str, duration_secs: f64) {
    let Some(m) = FEED_METRICS.get() else {
        return;
    };

    m.sources_fetched.with_label_values(&[outcome]).inc();
    m.fetch_duration.observe(duration_secs);
}

/// Record items inserted into the store and its new size
pub fn record_ingest(inserted: usize, store_size: usize) {
    let Some(m) = FEED_METRICS.get() else {
        return;
    };

    if inserted > 0 {
        m.items_ingested.inc_by(inserted as f64);
    }
    m.store_items.set(store_size as f64);
}

/// Record a finished worker pool job
pub fn record_pool_job(result: &str) {
    if let Some(m) = FEED_METRICS.get() {
        m.pool_jobs.with_label_values(&[result]).inc();
    }
}
