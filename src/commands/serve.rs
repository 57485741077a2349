use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use newsfan::config::Config;
use newsfan::metrics;
use newsfan::server::{AppState, FeedServer};

use super::build_aggregator;

/// Extra time granted to queued jobs after the server stops
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration parameters for `serve`
pub struct ServeParams {
    pub config: Config,
    pub bind: Option<String>,
}

/// Submit the configured feeds for background ingestion and serve the API
/// until Ctrl+C
pub async fn serve(params: ServeParams) -> Result<()> {
    let mut config = params.config;
    if let Some(bind) = params.bind {
        config.server.bind_address = bind;
    }
    let addr = config.bind_address()?;

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    let aggregator = build_aggregator(&config)?;

    for url in &config.feeds.urls {
        aggregator
            .submit(url.as_str())
            .await
            .with_context(|| format!("Failed to submit feed {url}"))?;
    }
    tracing::info!(feeds = config.feeds.urls.len(), "Initial feeds submitted");

    let state = AppState::new(
        Arc::clone(&aggregator),
        config.feeds.urls.clone(),
        config.server.default_count,
    );
    let server = FeedServer::new(config.server.clone(), state);

    println!("newsfan listening on http://{addr}");
    println!();
    println!("Endpoints:");
    println!("  GET /articles?count=N - Most recent items");
    println!("  GET /sync             - Fetch all feeds now");
    println!("  GET /health           - Health check");
    println!("  GET /status           - Pipeline status");
    println!("  GET /metrics          - Prometheus metrics");
    println!();
    println!("Press Ctrl+C to stop.");

    server
        .start_with_shutdown(addr, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "Failed to wait for Ctrl+C"),
            }
        })
        .await?;

    let grace = config.job_timeout() + SHUTDOWN_GRACE;
    if tokio::time::timeout(grace, aggregator.shutdown()).await.is_err() {
        tracing::warn!(grace_secs = grace.as_secs(), "Drain took too long, aborting");
        aggregator.abort();
        aggregator.shutdown().await;
    }

    println!("newsfan stopped.");
    Ok(())
}
