//! HTTP server exposing the aggregator
//!
//! Routes live in [`api`]; this module owns shared state, middleware and the
//! listener lifecycle.

pub mod api;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::aggregator::Aggregator;
use crate::config::ServerConfig;

pub use api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The running pipeline
    pub aggregator: Arc<Aggregator>,

    /// Feeds fetched by `/sync`
    pub feeds: Arc<Vec<String>>,

    /// Item count used when `/articles` gets no usable `count`
    pub default_count: usize,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>, feeds: Vec<String>, default_count: usize) -> Self {
        Self {
            aggregator,
            feeds: Arc::new(feeds),
            default_count,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// Feed API server
pub struct FeedServer {
    config: ServerConfig,
    state: AppState,
}

impl FeedServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes and configured middleware
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        addr: SocketAddr,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(addr, e))?;

        tracing::info!(%addr, feeds = self.state.feeds.len(), "Feed server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("Feed server shutdown complete");
        Ok(())
    }
}

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
