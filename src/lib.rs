//! newsfan - Concurrent Feed Aggregator
//!
//! Fetches many RSS/Atom feeds at once and merges their items into a single
//! deduplicated, newest-first store.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures and types
//! - [`storage`] - Deduplicating, time-ordered item store
//! - [`feed`] - Fetcher abstraction and the HTTP RSS/Atom fetcher
//! - [`pipeline`] - Worker pool, scatter/gather and the dispatch loop
//! - [`aggregator`] - Wires the pipeline around one store
//! - [`server`] - HTTP API
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use newsfan::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let fetcher = Arc::new(RssFetcher::new(&config.fetcher)?);
//!     let aggregator = Aggregator::new(fetcher, &config.pipeline)?;
//!
//!     aggregator.sync_now(config.feeds.urls.clone()).await;
//!     for item in aggregator.get_recent(5) {
//!         println!("{} - {}", item.source, item.title);
//!     }
//!
//!     aggregator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::aggregator::{Aggregator, AggregatorStatus};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::feed::{FeedFetcher, RssFetcher};
    pub use crate::models::{Feed, Item};
    pub use crate::pipeline::{DispatchState, GatherResult, ScatterGather, WorkerPool};
    pub use crate::storage::ItemStore;
}

// Direct re-exports for convenience
pub use models::{Feed, Item};
