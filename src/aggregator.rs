//! Aggregator: the composition root of the pipeline
//!
//! Wires one [`ItemStore`], one worker pool driven by a dispatch loop, and a
//! scatter/gather coordinator around a single [`FeedFetcher`]. Background
//! ingestion goes through [`Aggregator::submit`]; request-driven refreshes
//! go through [`Aggregator::sync_now`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use newsfan::aggregator::Aggregator;
//! use newsfan::config::PipelineConfig;
//! use newsfan::feed::RssFetcher;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = Arc::new(RssFetcher::with_defaults()?);
//! let aggregator = Aggregator::new(fetcher, &PipelineConfig::default())?;
//!
//! let result = aggregator.sync_now(["https://feeds.bbci.co.uk/news/rss.xml"]).await;
//! println!("{} items, {} failures", result.items.len(), result.failures.len());
//!
//! aggregator.shutdown().await;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::feed::FeedFetcher;
use crate::metrics;
use crate::models::Item;
use crate::pipeline::{
    DispatchHandle, DispatchState, ErrorHandler, GatherResult, ScatterGather, SourceProcessor,
    StatsSnapshot, WorkerPool, WorkerPoolConfig,
};
use crate::storage::ItemStore;
use crate::utils::error::{FetchError, PipelineError, SourceError};

/// Pool job: fetch one source and route its items into the store
pub struct FeedIngestor {
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<ItemStore>,
}

impl FeedIngestor {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, store: Arc<ItemStore>) -> Self {
        Self { fetcher, store }
    }
}

#[async_trait]
impl SourceProcessor for FeedIngestor {
    async fn process_source(
        &self,
        locator: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<Item>, FetchError> {
        let started = Instant::now();
        let result = self.fetcher.fetch_source(locator, cancel).await;

        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_source_outcome(label, started.elapsed().as_secs_f64());

        let items = result?;
        let inserted = self.store.add_many(items.iter().cloned());
        metrics::record_ingest(inserted, self.store.count());

        tracing::debug!(locator, fetched = items.len(), inserted, "Source ingested");
        Ok(items)
    }
}

/// Point-in-time view of the aggregator
#[derive(Debug, Clone, Serialize)]
pub struct AggregatorStatus {
    pub dispatch_state: DispatchState,
    pub item_count: usize,
    pub workers: usize,
    pub pending_jobs: usize,
    pub pool: StatsSnapshot,
}

struct Inlets {
    submit_tx: mpsc::Sender<String>,
    error_tx: mpsc::UnboundedSender<SourceError>,
}

/// Concurrent feed aggregator
pub struct Aggregator {
    store: Arc<ItemStore>,
    gather: ScatterGather,
    pool: Arc<WorkerPool>,
    dispatch: DispatchHandle,
    inlets: Mutex<Option<Inlets>>,
    cancel: CancellationToken,
}

impl Aggregator {
    /// Build the pipeline and start its workers and dispatch loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        Self::with_error_handler(fetcher, config, Arc::new(|_: &SourceError| {}))
    }

    /// Like [`new`](Self::new), invoking `on_error` for every source failure
    /// seen by the dispatch loop
    pub fn with_error_handler(
        fetcher: Arc<dyn FeedFetcher>,
        config: &PipelineConfig,
        on_error: ErrorHandler,
    ) -> Result<Self, PipelineError> {
        let store = Arc::new(ItemStore::new());
        let cancel = CancellationToken::new();

        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (submit_tx, submit_rx) = mpsc::channel(config.submit_buffer.max(1));

        let ingestor = Arc::new(FeedIngestor::new(Arc::clone(&fetcher), Arc::clone(&store)));
        let pool = Arc::new(WorkerPool::new(
            ingestor,
            WorkerPoolConfig::from(config),
            error_tx.clone(),
            cancel.clone(),
        )?);

        let dispatch = DispatchHandle::spawn(Arc::clone(&pool), submit_rx, error_rx, on_error);

        let gather =
            ScatterGather::new(fetcher).with_timeout(Duration::from_secs(config.sync_timeout_secs));

        Ok(Self {
            store,
            gather,
            pool,
            dispatch,
            inlets: Mutex::new(Some(Inlets {
                submit_tx,
                error_tx,
            })),
            cancel,
        })
    }

    fn submit_sender(&self) -> Option<mpsc::Sender<String>> {
        self.inlets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|i| i.submit_tx.clone())
    }

    /// Queue a locator for background ingestion
    ///
    /// Waits while the dispatch inbox is full.
    pub async fn submit(&self, locator: impl Into<String>) -> Result<(), PipelineError> {
        let tx = self.submit_sender().ok_or(PipelineError::ShutDown)?;
        tx.send(locator.into())
            .await
            .map_err(|_| PipelineError::ShutDown)
    }

    /// Report a failure observed outside the pool
    pub fn report_error(&self, error: SourceError) -> Result<(), PipelineError> {
        let inlets = self.inlets.lock().unwrap_or_else(PoisonError::into_inner);
        let inlets = inlets.as_ref().ok_or(PipelineError::ShutDown)?;
        inlets
            .error_tx
            .send(error)
            .map_err(|_| PipelineError::ShutDown)
    }

    /// Fetch `locators` concurrently without touching the store
    pub async fn fetch_all<I, S>(&self, locators: I) -> GatherResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gather.fetch_all(locators, &self.cancel).await
    }

    /// Fetch `locators` concurrently and ingest every item that arrived
    pub async fn sync_now<I, S>(&self, locators: I) -> GatherResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let result = self.fetch_all(locators).await;
        let inserted = self.store.add_many(result.items.iter().cloned());
        metrics::record_ingest(inserted, self.store.count());

        tracing::info!(
            fetched = result.items.len(),
            inserted,
            failures = result.failures.len(),
            "Sync complete"
        );
        result
    }

    /// Up to `n` most recent items
    pub fn get_recent(&self, n: usize) -> Vec<Item> {
        self.store.get_recent(n)
    }

    /// Number of distinct items held
    pub fn count(&self) -> usize {
        self.store.count()
    }

    /// The backing store
    pub fn store(&self) -> &Arc<ItemStore> {
        &self.store
    }

    /// Current dispatch loop state
    pub fn dispatch_state(&self) -> DispatchState {
        self.dispatch.state()
    }

    /// Receiver observing dispatch state changes
    pub fn subscribe_state(&self) -> watch::Receiver<DispatchState> {
        self.dispatch.subscribe()
    }

    pub fn status(&self) -> AggregatorStatus {
        AggregatorStatus {
            dispatch_state: self.dispatch.state(),
            item_count: self.store.count(),
            workers: self.pool.worker_count(),
            pending_jobs: self.pool.pending(),
            pool: self.pool.stats(),
        }
    }

    /// Close both inputs and wait for the dispatch loop to stop
    ///
    /// Queued jobs still run. Idempotent.
    pub async fn shutdown(&self) {
        let inlets = self
            .inlets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if inlets.is_some() {
            tracing::info!(pending = self.pool.pending(), "Shutting down aggregator");
        }
        drop(inlets);

        self.dispatch.wait_stopped().await;
    }

    /// Cancel every in-flight fetch, in the pool and in scatter/gather
    pub fn abort(&self) {
        tracing::warn!("Aborting in-flight fetches");
        self.cancel.cancel();
    }
}
