//! Scatter/gather fetching
//!
//! [`ScatterGather::fetch_all`] spawns one task per locator and collects
//! exactly one outcome from each over a fan-in channel. Every task owns a
//! sender clone and the coordinator drops its own, so the channel closes
//! exactly when the last task has reported; the collector never counts.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::feed::FeedFetcher;
use crate::metrics;
use crate::models::Item;
use crate::utils::error::{FetchError, SourceError};

type Outcome = (String, Result<Vec<Item>, FetchError>);

/// Merged outcome of a fan-out
#[derive(Debug, Default)]
pub struct GatherResult {
    /// Items of every successful source, in completion order
    pub items: Vec<Item>,

    /// One entry per failed source
    pub failures: Vec<SourceError>,
}

impl GatherResult {
    /// True when at least one source failed
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Fans a set of locators out to a [`FeedFetcher`] and merges the results
#[derive(Clone)]
pub struct ScatterGather {
    fetcher: Arc<dyn FeedFetcher>,
    timeout: Option<Duration>,
}

impl ScatterGather {
    pub fn new(fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self {
            fetcher,
            timeout: None,
        }
    }

    /// Give the whole fan-out a deadline. Sources still running when it
    /// passes report `FetchError::Timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fetch every locator concurrently and wait for all of them
    ///
    /// Partial failure is not an error: failed sources are listed in
    /// [`GatherResult::failures`] next to the items of the others. When
    /// `cancel` fires, outstanding sources report `FetchError::Cancelled`.
    pub async fn fetch_all<I, S>(&self, locators: I, cancel: &CancellationToken) -> GatherResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locators: Vec<String> = locators.into_iter().map(Into::into).collect();
        let total = locators.len();
        let deadline = self.timeout.map(|t| Instant::now() + t);

        tracing::debug!(sources = total, timeout = ?self.timeout, "Scatter");

        let (tx, mut rx) = mpsc::channel::<Outcome>(total.max(1));

        for locator in locators {
            let tx = tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let token = cancel.child_token();

            tokio::spawn(async move {
                let started = std::time::Instant::now();
                let outcome = fetch_one(fetcher.as_ref(), &locator, token, deadline).await;

                let label = match &outcome {
                    Ok(_) => "ok",
                    Err(e) => e.kind(),
                };
                metrics::record_source_outcome(label, started.elapsed().as_secs_f64());

                // Capacity equals the task count, so this never waits.
                let _ = tx.send((locator, outcome)).await;
            });
        }
        drop(tx);

        let mut result = GatherResult::default();
        while let Some((locator, outcome)) = rx.recv().await {
            match outcome {
                Ok(items) => {
                    tracing::debug!(locator = %locator, items = items.len(), "Source fetched");
                    result.items.extend(items);
                }
                Err(error) => {
                    tracing::warn!(locator = %locator, error = %error, "Source failed");
                    result.failures.push(SourceError::new(locator, error));
                }
            }
        }

        tracing::info!(
            sources = total,
            items = result.items.len(),
            failures = result.failures.len(),
            "Gather complete"
        );

        result
    }
}

async fn fetch_one(
    fetcher: &dyn FeedFetcher,
    locator: &str,
    cancel: CancellationToken,
    deadline: Option<Instant>,
) -> Result<Vec<Item>, FetchError> {
    let fetch = AssertUnwindSafe(fetcher.fetch_source(locator, cancel.clone())).catch_unwind();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        _ = deadline_elapsed(deadline) => {
            cancel.cancel();
            Err(FetchError::Timeout)
        }
        result = fetch => result.unwrap_or(Err(FetchError::TaskPanicked)),
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
