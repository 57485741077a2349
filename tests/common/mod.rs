//! Common test utilities

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use newsfan::feed::FeedFetcher;
use newsfan::models::Item;
use newsfan::utils::error::FetchError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timestamp `secs` seconds after the epoch
#[allow(dead_code)]
pub fn at(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Create a test item with a title derived from its link
#[allow(dead_code)]
pub fn create_item(link: &str, published: Option<i64>) -> Item {
    Item::new(link, published.and_then(at)).with_title(format!("Title of {link}"))
}

/// How a stub source behaves
#[derive(Clone)]
#[allow(dead_code)]
pub enum Behavior {
    /// Return these items after the delay
    Items(Vec<Item>),
    /// Fail with this HTTP status after the delay
    Status(u16),
    /// Panic inside the fetch
    Panic,
}

/// In-memory fetcher with per-locator delay and behavior
///
/// Unknown locators fail with `InvalidUrl`. Delays honor cancellation.
#[derive(Default)]
pub struct StubFetcher {
    sources: HashMap<String, (Duration, Behavior)>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, locator: &str, delay: Duration, behavior: Behavior) -> Self {
        self.sources.insert(locator.to_string(), (delay, behavior));
        self
    }

    /// Source returning `count` items named `{locator}/{i}`
    pub fn items(self, locator: &str, delay: Duration, count: usize) -> Self {
        let items = (0..count)
            .map(|i| create_item(&format!("{locator}/{i}"), Some(i as i64)))
            .collect();
        self.source(locator, delay, Behavior::Items(items))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for StubFetcher {
    async fn fetch_source(
        &self,
        locator: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<Item>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some((delay, behavior)) = self.sources.get(locator).cloned() else {
            return Err(FetchError::InvalidUrl(locator.to_string()));
        };

        tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        match behavior {
            Behavior::Items(items) => Ok(items),
            Behavior::Status(code) => Err(FetchError::ServerError(code)),
            Behavior::Panic => panic!("stub fetcher panicked for {locator}"),
        }
    }
}
