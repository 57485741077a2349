//! Feed fetching capability
//!
//! The pipeline never talks to the network directly. It consumes a
//! [`FeedFetcher`], injected at construction, which turns a locator into a
//! batch of items. [`rss::RssFetcher`] is the HTTP implementation; tests
//! substitute their own.

pub mod rss;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::models::Item;
use crate::utils::error::FetchError;

pub use rss::RssFetcher;

/// Fetches one source and returns its items
///
/// Implementations may block on I/O for as long as they need, but must watch
/// `cancel` and return [`FetchError::Cancelled`] promptly once it fires.
/// A failure is terminal: there is no partial batch alongside an error.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse the source behind `locator`
    async fn fetch_source(
        &self,
        locator: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<Item>, FetchError>;
}

