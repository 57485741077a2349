pub mod serve;
pub mod sync;

// Re-export command functions for convenience
pub use serve::{serve, ServeParams};
pub use sync::{sync, SyncParams};

use std::sync::Arc;

use newsfan::aggregator::Aggregator;
use newsfan::config::Config;
use newsfan::error::Result;
use newsfan::feed::RssFetcher;

/// Build the HTTP fetcher and the pipeline from configuration
fn build_aggregator(config: &Config) -> Result<Arc<Aggregator>> {
    let build = || -> Result<Aggregator> {
        let fetcher = RssFetcher::new(&config.fetcher)?;
        Ok(Aggregator::new(Arc::new(fetcher), &config.pipeline)?)
    };

    build().map(Arc::new).inspect_err(|e| {
        tracing::error!(
            category = e.category().description(),
            recoverable = e.is_recoverable(),
            error = %e,
            "Failed to start aggregator"
        );
    })
}
