use anyhow::{bail, Result};

use newsfan::config::Config;

use super::build_aggregator;

/// Configuration parameters for `sync`
pub struct SyncParams {
    pub config: Config,
    pub feeds: Vec<String>,
    pub count: usize,
}

/// Fetch feeds once and print the most recent items as JSON
///
/// Falls back to the configured feeds when none are given. Fails only when
/// every feed failed.
pub async fn sync(params: SyncParams) -> Result<()> {
    let config = params.config;

    let feeds = if params.feeds.is_empty() {
        config.feeds.urls.clone()
    } else {
        params.feeds
    };
    if feeds.is_empty() {
        bail!("No feeds given and none configured");
    }

    let aggregator = build_aggregator(&config)?;
    let result = aggregator.sync_now(feeds.iter().map(String::as_str)).await;

    let recent = aggregator.get_recent(params.count);
    println!("{}", serde_json::to_string_pretty(&recent)?);

    eprintln!(
        "{} feeds, {} items fetched, {} stored, {} failed",
        feeds.len(),
        result.items.len(),
        aggregator.count(),
        result.failures.len()
    );

    aggregator.shutdown().await;

    if result.failures.len() == feeds.len() {
        bail!("All {} feeds failed", feeds.len());
    }
    Ok(())
}
