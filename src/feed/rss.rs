//! HTTP feed fetcher for RSS 2.0 and Atom documents
//!
//! This module provides the network-facing [`FeedFetcher`] with features
//! including:
//! - Rate limiting with governor
//! - Automatic retry with exponential backoff on 429/5xx responses
//! - RSS 2.0 and Atom parsing with quick-xml
//! - Cooperative cancellation on every await

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client,
};
use serde::Deserialize;
use std::num::NonZeroU32;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::FeedFetcher;
use crate::config::FetcherConfig;
use crate::models::{Feed, Item};
use crate::utils::clean_text;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig};

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5";

/// Feed fetcher over HTTP
pub struct RssFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter shared by every fetch through this instance
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Backoff settings for retryable failures
    retry: RetryConfig,
}

impl RssFetcher {
    /// Create a fetcher from configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.request_timeout())
            .gzip(true)
            .build()?;

        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        let retry = RetryConfig::new(
            config.max_retries,
            config.retry_base_delay_ms,
            config.retry_base_delay_ms.saturating_mul(16),
        );

        Ok(Self {
            client,
            rate_limiter,
            retry,
        })
    }

    /// Create a fetcher with default settings
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(&FetcherConfig::default())
    }

    /// Fetch and parse the feed at `url`
    ///
    /// # Errors
    ///
    /// `InvalidUrl` for non-http(s) locators, `Cancelled` once `cancel`
    /// fires, otherwise the last network, status or parse error.
    pub async fn fetch_feed(&self, url: &str, cancel: &CancellationToken) -> Result<Feed, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "{url}: unsupported scheme {}",
                parsed.scheme()
            )));
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            body = self.fetch_with_retry(parsed.as_str()) => body?,
        };

        let feed = parse_feed(&body)?;
        tracing::debug!(url, title = %feed.title, items = feed.items.len(), "Feed parsed");
        Ok(feed)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        with_retry_if(&self.retry, || self.fetch_once(url), FetchError::is_recoverable).await
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch_source(
        &self,
        locator: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<Item>, FetchError> {
        Ok(self.fetch_feed(locator, &cancel).await?.items)
    }
}

// ============================================================================
// Document parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

// Namespaced elements (`atom:link`, `media:title`, `itunes:author`) arrive
// under their local name, so fields that have such twins are lists.
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "title", default)]
    titles: Vec<TextElement>,
    #[serde(rename = "description", default)]
    descriptions: Vec<TextElement>,
    #[serde(rename = "link", default)]
    links: Vec<TextElement>,
    #[serde(rename = "language", default)]
    languages: Vec<TextElement>,
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(rename = "title", default)]
    titles: Vec<TextElement>,
    #[serde(rename = "link", default)]
    links: Vec<TextElement>,
    #[serde(rename = "description", default)]
    descriptions: Vec<TextElement>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    guid: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<TextElement>,
    #[serde(rename = "category", default)]
    categories: Vec<TextElement>,
}

/// Text content of an element; attributes other than `href` are ignored
#[derive(Debug, Default, Deserialize)]
struct TextElement {
    #[serde(rename = "$text", default)]
    text: String,
    #[serde(rename = "@href")]
    href: Option<String>,
}

/// First element with non-empty text; `atom:link` self links carry only `href`
fn first_text(elements: &[TextElement]) -> Option<&str> {
    elements
        .iter()
        .map(|e| e.text.trim())
        .find(|t| !t.is_empty())
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    id: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    author: Option<AtomAuthor>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: String,
}

/// Parse an RSS 2.0 or Atom document
pub fn parse_feed(body: &str) -> Result<Feed, FetchError> {
    let xml = scrub_html_entities_for_xml(body);
    let head_end = xml.char_indices().nth(2048).map_or(xml.len(), |(i, _)| i);
    let head = &xml[..head_end];

    if head.contains("<rss") {
        parse_rss(&xml)
    } else if head.contains("<feed") {
        parse_atom(&xml)
    } else {
        Err(FetchError::Parse("unknown feed format".to_string()))
    }
}

fn parse_rss(xml: &str) -> Result<Feed, FetchError> {
    let rss: Rss =
        quick_xml::de::from_str(xml).map_err(|e| FetchError::Parse(format!("rss: {e}")))?;
    let channel = rss.channel;
    let source = clean_text(first_text(&channel.titles).unwrap_or_default());

    let items = channel
        .items
        .into_iter()
        .filter_map(|it| {
            // No link, no identity.
            let link = first_text(&it.links)?.to_string();
            Some(Item {
                link,
                title: clean_text(first_text(&it.titles).unwrap_or_default()),
                description: clean_text(first_text(&it.descriptions).unwrap_or_default()),
                source: source.clone(),
                published_at: it.pub_date.as_deref().and_then(parse_date),
                updated_at: None,
                content: None,
                author: first_text(&it.authors).map(clean_text).filter(|a| !a.is_empty()),
                guid: it.guid.map(|g| g.trim().to_string()),
                categories: it
                    .categories
                    .iter()
                    .map(|c| c.text.trim())
                    .filter(|c| !c.is_empty())
                    .map(clean_text)
                    .collect(),
            })
        })
        .collect();

    let link = first_text(&channel.links)
        .map(str::to_string)
        .or_else(|| channel.links.iter().find_map(|l| l.href.clone()))
        .unwrap_or_default();

    Ok(Feed {
        title: source,
        description: clean_text(first_text(&channel.descriptions).unwrap_or_default()),
        link,
        language: first_text(&channel.languages).map(str::to_string),
        items,
    })
}

fn parse_atom(xml: &str) -> Result<Feed, FetchError> {
    let atom: AtomFeed =
        quick_xml::de::from_str(xml).map_err(|e| FetchError::Parse(format!("atom: {e}")))?;
    let source = clean_text(&atom.title);

    let items = atom
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = alternate_link(&entry.links)?;
            let updated_at = entry.updated.as_deref().and_then(parse_date);
            Some(Item {
                link,
                title: clean_text(entry.title.as_deref().unwrap_or_default()),
                description: clean_text(entry.summary.as_deref().unwrap_or_default()),
                source: source.clone(),
                // Atom requires <updated>; <published> is optional.
                published_at: entry.published.as_deref().and_then(parse_date).or(updated_at),
                updated_at,
                content: entry.content.map(|c| clean_text(&c)).filter(|c| !c.is_empty()),
                author: entry.author.and_then(|a| a.name).map(|n| clean_text(&n)),
                guid: entry.id,
                categories: entry.categories.into_iter().map(|c| c.term).collect(),
            })
        })
        .collect();

    Ok(Feed {
        title: source,
        description: clean_text(&atom.subtitle),
        link: alternate_link(&atom.links).unwrap_or_default(),
        language: None,
        items,
    })
}

fn alternate_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref().unwrap_or("alternate") == "alternate")
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|l| !l.is_empty())
}

/// Parse RFC 2822 (RSS) or RFC 3339 (Atom) timestamps
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// Entities that are valid HTML but not XML show up in real feeds.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
