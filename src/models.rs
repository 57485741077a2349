// Core data structures for the feed aggregator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single fetched feed item
///
/// `link` is the identity used for deduplication and `published_at` is the
/// ordering key. Everything else is display payload.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Item {
    pub link: String,
    pub title: String,
    pub description: String,
    pub source: String, // Title of the feed that produced the item
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl Item {
    /// Create an item with the identity and ordering key set
    pub fn new(link: impl Into<String>, published_at: Option<DateTime<Utc>>) -> Self {
        Self {
            link: link.into(),
            published_at,
            ..Default::default()
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the producing feed
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Deduplication key
    pub fn id(&self) -> &str {
        &self.link
    }

    /// Recency order: newest first, undated items last.
    ///
    /// Two undated items compare equal.
    pub fn cmp_recency(&self, other: &Self) -> Ordering {
        match (&self.published_at, &other.published_at) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// A parsed feed document with its items
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Feed {
    pub title: String,
    pub description: String,
    pub link: String,
    pub language: Option<String>,
    pub items: Vec<Item>,
}
