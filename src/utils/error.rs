//! Error types for the feed pipeline
//!
//! This module defines the per-source and per-component error types used
//! throughout the fetch, worker and dispatch layers.

use thiserror::Error;

/// Errors that can occur while fetching a single source
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// The fetch did not finish within its deadline
    #[error("Request timeout")]
    Timeout,

    /// The caller gave up on the fetch
    #[error("Fetch cancelled")]
    Cancelled,

    /// Feed document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid locator
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The fetch task panicked before reporting an outcome
    #[error("Fetch task panicked")]
    TaskPanicked,
}

impl FetchError {
    /// True when the fetch was abandoned by the caller rather than failing
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if the same fetch could succeed when tried again
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout => true,
            Self::ServerError(status) => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Cancelled | Self::Parse(_) | Self::InvalidUrl(_) | Self::TaskPanicked => false,
        }
    }

    /// Short, stable label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::ServerError(_) => "status",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Parse(_) => "parse",
            Self::InvalidUrl(_) => "invalid_url",
            Self::TaskPanicked => "panicked",
        }
    }
}

/// A fetch failure tagged with the locator that produced it
#[derive(Error, Debug)]
#[error("{locator}: {error}")]
pub struct SourceError {
    /// Locator of the failed source
    pub locator: String,

    /// Underlying fetch error
    #[source]
    pub error: FetchError,
}

impl SourceError {
    /// Tag a fetch error with its locator
    pub fn new(locator: impl Into<String>, error: FetchError) -> Self {
        Self {
            locator: locator.into(),
            error,
        }
    }
}

/// Errors raised by the worker pool
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been stopped and accepts no more jobs
    #[error("Worker pool stopped")]
    Stopped,

    /// A pool needs at least one worker
    #[error("Worker pool needs at least one worker")]
    NoWorkers,
}

/// Errors raised by the aggregator's public entry points
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineError {
    /// The aggregator has been shut down
    #[error("Aggregator is shut down")]
    ShutDown,

    /// Worker pool error
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
}
