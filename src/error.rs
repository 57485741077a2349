//! Unified error handling for the newsfan crate
//!
//! Domain-specific errors live next to the code that raises them
//! ([`crate::utils::error`]); this module folds them into one [`Error`] enum
//! for callers that cross module boundaries, such as the binary and the
//! configuration loader.
//!
//! # Usage
//!
//! ```rust,ignore
//! use newsfan::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying: {err}");
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::utils::error::{FetchError, PipelineError, PoolError, SourceError};

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, status codes)
    Network,
    /// Feed parsing errors
    Parsing,
    /// Pipeline lifecycle errors (stopped pool, shut down aggregator)
    Pipeline,
    /// Caller-initiated cancellation
    Cancelled,
    /// Configuration and validation errors
    Config,
    /// I/O errors
    Storage,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Human readable description of the category
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Parsing => "parsing error",
            Self::Pipeline => "pipeline error",
            Self::Cancelled => "cancelled",
            Self::Config => "configuration error",
            Self::Storage => "storage error",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the newsfan crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Per-source fetch errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Worker pool errors
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// Aggregator errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Source(e) => e.error.is_recoverable(),
            Self::Pool(_) | Self::Pipeline(_) => false,
            Self::Io(_) => true,
            Self::Json(_) | Self::Config(_) | Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        let fetch = match self {
            Self::Fetch(e) => e,
            Self::Source(e) => &e.error,
            Self::Pool(_) | Self::Pipeline(_) => return ErrorCategory::Pipeline,
            Self::Io(_) => return ErrorCategory::Storage,
            Self::Json(_) => return ErrorCategory::Parsing,
            Self::Config(_) => return ErrorCategory::Config,
            Self::Other { .. } => return ErrorCategory::Other,
        };

        match fetch {
            FetchError::Cancelled => ErrorCategory::Cancelled,
            FetchError::Parse(_) => ErrorCategory::Parsing,
            FetchError::InvalidUrl(_) => ErrorCategory::Config,
            FetchError::TaskPanicked => ErrorCategory::Other,
            _ => ErrorCategory::Network,
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
