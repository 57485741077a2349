//! Configuration management for the feed aggregator
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Feeds to aggregate
    pub feeds: FeedsConfig,

    /// Worker pool and scatter/gather settings
    pub pipeline: PipelineConfig,

    /// HTTP fetcher settings
    pub fetcher: FetcherConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Feed list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    /// Feed URLs submitted at startup and fetched by `/sync`
    pub urls: Vec<String>,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of pool workers
    pub workers: usize,

    /// Capacity of the worker pool's job queue
    pub queue_capacity: usize,

    /// Capacity of the dispatch loop's submission inbox
    pub submit_buffer: usize,

    /// Per-job deadline inside the worker pool, in seconds
    pub job_timeout_secs: u64,

    /// Overall deadline of a synchronous fetch-all, in seconds
    pub sync_timeout_secs: u64,
}

/// HTTP fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// User agent string
    pub user_agent: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Rate limit (requests per second)
    pub requests_per_second: u32,

    /// Maximum retries for retryable responses
    pub max_retries: u32,

    /// Base delay of the exponential backoff, in milliseconds
    pub retry_base_delay_ms: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0:8080`
    pub bind_address: String,

    /// Default item count for `/articles`
    pub default_count: usize,

    /// Enable permissive CORS
    pub enable_cors: bool,

    /// Trace every HTTP request
    pub enable_request_logging: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            urls: vec![
                String::from("https://rss.nytimes.com/services/xml/rss/nyt/World.xml"),
                String::from("https://feeds.bbci.co.uk/news/rss.xml"),
            ],
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 100,
            submit_buffer: 5,
            job_timeout_secs: 30,
            sync_timeout_secs: 30,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("newsfan/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            requests_per_second: 10,
            max_retries: 2,
            retry_base_delay_ms: 500,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:8080"),
            default_count: 10,
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise defaults; environment overrides both
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Override fields from `NEWSFAN_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(feeds) = std::env::var("NEWSFAN_FEEDS") {
            self.feeds.urls = feeds
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = env_parse("NEWSFAN_WORKERS") {
            self.pipeline.workers = v;
        }
        if let Some(v) = env_parse("NEWSFAN_QUEUE_CAPACITY") {
            self.pipeline.queue_capacity = v;
        }
        if let Some(v) = env_parse("NEWSFAN_JOB_TIMEOUT") {
            self.pipeline.job_timeout_secs = v;
        }
        if let Some(v) = env_parse("NEWSFAN_SYNC_TIMEOUT") {
            self.pipeline.sync_timeout_secs = v;
        }
        if let Some(v) = env_parse("NEWSFAN_REQUEST_TIMEOUT") {
            self.fetcher.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("NEWSFAN_RATE_LIMIT") {
            self.fetcher.requests_per_second = v;
        }
        if let Ok(v) = std::env::var("NEWSFAN_USER_AGENT") {
            self.fetcher.user_agent = v;
        }
        if let Ok(v) = std::env::var("NEWSFAN_BIND") {
            self.server.bind_address = v;
        }
        if let Ok(v) = std::env::var("NEWSFAN_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("NEWSFAN_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.pipeline.workers == 0 {
            return Err(Error::config("workers must be greater than 0"));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be greater than 0"));
        }

        if self.pipeline.submit_buffer == 0 {
            return Err(Error::config("submit_buffer must be greater than 0"));
        }

        if self.pipeline.job_timeout_secs == 0 || self.pipeline.sync_timeout_secs == 0 {
            return Err(Error::config("timeouts must be greater than 0"));
        }

        if self.fetcher.request_timeout_secs == 0 {
            return Err(Error::config("request_timeout_secs must be greater than 0"));
        }

        if self.fetcher.requests_per_second == 0 {
            return Err(Error::config("requests_per_second must be greater than 0"));
        }

        self.bind_address().map_err(|e| Error::config(format!("{e:#}")))?;

        Ok(())
    }

    /// Per-job deadline inside the worker pool
    #[must_use]
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.job_timeout_secs)
    }

    /// Overall deadline for a synchronous fetch-all
    #[must_use]
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.sync_timeout_secs)
    }

    /// Parsed server bind address
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))
    }
}

impl FetcherConfig {
    /// Request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
