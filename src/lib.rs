//! Manual-Scout: a PDF manual discovery crawler
//!
//! This crate crawls equipment-manual sites for PDF files, filters candidates
//! by extension, terms, site and size, persists discoveries with a per-domain
//! ledger, and runs crawl jobs from a single-flight persisted queue.

pub mod config;
pub mod crawler;
pub mod filter;
pub mod output;
pub mod queue;
pub mod search;
pub mod sink;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Manual-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Search error: {0}")]
    Search(#[from] search::SearchError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("No usable seed sites (search query: '{query}')")]
    NoSeedSites { query: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid site pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Manual-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, JobSpec};
pub use crawler::{Coordinator, CrawlPlan, CrawlSummary};
pub use filter::FilterRules;
pub use queue::{InMemoryLiveness, JobQueue, LivenessRegistry, StoreLiveness};
pub use state::{JobStatus, SiteStatus};
pub use storage::{SqliteStorage, Storage};
pub use crate::url::{canonicalize_url, extract_domain};
