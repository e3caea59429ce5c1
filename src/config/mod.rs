//! Configuration module for Manual-Scout
//!
//! This module handles loading, parsing, and validating the TOML files the
//! tool reads: the service configuration (crawler limits, user agent, queue,
//! search and output settings) and individual crawl job definitions.
//!
//! # Example
//!
//! ```no_run
//! use manual_scout::config::{load_config, load_job_spec};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scout.toml")).unwrap();
//! let job = load_job_spec(Path::new("jobs/honda-atv.toml")).unwrap();
//! println!("{} will crawl to depth {}", job.name, job.max_depth);
//! println!("Site workers: {}", config.crawler.max_site_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_exclude_terms, Config, CrawlerConfig, JobSpec, OutputConfig, QueueConfig,
    SearchConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_job_spec, parse_job_spec,
};
pub use validation::validate_job_spec;
