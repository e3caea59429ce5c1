//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with per-URL error classification
//! - HTML parsing and link extraction
//! - Metadata inference for discovered files
//! - Depth-bounded traversal of one seed site
//! - Multi-site coordination on a bounded worker pool

mod coordinator;
mod fetcher;
mod metadata;
mod parser;
mod site;

pub use coordinator::{Coordinator, CrawlPlan, CrawlSummary};
pub use fetcher::{build_http_client, fetch_page, FetchError, FetchedPage};
pub use metadata::{candidate_title, infer_metadata};
pub use parser::{extract_links, ExtractedLinks, FileLink, DIRECTORY_THRESHOLD};
pub use site::{CrawlContext, CrawlLimits, NeverStop, SiteCrawler, SiteReport, StopSignal};

use crate::config::{Config, JobSpec};
use crate::storage::SharedStorage;
use std::sync::Arc;

/// Runs a complete crawl of one job definition outside the queue
///
/// This is the entry point for one-off crawls. It will:
/// 1. Build the HTTP client, search provider and size probe
/// 2. Resolve the seed sites
/// 3. Crawl every site and persist accepted files
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `spec` - The job definition to crawl
/// * `storage` - Store receiving discoveries
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Crawl completed
/// * `Err(ScoutError)` - Crawl could not start or had no seeds
pub async fn crawl(
    config: &Config,
    spec: &JobSpec,
    storage: SharedStorage,
) -> crate::Result<CrawlSummary> {
    let coordinator = Coordinator::new(config, storage)?;
    let plan = CrawlPlan::from_job(None, spec, &config.crawler);
    coordinator.run(plan, Arc::new(NeverStop)).await
}
