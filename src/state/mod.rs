//! State module for crawl jobs and crawled sites
//!
//! # Components
//!
//! - `JobStatus`: Lifecycle state of a queued crawl job
//! - `SiteStatus`: Status recorded for a domain in the site ledger

mod job_status;
mod site_status;

// Re-export main types
pub use job_status::JobStatus;
pub use site_status::SiteStatus;
