//! Output module for human-readable reports
//!
//! This module renders queue statistics, job listings and crawl summaries
//! for the command line.

pub mod stats;

pub use stats::{
    format_job_line, print_crawl_summary, print_jobs, print_statistics, render_crawl_summary,
    render_jobs, render_statistics,
};
