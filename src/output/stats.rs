//! Statistics and job listings from the queue database
//!
//! Rendering functions return strings so they can be tested; the `print_*`
//! wrappers write them to stdout.

use crate::crawler::CrawlSummary;
use crate::state::JobStatus;
use crate::storage::{JobRecord, QueueStats};
use std::fmt::Write;

/// Renders queue statistics
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn render_statistics(stats: &QueueStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Queue Statistics ===\n");

    let _ = writeln!(out, "Jobs by Status:");
    for status in JobStatus::all_statuses() {
        let count = stats.count(status);
        let percentage = if stats.total_jobs() > 0 {
            (count as f64 / stats.total_jobs() as f64) * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  {}: {} ({:.1}%)", status, count, percentage);
    }
    let _ = writeln!(out, "  total: {}", stats.total_jobs());
    let _ = writeln!(out);

    let _ = writeln!(out, "Discoveries:");
    let _ = writeln!(out, "  Discovered files: {}", stats.discovered_files);
    let _ = writeln!(out, "  Sites in ledger: {}", stats.ledger_domains);

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &QueueStats) {
    print!("{}", render_statistics(stats));
}

/// One line describing a job
pub fn format_job_line(job: &JobRecord) -> String {
    let position = job
        .queue_position
        .map(|p| format!("#{}", p))
        .unwrap_or_else(|| "-".to_string());

    let mut line = format!(
        "{:>4}  {:<9}  {:>4}  {:>3}%  {}",
        job.id,
        job.status.to_db_string(),
        position,
        job.progress,
        job.spec.name
    );

    if job.spec.autostart {
        line.push_str("  [autostart]");
    }
    if job.status == JobStatus::Scheduled {
        if let Some(at) = job.spec.scheduled_time {
            let _ = write!(line, "  (at {})", at.format("%Y-%m-%d %H:%M UTC"));
        }
    }
    if job.discovered_count > 0 {
        let _ = write!(line, "  {} files", job.discovered_count);
    }
    if let Some(error) = &job.error_message {
        let _ = write!(line, "  error: {}", error);
    }
    line
}

/// Renders a job table
pub fn render_jobs(jobs: &[JobRecord]) -> String {
    if jobs.is_empty() {
        return "No jobs.\n".to_string();
    }

    let mut out = format!(
        "{:>4}  {:<9}  {:>4}  {:>4}  {}\n",
        "ID", "STATUS", "POS", "PROG", "NAME"
    );
    for job in jobs {
        out.push_str(&format_job_line(job));
        out.push('\n');
    }
    out
}

pub fn print_jobs(jobs: &[JobRecord]) {
    print!("{}", render_jobs(jobs));
}

/// Renders a per-site crawl summary
pub fn render_crawl_summary(summary: &CrawlSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Crawl Summary ===\n");
    for report in &summary.reports {
        match &report.error {
            Some(error) => {
                let _ = writeln!(out, "  ✗ {}: {}", report.seed, error);
            }
            None => {
                let _ = writeln!(
                    out,
                    "  ✓ {}: {} pages, {} accepted, {} new{}",
                    report.seed,
                    report.pages_fetched,
                    report.emitted,
                    report.persisted,
                    if report.directories > 0 {
                        format!(", {} directories", report.directories)
                    } else {
                        String::new()
                    }
                );
            }
        }
    }
    let _ = writeln!(out, "\n{}", summary.describe());
    out
}

pub fn print_crawl_summary(summary: &CrawlSummary) {
    print!("{}", render_crawl_summary(summary));
}
