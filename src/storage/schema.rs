//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Manual-Scout database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Candidate files accepted by the crawler; url is the dedup key.
-- job_id is lineage only: deleting a job never deletes its files.
CREATE TABLE IF NOT EXISTS discovered_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    domain TEXT NOT NULL,
    source_page TEXT NOT NULL,
    depth INTEGER NOT NULL,
    title TEXT NOT NULL,
    equipment_type TEXT,
    manufacturer TEXT,
    model TEXT,
    year INTEGER,
    job_id INTEGER,
    source_type TEXT NOT NULL DEFAULT 'multi_site',
    discovered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_discovered_files_job ON discovered_files(job_id);
CREATE INDEX IF NOT EXISTS idx_discovered_files_domain ON discovered_files(domain);

-- One row per crawled domain
CREATE TABLE IF NOT EXISTS site_ledger (
    domain TEXT PRIMARY KEY,
    first_seen TEXT NOT NULL,
    last_crawled TEXT NOT NULL,
    crawl_count INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'active'
);

-- Crawl jobs and their queue slot
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    query TEXT,
    min_file_size_mb REAL,
    max_file_size_mb REAL,
    min_pages INTEGER,
    max_pages INTEGER,
    max_depth INTEGER NOT NULL,
    follow_links INTEGER NOT NULL,
    autostart_enabled INTEGER NOT NULL DEFAULT 0,
    scheduled_time TEXT,
    queue_position INTEGER,
    status TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    result_summary TEXT,
    discovered_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_status ON crawl_jobs(status);
CREATE INDEX IF NOT EXISTS idx_crawl_jobs_position ON crawl_jobs(queue_position);

-- At most one running row
CREATE UNIQUE INDEX IF NOT EXISTS idx_crawl_jobs_single_running
    ON crawl_jobs(status) WHERE status = 'running';

-- Ordered list-valued job fields (sites, terms, extensions)
CREATE TABLE IF NOT EXISTS job_terms (
    job_id INTEGER NOT NULL REFERENCES crawl_jobs(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (job_id, kind, ordinal)
);

-- Worker leases on running jobs, shared by every process using the file.
-- AUTOINCREMENT keeps lease tokens from being reused after a revoke.
CREATE TABLE IF NOT EXISTS job_leases (
    lease INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL UNIQUE REFERENCES crawl_jobs(id) ON DELETE CASCADE,
    owner TEXT NOT NULL,
    heartbeat_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
