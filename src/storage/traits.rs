//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::config::JobSpec;
use crate::state::JobStatus;
use crate::storage::{
    DiscoveredFileRecord, JobOutcome, JobRecord, LeaseRecord, NewDiscoveredFile, QueueStats,
    SiteLedgerRecord,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Job {running} is already running")]
    AlreadyRunning { running: i64 },

    #[error("Cannot {action} job {id} while it is {status}")]
    InvalidStatus {
        id: i64,
        status: JobStatus,
        action: &'static str,
    },

    #[error("Queue position {position} out of range 1..={len}")]
    InvalidPosition { position: i64, len: i64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method that changes more than one row runs in a single
/// transaction, so readers never observe a torn queue.
pub trait Storage {
    // ===== Discovered Files =====

    /// Inserts a file unless its URL already exists
    ///
    /// # Returns
    ///
    /// `true` if a row was inserted, `false` for a duplicate
    fn insert_file(&mut self, file: &NewDiscoveredFile, now: DateTime<Utc>)
        -> StorageResult<bool>;

    /// Inserts a batch of files in their own transaction
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted (duplicates excluded)
    fn insert_files(
        &mut self,
        files: &[NewDiscoveredFile],
        now: DateTime<Utc>,
    ) -> StorageResult<usize>;

    /// Inserts a batch of files and upserts the ledger for each domain,
    /// all in one transaction
    ///
    /// # Arguments
    ///
    /// * `files` - Accepted candidates
    /// * `domains` - Distinct domains represented in the batch
    /// * `now` - Timestamp for the new rows and ledger updates
    ///
    /// # Returns
    ///
    /// The number of file rows actually inserted
    fn persist_batch(
        &mut self,
        files: &[NewDiscoveredFile],
        domains: &[String],
        now: DateTime<Utc>,
    ) -> StorageResult<usize>;

    /// Gets a discovered file by canonical URL
    fn get_file_by_url(&self, url: &str) -> StorageResult<Option<DiscoveredFileRecord>>;

    /// Gets files discovered by a job, oldest first
    fn get_files_for_job(&self, job_id: i64) -> StorageResult<Vec<DiscoveredFileRecord>>;

    /// Counts all discovered files
    fn count_files(&self) -> StorageResult<u64>;

    // ===== Site Ledger =====

    /// Creates the ledger entry or records another visit
    fn upsert_site(&mut self, domain: &str, now: DateTime<Utc>) -> StorageResult<()>;

    /// Records another visit to an existing ledger entry
    ///
    /// # Returns
    ///
    /// `true` if an entry was updated
    fn touch_site(&mut self, domain: &str, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Creates a ledger entry with a crawl count of one
    fn insert_site(&mut self, domain: &str, now: DateTime<Utc>) -> StorageResult<()>;

    /// Gets a ledger entry by domain
    fn get_site(&self, domain: &str) -> StorageResult<Option<SiteLedgerRecord>>;

    /// Counts ledger entries
    fn count_sites(&self) -> StorageResult<u64>;

    // ===== Job Management =====

    /// Inserts a job as `queued` at the tail, or `scheduled` with no
    /// position when `status` is `Scheduled`
    ///
    /// # Returns
    ///
    /// The ID of the newly created job
    fn insert_job(
        &mut self,
        spec: &JobSpec,
        status: JobStatus,
        now: DateTime<Utc>,
    ) -> StorageResult<i64>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord>;

    /// Lists jobs, optionally filtered by status
    ///
    /// Queued jobs come first in position order, then everything else by ID.
    fn list_jobs(&self, status: Option<JobStatus>) -> StorageResult<Vec<JobRecord>>;

    /// Gets the queued job with the lowest position
    fn next_queued_job(&self) -> StorageResult<Option<JobRecord>>;

    /// Promotes a job to `running`
    ///
    /// Fails if any job is already running or the job's status does not
    /// allow starting. Clears the job's position and reindexes the queue.
    fn claim_job(&mut self, job_id: i64, now: DateTime<Utc>) -> StorageResult<JobRecord>;

    /// Writes a terminal status onto a job that is still `running`
    ///
    /// # Returns
    ///
    /// `true` if the row was running and has been updated
    fn finish_job(
        &mut self,
        job_id: i64,
        status: JobStatus,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Moves a running job back to the tail of the queue
    ///
    /// # Returns
    ///
    /// The new queue position
    fn requeue_job(&mut self, job_id: i64, now: DateTime<Utc>) -> StorageResult<i64>;

    /// Moves `scheduled` jobs whose time has come to the tail of the queue,
    /// earliest schedule first
    ///
    /// # Returns
    ///
    /// The IDs of the released jobs
    fn release_scheduled(&mut self, now: DateTime<Utc>) -> StorageResult<Vec<i64>>;

    /// Deletes a job that is not running and reindexes the queue
    fn delete_job(&mut self, job_id: i64) -> StorageResult<()>;

    /// Moves a queued job to `position`, shifting the jobs in between
    fn move_job(&mut self, job_id: i64, position: i64, now: DateTime<Utc>) -> StorageResult<()>;

    /// Sets the autostart flag on every queued job
    ///
    /// # Returns
    ///
    /// The number of jobs updated
    fn set_queued_autostart(&mut self, enabled: bool, now: DateTime<Utc>) -> StorageResult<usize>;

    /// Records crawl progress on a running job
    fn update_job_progress(
        &mut self,
        job_id: i64,
        progress: u8,
        now: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Gets the positions of queued jobs in order
    fn queued_positions(&self) -> StorageResult<Vec<i64>>;

    /// Replaces a job's definition
    ///
    /// Running jobs cannot be edited. A future `scheduled_time` leaves the
    /// job `scheduled` with no position; anything else puts a scheduled job
    /// at the tail of the queue and keeps a queued job in its slot.
    /// Terminal jobs keep their status.
    fn update_job(
        &mut self,
        job_id: i64,
        spec: &JobSpec,
        now: DateTime<Utc>,
    ) -> StorageResult<JobRecord>;

    // ===== Worker Leases =====

    /// Grants a new lease on a job, replacing any lease it held
    ///
    /// # Returns
    ///
    /// The new lease token; tokens are never reused
    fn acquire_lease(&mut self, job_id: i64, owner: &str, now: DateTime<Utc>)
        -> StorageResult<i64>;

    /// Refreshes the heartbeat of a lease
    ///
    /// # Returns
    ///
    /// `false` if the lease has been revoked or replaced
    fn touch_lease(&mut self, job_id: i64, lease: i64, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Drops a job's lease; with `Some(lease)` only if that lease is current
    ///
    /// # Returns
    ///
    /// `true` if a lease row was removed
    fn release_lease(&mut self, job_id: i64, lease: Option<i64>) -> StorageResult<bool>;

    /// Gets the current lease on a job
    fn get_lease(&self, job_id: i64) -> StorageResult<Option<LeaseRecord>>;

    // ===== Statistics =====

    /// Counts jobs per status plus files and ledger entries
    fn queue_stats(&self) -> StorageResult<QueueStats>;
}
