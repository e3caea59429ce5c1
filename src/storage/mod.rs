//! Storage module for persisting discoveries and crawl jobs
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Insert-if-absent of discovered files keyed by canonical URL
//! - The per-domain site ledger
//! - Crawl job rows, queue positions and lifecycle transitions
//! - Batched writes from crawlers (`BatchWriter`)

mod schema;
mod sqlite;
mod traits;
mod writer;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};
pub use writer::BatchWriter;

use crate::config::JobSpec;
use crate::state::{JobStatus, SiteStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared between the queue, its workers and the batch writers
///
/// The lock is only ever held for synchronous database calls, never across
/// an `.await`.
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing across tasks
pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, reporting a poisoned lock as a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Best-effort metadata inferred from a file's title and URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub equipment_type: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
}

/// A file accepted by the crawler, waiting to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewDiscoveredFile {
    /// Canonical URL (dedup key)
    pub url: String,
    /// Domain of the file URL, used for the site ledger
    pub domain: String,
    /// Page the file link was found on
    pub source_page: String,
    pub depth: u32,
    pub title: String,
    pub metadata: FileMetadata,
    pub job_id: Option<i64>,
}

/// Represents a discovered file in the database
#[derive(Debug, Clone)]
pub struct DiscoveredFileRecord {
    pub id: i64,
    pub url: String,
    pub domain: String,
    pub source_page: String,
    pub depth: u32,
    pub title: String,
    pub metadata: FileMetadata,
    pub job_id: Option<i64>,
    pub source_type: String,
    pub discovered_at: String,
}

/// Represents a site ledger entry in the database
#[derive(Debug, Clone)]
pub struct SiteLedgerRecord {
    pub domain: String,
    pub first_seen: String,
    pub last_crawled: String,
    pub crawl_count: u32,
    pub status: SiteStatus,
}

/// Represents a crawl job in the database
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub spec: JobSpec,
    pub status: JobStatus,
    /// Set iff status is `queued`
    pub queue_position: Option<i64>,
    pub progress: u8,
    pub error_message: Option<String>,
    pub result_summary: Option<String>,
    pub discovered_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Final result written onto a job row when its worker finishes
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub error_message: Option<String>,
    pub result_summary: Option<String>,
    pub discovered_count: u64,
}

/// A worker's claim on a running job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    pub lease: i64,
    pub job_id: i64,
    /// Free-form identity of the holding process, for diagnostics
    pub owner: String,
    pub heartbeat_at: DateTime<Utc>,
}

/// Aggregate counts across jobs, files and the site ledger
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub jobs_by_status: HashMap<JobStatus, u64>,
    pub discovered_files: u64,
    pub ledger_domains: u64,
}

impl QueueStats {
    pub fn count(&self, status: JobStatus) -> u64 {
        self.jobs_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn total_jobs(&self) -> u64 {
        self.jobs_by_status.values().sum()
    }
}

/// Kind tag for a list-valued job field in `job_terms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TermKind {
    Site,
    SearchTerm,
    ExcludeTerm,
    ExcludeSite,
    Extension,
}

impl TermKind {
    pub(crate) const ALL: [TermKind; 5] = [
        Self::Site,
        Self::SearchTerm,
        Self::ExcludeTerm,
        Self::ExcludeSite,
        Self::Extension,
    ];

    pub(crate) fn to_db_string(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::SearchTerm => "search_term",
            Self::ExcludeTerm => "exclude_term",
            Self::ExcludeSite => "exclude_site",
            Self::Extension => "extension",
        }
    }

    pub(crate) fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "site" => Some(Self::Site),
            "search_term" => Some(Self::SearchTerm),
            "exclude_term" => Some(Self::ExcludeTerm),
            "exclude_site" => Some(Self::ExcludeSite),
            "extension" => Some(Self::Extension),
            _ => None,
        }
    }

    /// The list on a job spec this kind maps to
    pub(crate) fn values(self, spec: &JobSpec) -> &[String] {
        match self {
            Self::Site => &spec.sites,
            Self::SearchTerm => &spec.search_terms,
            Self::ExcludeTerm => &spec.exclude_terms,
            Self::ExcludeSite => &spec.exclude_sites,
            Self::Extension => &spec.file_extensions,
        }
    }

    pub(crate) fn values_mut(self, spec: &mut JobSpec) -> &mut Vec<String> {
        match self {
            Self::Site => &mut spec.sites,
            Self::SearchTerm => &mut spec.search_terms,
            Self::ExcludeTerm => &mut spec.exclude_terms,
            Self::ExcludeSite => &mut spec.exclude_sites,
            Self::Extension => &mut spec.file_extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_kind_roundtrip() {
        for kind in TermKind::ALL {
            assert_eq!(TermKind::from_db_string(kind.to_db_string()), Some(kind));
        }
        assert_eq!(TermKind::from_db_string("unknown"), None);
    }

    #[test]
    fn test_term_kind_maps_spec_lists() {
        let mut spec = JobSpec::new("job");
        TermKind::ExcludeSite
            .values_mut(&mut spec)
            .push("ebay".to_string());
        assert_eq!(TermKind::ExcludeSite.values(&spec), &["ebay".to_string()]);
        assert_eq!(TermKind::Extension.values(&spec), &["pdf".to_string()]);
    }

    #[test]
    fn test_queue_stats_counts() {
        let mut stats = QueueStats::default();
        stats.jobs_by_status.insert(JobStatus::Queued, 3);
        stats.jobs_by_status.insert(JobStatus::Failed, 1);
        assert_eq!(stats.count(JobStatus::Queued), 3);
        assert_eq!(stats.count(JobStatus::Running), 0);
        assert_eq!(stats.total_jobs(), 4);
    }
}
