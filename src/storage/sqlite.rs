//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::config::JobSpec;
use crate::state::{JobStatus, SiteStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    DiscoveredFileRecord, FileMetadata, JobOutcome, JobRecord, LeaseRecord, NewDiscoveredFile,
    QueueStats, SiteLedgerRecord, TermKind,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const JOB_COLUMNS: &str = "id, name, query, min_file_size_mb, max_file_size_mb, min_pages,
     max_pages, max_depth, follow_links, autostart_enabled, scheduled_time, queue_position,
     status, progress, error_message, result_summary, discovered_count, created_at,
     updated_at, started_at, completed_at";

const FILE_COLUMNS: &str = "id, url, domain, source_page, depth, title, equipment_type,
     manufacturer, model, year, job_id, source_type, discovered_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Storage for SqliteStorage {
    // ===== Discovered Files =====

    fn insert_file(
        &mut self,
        file: &NewDiscoveredFile,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        Ok(insert_file_row(&self.conn, file, now)?)
    }

    fn insert_files(
        &mut self,
        files: &[NewDiscoveredFile],
        now: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for file in files {
            if insert_file_row(&tx, file, now)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn persist_batch(
        &mut self,
        files: &[NewDiscoveredFile],
        domains: &[String],
        now: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for file in files {
            if insert_file_row(&tx, file, now)? {
                inserted += 1;
            }
        }
        for domain in domains {
            upsert_site_row(&tx, domain, now)?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn get_file_by_url(&self, url: &str) -> StorageResult<Option<DiscoveredFileRecord>> {
        let sql = format!("SELECT {} FROM discovered_files WHERE url = ?1", FILE_COLUMNS);
        let file = self
            .conn
            .query_row(&sql, params![url], map_file_row)
            .optional()?;
        Ok(file)
    }

    fn get_files_for_job(&self, job_id: i64) -> StorageResult<Vec<DiscoveredFileRecord>> {
        let sql = format!(
            "SELECT {} FROM discovered_files WHERE job_id = ?1 ORDER BY id",
            FILE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let files = stmt
            .query_map(params![job_id], map_file_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    fn count_files(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM discovered_files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Site Ledger =====

    fn upsert_site(&mut self, domain: &str, now: DateTime<Utc>) -> StorageResult<()> {
        upsert_site_row(&self.conn, domain, now)?;
        Ok(())
    }

    fn touch_site(&mut self, domain: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE site_ledger SET last_crawled = ?1, crawl_count = crawl_count + 1
             WHERE domain = ?2",
            params![db_time(now), domain],
        )?;
        Ok(changed > 0)
    }

    fn insert_site(&mut self, domain: &str, now: DateTime<Utc>) -> StorageResult<()> {
        let now = db_time(now);
        self.conn.execute(
            "INSERT INTO site_ledger (domain, first_seen, last_crawled, crawl_count, status)
             VALUES (?1, ?2, ?2, 1, ?3)",
            params![domain, now, SiteStatus::Active.to_db_string()],
        )?;
        Ok(())
    }

    fn get_site(&self, domain: &str) -> StorageResult<Option<SiteLedgerRecord>> {
        let site = self
            .conn
            .query_row(
                "SELECT domain, first_seen, last_crawled, crawl_count, status
                 FROM site_ledger WHERE domain = ?1",
                params![domain],
                |row| {
                    Ok(SiteLedgerRecord {
                        domain: row.get(0)?,
                        first_seen: row.get(1)?,
                        last_crawled: row.get(2)?,
                        crawl_count: row.get(3)?,
                        status: SiteStatus::from_db_string(&row.get::<_, String>(4)?)
                            .unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(site)
    }

    fn count_sites(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM site_ledger", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Job Management =====

    fn insert_job(
        &mut self,
        spec: &JobSpec,
        status: JobStatus,
        now: DateTime<Utc>,
    ) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;
        let position = match status {
            JobStatus::Queued => Some(next_position(&tx)?),
            JobStatus::Scheduled => None,
            other => {
                return Err(StorageError::InvalidStatus {
                    id: 0,
                    status: other,
                    action: "submit",
                })
            }
        };
        let now = db_time(now);

        tx.execute(
            "INSERT INTO crawl_jobs (name, query, min_file_size_mb, max_file_size_mb, min_pages,
             max_pages, max_depth, follow_links, autostart_enabled, scheduled_time,
             queue_position, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                spec.name,
                spec.query,
                spec.min_file_size_mb,
                spec.max_file_size_mb,
                spec.min_pages,
                spec.max_pages,
                spec.max_depth,
                spec.follow_links,
                spec.autostart,
                spec.scheduled_time.map(db_time),
                position,
                status.to_db_string(),
                now,
            ],
        )?;
        let job_id = tx.last_insert_rowid();
        write_terms(&tx, job_id, spec)?;
        tx.commit()?;

        Ok(job_id)
    }

    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord> {
        load_job(&self.conn, job_id)
    }

    fn list_jobs(&self, status: Option<JobStatus>) -> StorageResult<Vec<JobRecord>> {
        let order = "ORDER BY CASE WHEN status = 'queued' THEN 0 ELSE 1 END,
                     queue_position, id";
        let ids: Vec<i64> = match status {
            Some(status) => {
                let sql = format!("SELECT id FROM crawl_jobs WHERE status = ?1 {}", order);
                let mut stmt = self.conn.prepare(&sql)?;
                let ids = stmt
                    .query_map(params![status.to_db_string()], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
            None => {
                let sql = format!("SELECT id FROM crawl_jobs {}", order);
                let mut stmt = self.conn.prepare(&sql)?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                ids
            }
        };

        ids.into_iter().map(|id| load_job(&self.conn, id)).collect()
    }

    fn next_queued_job(&self) -> StorageResult<Option<JobRecord>> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM crawl_jobs WHERE status = 'queued'
                 ORDER BY queue_position, id LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        id.map(|id| load_job(&self.conn, id)).transpose()
    }

    fn claim_job(&mut self, job_id: i64, now: DateTime<Utc>) -> StorageResult<JobRecord> {
        let tx = self.conn.transaction()?;

        let job = load_job(&tx, job_id)?;

        let running: Option<i64> = tx
            .query_row(
                "SELECT id FROM crawl_jobs WHERE status = 'running' LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(running) = running {
            return Err(StorageError::AlreadyRunning { running });
        }

        if !job.status.can_start() {
            return Err(StorageError::InvalidStatus {
                id: job_id,
                status: job.status,
                action: "start",
            });
        }

        let now = db_time(now);
        tx.execute(
            "UPDATE crawl_jobs SET status = 'running', queue_position = NULL, progress = 0,
             error_message = NULL, result_summary = NULL, discovered_count = 0,
             started_at = ?1, completed_at = NULL, updated_at = ?1
             WHERE id = ?2",
            params![now, job_id],
        )?;
        reindex_queue(&tx)?;

        let job = load_job(&tx, job_id)?;
        tx.commit()?;

        Ok(job)
    }

    fn finish_job(
        &mut self,
        job_id: i64,
        status: JobStatus,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        if !status.is_terminal() {
            return Err(StorageError::InvalidStatus {
                id: job_id,
                status,
                action: "finish",
            });
        }

        let now = db_time(now);
        let changed = self.conn.execute(
            "UPDATE crawl_jobs SET status = ?1,
             progress = CASE WHEN ?1 = 'completed' THEN 100 ELSE progress END,
             error_message = ?2, result_summary = ?3, discovered_count = ?4,
             completed_at = ?5, updated_at = ?5, queue_position = NULL
             WHERE id = ?6 AND status = 'running'",
            params![
                status.to_db_string(),
                outcome.error_message,
                outcome.result_summary,
                outcome.discovered_count as i64,
                now,
                job_id,
            ],
        )?;

        Ok(changed > 0)
    }

    fn requeue_job(&mut self, job_id: i64, now: DateTime<Utc>) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;

        let job = load_job(&tx, job_id)?;
        if job.status != JobStatus::Running {
            return Err(StorageError::InvalidStatus {
                id: job_id,
                status: job.status,
                action: "stop",
            });
        }

        let position = next_position(&tx)?;
        tx.execute(
            "UPDATE crawl_jobs SET status = 'queued', queue_position = ?1, progress = 0,
             started_at = NULL, updated_at = ?2
             WHERE id = ?3",
            params![position, db_time(now), job_id],
        )?;
        reindex_queue(&tx)?;

        let position: i64 = tx.query_row(
            "SELECT queue_position FROM crawl_jobs WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        Ok(position)
    }

    fn release_scheduled(&mut self, now: DateTime<Utc>) -> StorageResult<Vec<i64>> {
        let tx = self.conn.transaction()?;

        let mut due: Vec<(Option<DateTime<Utc>>, i64)> = {
            let mut stmt = tx.prepare(
                "SELECT id, scheduled_time FROM crawl_jobs WHERE status = 'scheduled'",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let id: i64 = row.get(0)?;
                    let scheduled: Option<String> = row.get(1)?;
                    let scheduled = scheduled.map(|s| parse_time(1, &s)).transpose()?;
                    Ok((scheduled, id))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        due.retain(|(scheduled, _)| scheduled.map(|t| t <= now).unwrap_or(true));
        due.sort();

        let now = db_time(now);
        let mut released = Vec::with_capacity(due.len());
        for (_, job_id) in due {
            let position = next_position(&tx)?;
            tx.execute(
                "UPDATE crawl_jobs SET status = 'queued', queue_position = ?1, updated_at = ?2
                 WHERE id = ?3",
                params![position, now, job_id],
            )?;
            released.push(job_id);
        }

        tx.commit()?;
        Ok(released)
    }

    fn delete_job(&mut self, job_id: i64) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        let job = load_job(&tx, job_id)?;
        if job.status == JobStatus::Running {
            return Err(StorageError::InvalidStatus {
                id: job_id,
                status: job.status,
                action: "delete",
            });
        }

        tx.execute("DELETE FROM job_terms WHERE job_id = ?1", params![job_id])?;
        tx.execute("DELETE FROM crawl_jobs WHERE id = ?1", params![job_id])?;
        reindex_queue(&tx)?;

        tx.commit()?;
        Ok(())
    }

    fn move_job(&mut self, job_id: i64, position: i64, now: DateTime<Utc>) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        let job = load_job(&tx, job_id)?;
        if job.status != JobStatus::Queued {
            return Err(StorageError::InvalidStatus {
                id: job_id,
                status: job.status,
                action: "move",
            });
        }

        reindex_queue(&tx)?;
        let len: i64 = tx.query_row(
            "SELECT COUNT(*) FROM crawl_jobs WHERE status = 'queued'",
            [],
            |row| row.get(0),
        )?;
        if position < 1 || position > len {
            return Err(StorageError::InvalidPosition { position, len });
        }

        let current: i64 = tx.query_row(
            "SELECT queue_position FROM crawl_jobs WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;

        if position < current {
            tx.execute(
                "UPDATE crawl_jobs SET queue_position = queue_position + 1
                 WHERE status = 'queued' AND queue_position >= ?1 AND queue_position < ?2",
                params![position, current],
            )?;
        } else if position > current {
            tx.execute(
                "UPDATE crawl_jobs SET queue_position = queue_position - 1
                 WHERE status = 'queued' AND queue_position > ?1 AND queue_position <= ?2",
                params![current, position],
            )?;
        }

        tx.execute(
            "UPDATE crawl_jobs SET queue_position = ?1, updated_at = ?2 WHERE id = ?3",
            params![position, db_time(now), job_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn set_queued_autostart(&mut self, enabled: bool, now: DateTime<Utc>) -> StorageResult<usize> {
        let changed = self.conn.execute(
            "UPDATE crawl_jobs SET autostart_enabled = ?1, updated_at = ?2
             WHERE status = 'queued'",
            params![enabled, db_time(now)],
        )?;
        Ok(changed)
    }

    fn update_job_progress(
        &mut self,
        job_id: i64,
        progress: u8,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE crawl_jobs SET progress = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'running'",
            params![progress.min(100), db_time(now), job_id],
        )?;
        Ok(())
    }

    fn queued_positions(&self) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT queue_position FROM crawl_jobs WHERE status = 'queued'
             ORDER BY queue_position, id",
        )?;
        let positions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(positions)
    }

    fn update_job(
        &mut self,
        job_id: i64,
        spec: &JobSpec,
        now: DateTime<Utc>,
    ) -> StorageResult<JobRecord> {
        let tx = self.conn.transaction()?;

        let job = load_job(&tx, job_id)?;
        if job.status == JobStatus::Running {
            return Err(StorageError::InvalidStatus {
                id: job_id,
                status: job.status,
                action: "update",
            });
        }

        let rescheduled = job.spec.scheduled_time.map(db_time) != spec.scheduled_time.map(db_time);
        let (status, position) = if !rescheduled {
            (job.status, job.queue_position)
        } else {
            match spec.scheduled_time {
                Some(at) if at > now => (JobStatus::Scheduled, None),
                _ if job.status == JobStatus::Queued => (JobStatus::Queued, job.queue_position),
                _ => (JobStatus::Queued, Some(next_position(&tx)?)),
            }
        };

        tx.execute(
            "UPDATE crawl_jobs SET name = ?1, query = ?2, min_file_size_mb = ?3,
             max_file_size_mb = ?4, min_pages = ?5, max_pages = ?6, max_depth = ?7,
             follow_links = ?8, autostart_enabled = ?9, scheduled_time = ?10,
             queue_position = ?11, status = ?12, updated_at = ?13
             WHERE id = ?14",
            params![
                spec.name,
                spec.query,
                spec.min_file_size_mb,
                spec.max_file_size_mb,
                spec.min_pages,
                spec.max_pages,
                spec.max_depth,
                spec.follow_links,
                spec.autostart,
                spec.scheduled_time.map(db_time),
                position,
                status.to_db_string(),
                db_time(now),
                job_id,
            ],
        )?;
        tx.execute("DELETE FROM job_terms WHERE job_id = ?1", params![job_id])?;
        write_terms(&tx, job_id, spec)?;
        reindex_queue(&tx)?;

        let job = load_job(&tx, job_id)?;
        tx.commit()?;

        Ok(job)
    }

    // ===== Worker Leases =====

    fn acquire_lease(
        &mut self,
        job_id: i64,
        owner: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM job_leases WHERE job_id = ?1", params![job_id])?;
        tx.execute(
            "INSERT INTO job_leases (job_id, owner, heartbeat_at) VALUES (?1, ?2, ?3)",
            params![job_id, owner, db_time(now)],
        )?;
        let lease = tx.last_insert_rowid();
        tx.commit()?;
        Ok(lease)
    }

    fn touch_lease(&mut self, job_id: i64, lease: i64, now: DateTime<Utc>) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE job_leases SET heartbeat_at = ?1 WHERE job_id = ?2 AND lease = ?3",
            params![db_time(now), job_id, lease],
        )?;
        Ok(changed > 0)
    }

    fn release_lease(&mut self, job_id: i64, lease: Option<i64>) -> StorageResult<bool> {
        let changed = match lease {
            Some(lease) => self.conn.execute(
                "DELETE FROM job_leases WHERE job_id = ?1 AND lease = ?2",
                params![job_id, lease],
            )?,
            None => self
                .conn
                .execute("DELETE FROM job_leases WHERE job_id = ?1", params![job_id])?,
        };
        Ok(changed > 0)
    }

    fn get_lease(&self, job_id: i64) -> StorageResult<Option<LeaseRecord>> {
        let lease = self
            .conn
            .query_row(
                "SELECT lease, job_id, owner, heartbeat_at FROM job_leases WHERE job_id = ?1",
                params![job_id],
                |row| {
                    Ok(LeaseRecord {
                        lease: row.get(0)?,
                        job_id: row.get(1)?,
                        owner: row.get(2)?,
                        heartbeat_at: parse_time(3, &row.get::<_, String>(3)?)?,
                    })
                },
            )
            .optional()?;
        Ok(lease)
    }

    // ===== Statistics =====

    fn queue_stats(&self) -> StorageResult<QueueStats> {
        let mut stats = QueueStats::default();

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM crawl_jobs GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = JobStatus::from_db_string(&status_str) {
                stats.jobs_by_status.insert(status, count as u64);
            }
        }

        stats.discovered_files = self.count_files()?;
        stats.ledger_domains = self.count_sites()?;

        Ok(stats)
    }
}

/// Formats a timestamp for storage; fixed width so text order is time order
fn db_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_time(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_time(idx, &v)).transpose()
}

fn insert_file_row(
    conn: &Connection,
    file: &NewDiscoveredFile,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO discovered_files (url, domain, source_page, depth, title,
         equipment_type, manufacturer, model, year, job_id, source_type, discovered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'multi_site', ?11)",
        params![
            file.url,
            file.domain,
            file.source_page,
            file.depth,
            file.title,
            file.metadata.equipment_type,
            file.metadata.manufacturer,
            file.metadata.model,
            file.metadata.year,
            file.job_id,
            db_time(now),
        ],
    )?;
    Ok(changed > 0)
}

fn upsert_site_row(conn: &Connection, domain: &str, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO site_ledger (domain, first_seen, last_crawled, crawl_count, status)
         VALUES (?1, ?2, ?2, 1, 'active')
         ON CONFLICT(domain) DO UPDATE SET
             last_crawled = excluded.last_crawled,
             crawl_count = crawl_count + 1",
        params![domain, db_time(now)],
    )?;
    Ok(())
}

fn map_file_row(row: &Row<'_>) -> rusqlite::Result<DiscoveredFileRecord> {
    Ok(DiscoveredFileRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        domain: row.get(2)?,
        source_page: row.get(3)?,
        depth: row.get(4)?,
        title: row.get(5)?,
        metadata: FileMetadata {
            equipment_type: row.get(6)?,
            manufacturer: row.get(7)?,
            model: row.get(8)?,
            year: row.get(9)?,
        },
        job_id: row.get(10)?,
        source_type: row.get(11)?,
        discovered_at: row.get(12)?,
    })
}

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let status_str: String = row.get(12)?;
    let status = JobStatus::from_db_string(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            Type::Text,
            format!("unknown job status '{}'", status_str).into(),
        )
    })?;

    let spec = JobSpec {
        name: row.get(1)?,
        query: row.get(2)?,
        sites: Vec::new(),
        search_terms: Vec::new(),
        exclude_terms: Vec::new(),
        exclude_sites: Vec::new(),
        file_extensions: Vec::new(),
        min_file_size_mb: row.get(3)?,
        max_file_size_mb: row.get(4)?,
        min_pages: row.get(5)?,
        max_pages: row.get(6)?,
        max_depth: row.get(7)?,
        follow_links: row.get(8)?,
        autostart: row.get(9)?,
        scheduled_time: parse_optional_time(10, row.get(10)?)?,
    };

    Ok(JobRecord {
        id: row.get(0)?,
        spec,
        status,
        queue_position: row.get(11)?,
        progress: row.get(13)?,
        error_message: row.get(14)?,
        result_summary: row.get(15)?,
        discovered_count: row.get::<_, i64>(16)? as u64,
        created_at: parse_time(17, &row.get::<_, String>(17)?)?,
        updated_at: parse_time(18, &row.get::<_, String>(18)?)?,
        started_at: parse_optional_time(19, row.get(19)?)?,
        completed_at: parse_optional_time(20, row.get(20)?)?,
    })
}

/// Loads one job row and its list-valued fields
fn load_job(conn: &Connection, job_id: i64) -> StorageResult<JobRecord> {
    let sql = format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS);
    let mut job = conn
        .query_row(&sql, params![job_id], map_job_row)
        .optional()?
        .ok_or(StorageError::JobNotFound(job_id))?;

    let mut stmt = conn.prepare(
        "SELECT kind, value FROM job_terms WHERE job_id = ?1 ORDER BY kind, ordinal",
    )?;
    let terms = stmt
        .query_map(params![job_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (kind, value) in terms {
        let kind = TermKind::from_db_string(&kind).ok_or_else(|| {
            StorageError::Serialization(format!("unknown job term kind '{}'", kind))
        })?;
        kind.values_mut(&mut job.spec).push(value);
    }

    Ok(job)
}

fn write_terms(conn: &Connection, job_id: i64, spec: &JobSpec) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO job_terms (job_id, kind, ordinal, value) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for kind in TermKind::ALL {
        for (ordinal, value) in kind.values(spec).iter().enumerate() {
            stmt.execute(params![job_id, kind.to_db_string(), ordinal as i64, value])?;
        }
    }
    Ok(())
}

/// Position one past the current tail of the queue
fn next_position(conn: &Connection) -> rusqlite::Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(queue_position) FROM crawl_jobs WHERE status = 'queued'",
        [],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

/// Rewrites queued positions to `1..N` in their current order and clears
/// positions on every other row
fn reindex_queue(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE crawl_jobs SET queue_position = NULL
         WHERE status != 'queued' AND queue_position IS NOT NULL",
        [],
    )?;

    let ids: Vec<i64> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM crawl_jobs WHERE status = 'queued'
             ORDER BY queue_position IS NULL, queue_position, id",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids
    };

    let mut stmt = conn.prepare("UPDATE crawl_jobs SET queue_position = ?1 WHERE id = ?2")?;
    for (index, id) in ids.iter().enumerate() {
        stmt.execute(params![index as i64 + 1, id])?;
    }

    Ok(())
}
