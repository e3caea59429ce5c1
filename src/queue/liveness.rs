//! Liveness registry for running jobs
//!
//! The persisted `running` status can outlive the process that set it. The
//! queue only trusts a running row while the registry holds a lease for it.
//!
//! Two registries are provided:
//! - `InMemoryLiveness`: leases live in this process only
//! - `StoreLiveness`: leases and heartbeats live in the database, so every
//!   process sharing the file sees the same workers

use super::clock::Clock;
use crate::config::QueueConfig;
use crate::storage::{lock, SharedStorage, Storage, StorageResult};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Token identifying one promotion of a job to `running`
pub type Lease = i64;

/// Tracks which running jobs have a live worker
pub trait LivenessRegistry: Send + Sync {
    /// Registers a live worker for the job, replacing any previous lease
    fn register(&self, job_id: i64) -> StorageResult<Lease>;

    /// Forgets the job's worker, whoever holds the lease
    fn unregister(&self, job_id: i64) -> StorageResult<()>;

    /// Forgets the job's worker only if `lease` is still current
    fn release(&self, job_id: i64, lease: Lease) -> StorageResult<()>;

    /// Records that the lease holder is still working
    ///
    /// # Returns
    ///
    /// `false` once the lease has been revoked or replaced
    fn heartbeat(&self, job_id: i64, lease: Lease) -> StorageResult<bool>;

    /// True while some worker holds a lease for the job
    fn is_alive(&self, job_id: i64) -> StorageResult<bool>;

    /// True while `lease` is the job's current lease
    fn is_current(&self, job_id: i64, lease: Lease) -> StorageResult<bool>;
}

#[derive(Debug, Default)]
struct Leases {
    by_job: HashMap<i64, Lease>,
    next: Lease,
}

/// Single-process registry kept in memory
///
/// A fresh process starts with an empty registry, so every `running` row
/// left behind by a previous process is reclaimed by the next stale sweep.
/// Only suitable when a single process drives the queue.
#[derive(Debug, Default)]
pub struct InMemoryLiveness {
    leases: Mutex<Leases>,
}

impl InMemoryLiveness {
    pub fn new() -> Self {
        Self::default()
    }

    fn leases(&self) -> MutexGuard<'_, Leases> {
        self.leases.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LivenessRegistry for InMemoryLiveness {
    fn register(&self, job_id: i64) -> StorageResult<Lease> {
        let mut leases = self.leases();
        leases.next += 1;
        let lease = leases.next;
        leases.by_job.insert(job_id, lease);
        Ok(lease)
    }

    fn unregister(&self, job_id: i64) -> StorageResult<()> {
        self.leases().by_job.remove(&job_id);
        Ok(())
    }

    fn release(&self, job_id: i64, lease: Lease) -> StorageResult<()> {
        let mut leases = self.leases();
        if leases.by_job.get(&job_id) == Some(&lease) {
            leases.by_job.remove(&job_id);
        }
        Ok(())
    }

    fn heartbeat(&self, job_id: i64, lease: Lease) -> StorageResult<bool> {
        self.is_current(job_id, lease)
    }

    fn is_alive(&self, job_id: i64) -> StorageResult<bool> {
        Ok(self.leases().by_job.contains_key(&job_id))
    }

    fn is_current(&self, job_id: i64, lease: Lease) -> StorageResult<bool> {
        Ok(self.leases().by_job.get(&job_id) == Some(&lease))
    }
}

/// Registry backed by the `job_leases` table
///
/// A worker is alive while its lease row exists and its heartbeat is newer
/// than the lease timeout. Any process sharing the database can revoke a
/// lease; the holder notices at its next stop check.
pub struct StoreLiveness {
    storage: SharedStorage,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    owner: String,
}

impl StoreLiveness {
    /// Creates a registry over `storage`
    ///
    /// # Arguments
    ///
    /// * `storage` - The database shared with the queue
    /// * `clock` - Time source for heartbeats
    /// * `config` - Supplies the lease timeout
    pub fn new(storage: SharedStorage, clock: Arc<dyn Clock>, config: &QueueConfig) -> Self {
        Self {
            storage,
            clock,
            timeout: Duration::seconds(config.lease_timeout_secs as i64),
            owner: format!("pid {}", std::process::id()),
        }
    }

    /// Overrides the owner recorded on new leases
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }
}

impl LivenessRegistry for StoreLiveness {
    fn register(&self, job_id: i64) -> StorageResult<Lease> {
        let lease = lock(&self.storage)?.acquire_lease(job_id, &self.owner, self.clock.now())?;
        tracing::debug!("Job {} leased to {} (lease {})", job_id, self.owner, lease);
        Ok(lease)
    }

    fn unregister(&self, job_id: i64) -> StorageResult<()> {
        lock(&self.storage)?.release_lease(job_id, None)?;
        Ok(())
    }

    fn release(&self, job_id: i64, lease: Lease) -> StorageResult<()> {
        lock(&self.storage)?.release_lease(job_id, Some(lease))?;
        Ok(())
    }

    fn heartbeat(&self, job_id: i64, lease: Lease) -> StorageResult<bool> {
        lock(&self.storage)?.touch_lease(job_id, lease, self.clock.now())
    }

    fn is_alive(&self, job_id: i64) -> StorageResult<bool> {
        let lease = lock(&self.storage)?.get_lease(job_id)?;
        Ok(lease.map_or(false, |l| self.clock.now() - l.heartbeat_at <= self.timeout))
    }

    fn is_current(&self, job_id: i64, lease: Lease) -> StorageResult<bool> {
        let current = lock(&self.storage)?.get_lease(job_id)?;
        Ok(current.map_or(false, |l| l.lease == lease))
    }
}
