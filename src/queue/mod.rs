//! Persisted single-flight job queue
//!
//! This module drives crawl jobs through their lifecycle:
//! - Submission (`queued` at the tail, or `scheduled` with no position)
//! - Promotion of one job at a time to `running`, guarded by a stale sweep
//!   and the liveness registry
//! - Completion, autostart chaining, stop, clone, delete and reposition
//!
//! All queue mutations are single storage transactions. A process-local
//! promotion lock serializes sweep and claim within a process; across
//! processes the database's single-running index and the worker leases in
//! the liveness registry keep promotion single-flight.

mod clock;
mod liveness;

pub use clock::{Clock, ManualClock, SystemClock};
pub use liveness::{InMemoryLiveness, Lease, LivenessRegistry, StoreLiveness};

use crate::config::{validate_job_spec, Config, CrawlerConfig, JobSpec, QueueConfig};
use crate::crawler::{Coordinator, CrawlPlan, CrawlSummary, StopSignal};
use crate::sink::{ProgressSink, ProgressUpdate, SinkError};
use crate::state::JobStatus;
use crate::storage::{lock, JobOutcome, JobRecord, QueueStats, SharedStorage, Storage, StorageError};
use crate::{ConfigError, ScoutError};
use chrono::Duration;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors from queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    NotFound(i64),

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

    #[error("Invalid job definition: {0}")]
    InvalidJob(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for QueueError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::JobNotFound(id) => QueueError::NotFound(id),
            StorageError::AlreadyRunning { running } => QueueError::AlreadyRunning { running },
            StorageError::InvalidStatus { id, status, action } => {
                QueueError::InvalidStatus { id, status, action }
            }
            StorageError::InvalidPosition { position, len } => {
                QueueError::InvalidPosition { position, len }
            }
            other => QueueError::Storage(other),
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Running jobs older than this are reclaimed by the stale sweep
    pub stale_after: Duration,
    /// How often a worker refreshes its lease
    pub heartbeat: std::time::Duration,
}

impl QueueSettings {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            stale_after: Duration::minutes(config.stale_after_minutes),
            heartbeat: std::time::Duration::from_secs(config.heartbeat_secs),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

/// Single-flight crawl job queue
///
/// Cloning is cheap; clones share storage, registry and promotion lock.
#[derive(Clone)]
pub struct JobQueue {
    storage: SharedStorage,
    coordinator: Coordinator,
    crawler: CrawlerConfig,
    registry: Arc<dyn LivenessRegistry>,
    clock: Arc<dyn Clock>,
    settings: QueueSettings,
    promotion: Arc<Mutex<()>>,
}

impl JobQueue {
    /// Creates a queue over `storage` with crawl collaborators built from
    /// the configuration
    pub fn new(
        config: &Config,
        storage: SharedStorage,
        registry: Arc<dyn LivenessRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ScoutError> {
        let coordinator = Coordinator::new(config, storage.clone())?;
        let progress = Arc::new(JobProgress {
            storage: storage.clone(),
            clock: clock.clone(),
        });

        Ok(Self {
            coordinator: coordinator.with_progress(progress),
            storage,
            crawler: config.crawler.clone(),
            registry,
            clock,
            settings: QueueSettings::from_config(&config.queue),
            promotion: Arc::new(Mutex::new(())),
        })
    }

    /// Replaces the coordinator, keeping the queue's progress sink
    pub fn with_coordinator(mut self, coordinator: Coordinator) -> Self {
        let progress = Arc::new(JobProgress {
            storage: self.storage.clone(),
            clock: self.clock.clone(),
        });
        self.coordinator = coordinator.with_progress(progress);
        self
    }

    pub fn with_settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    // ===== Submission =====

    /// Validates and enqueues a job
    ///
    /// A job with a scheduled time in the future is stored as `scheduled`
    /// with no position; everything else joins the tail of the queue.
    pub fn submit(&self, spec: JobSpec) -> QueueResult<JobRecord> {
        validate_job_spec(&spec)?;

        let now = self.clock.now();
        let status = match spec.scheduled_time {
            Some(at) if at > now => JobStatus::Scheduled,
            _ => JobStatus::Queued,
        };

        let mut storage = lock(&self.storage)?;
        let id = storage.insert_job(&spec, status, now)?;
        let job = storage.get_job(id)?;

        tracing::info!(
            "Submitted job {} '{}' as {} (position {:?})",
            job.id,
            job.spec.name,
            job.status,
            job.queue_position
        );
        Ok(job)
    }

    /// Moves due `scheduled` jobs to the tail of the queue
    pub fn release_due(&self) -> QueueResult<Vec<i64>> {
        let released = lock(&self.storage)?.release_scheduled(self.clock.now())?;
        if !released.is_empty() {
            tracing::info!("Released {} scheduled jobs: {:?}", released.len(), released);
        }
        Ok(released)
    }

    // ===== Execution =====

    /// Promotes a specific job to `running` and spawns its worker
    ///
    /// Queued, scheduled and failed jobs can be started. The returned
    /// handle completes when the job and any autostart successors finish.
    pub fn start(&self, job_id: i64) -> QueueResult<JoinHandle<()>> {
        let (job, lease) = {
            let _guard = self.promotion_lock()?;
            self.sweep_stale_locked()?;
            self.claim(job_id)?
        };
        Ok(self.spawn_worker(job, lease))
    }

    /// Promotes the queued job with the lowest position, if any
    pub fn start_next(&self) -> QueueResult<Option<JoinHandle<()>>> {
        let claimed = {
            let _guard = self.promotion_lock()?;
            self.sweep_stale_locked()?;
            let next = lock(&self.storage)?.next_queued_job()?;
            match next {
                Some(job) => Some(self.claim(job.id)?),
                None => None,
            }
        };

        Ok(claimed.map(|(job, lease)| self.spawn_worker(job, lease)))
    }

    /// Leases the job, then promotes it
    ///
    /// The lease exists before the row turns `running`, so a sweep in
    /// another process never sees the new running job without a worker.
    fn claim(&self, job_id: i64) -> QueueResult<(JobRecord, Lease)> {
        let current = lock(&self.storage)?.get_job(job_id)?;
        if current.status == JobStatus::Running {
            return Err(QueueError::AlreadyRunning { running: job_id });
        }

        let lease = self.registry.register(job_id)?;
        let claimed = lock(&self.storage).and_then(|mut s| s.claim_job(job_id, self.clock.now()));
        match claimed {
            Ok(job) => {
                tracing::info!("Job {} '{}' is running (lease {})", job.id, job.spec.name, lease);
                Ok((job, lease))
            }
            Err(e) => {
                if let Err(release) = self.registry.release(job_id, lease) {
                    tracing::warn!("Could not release lease on job {}: {}", job_id, release);
                }
                Err(e.into())
            }
        }
    }

    fn spawn_worker(&self, job: JobRecord, lease: Lease) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            if let Some(successor) = queue.run_job(job, lease).await {
                if let Err(e) = successor.await {
                    tracing::error!("Autostart successor failed: {}", e);
                }
            }
        })
    }

    /// Crawls a claimed job and records its outcome
    ///
    /// The outcome is only written while the worker's lease is current; a
    /// stopped or reclaimed job's result is discarded and does not chain.
    async fn run_job(&self, job: JobRecord, lease: Lease) -> Option<JoinHandle<()>> {
        let stop = Arc::new(LeaseStop {
            registry: self.registry.clone(),
            job_id: job.id,
            lease,
        });
        let heartbeat = tokio::spawn(keep_alive(
            self.registry.clone(),
            job.id,
            lease,
            self.settings.heartbeat,
        ));
        let plan = CrawlPlan::from_job(Some(job.id), &job.spec, &self.crawler);
        let result = self.coordinator.run(plan, stop).await;
        heartbeat.abort();

        let current = self.registry.is_current(job.id, lease).unwrap_or_else(|e| {
            tracing::warn!("Could not check lease on job {}: {}", job.id, e);
            true
        });
        if !current {
            tracing::info!(
                "Job {} was stopped or reclaimed; discarding its result",
                job.id
            );
            return None;
        }

        let (status, outcome) = job_outcome(result);
        match status {
            JobStatus::Completed => tracing::info!(
                "Job {} completed: {}",
                job.id,
                outcome.result_summary.as_deref().unwrap_or_default()
            ),
            _ => tracing::error!(
                "Job {} failed: {}",
                job.id,
                outcome.error_message.as_deref().unwrap_or_default()
            ),
        }

        let finished = lock(&self.storage)
            .and_then(|mut storage| storage.finish_job(job.id, status, &outcome, self.clock.now()));
        if let Err(e) = self.registry.release(job.id, lease) {
            tracing::warn!("Could not release lease on job {}: {}", job.id, e);
        }

        match finished {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Job {} left running state before completion", job.id);
                return None;
            }
            Err(e) => {
                tracing::error!("Could not record outcome of job {}: {}", job.id, e);
                return None;
            }
        }

        if !job.spec.autostart {
            return None;
        }

        match self.start_next() {
            Ok(Some(handle)) => Some(handle),
            Ok(None) => {
                tracing::info!("Autostart chain ended: queue is empty");
                None
            }
            Err(e) => {
                tracing::warn!("Autostart after job {} failed: {}", job.id, e);
                None
            }
        }
    }

    // ===== Recovery =====

    /// Reclaims running jobs without a live worker or past the runtime
    /// ceiling, marking them `failed`
    ///
    /// # Returns
    ///
    /// The IDs of reclaimed jobs
    pub fn sweep_stale(&self) -> QueueResult<Vec<i64>> {
        let _guard = self.promotion_lock()?;
        self.sweep_stale_locked()
    }

    /// The storage lock is never held across registry calls; a
    /// store-backed registry takes it itself.
    fn sweep_stale_locked(&self) -> QueueResult<Vec<i64>> {
        let now = self.clock.now();
        let running = lock(&self.storage)?.list_jobs(Some(JobStatus::Running))?;

        let mut reclaimed = Vec::new();
        for job in running {
            let started = job.started_at.unwrap_or(job.updated_at);
            let reason = if !self.registry.is_alive(job.id)? {
                "stale job: no live worker (process restart or crash)".to_string()
            } else if now - started > self.settings.stale_after {
                format!(
                    "stale job: exceeded maximum runtime of {} minutes",
                    self.settings.stale_after.num_minutes()
                )
            } else {
                continue;
            };

            let outcome = JobOutcome {
                error_message: Some(reason.clone()),
                result_summary: None,
                discovered_count: job.discovered_count,
            };
            if lock(&self.storage)?.finish_job(job.id, JobStatus::Failed, &outcome, now)? {
                tracing::warn!("Reclaimed job {}: {}", job.id, reason);
                reclaimed.push(job.id);
            }
            self.registry.unregister(job.id)?;
        }

        Ok(reclaimed)
    }

    // ===== Control =====

    /// Stops a running job and returns it to the tail of the queue
    ///
    /// The lease is revoked so the worker abandons its traversal at the next
    /// fetch boundary and its result is discarded. In-flight requests are
    /// not aborted. With a store-backed registry this reaches workers in
    /// other processes.
    ///
    /// # Returns
    ///
    /// The job's new queue position
    pub fn stop(&self, job_id: i64) -> QueueResult<i64> {
        let _guard = self.promotion_lock()?;
        let position = lock(&self.storage)?.requeue_job(job_id, self.clock.now())?;
        self.registry.unregister(job_id)?;
        tracing::info!("Stopped job {}; requeued at position {}", job_id, position);
        Ok(position)
    }

    /// Enqueues a copy of a job's definition under the name "<name> (copy)"
    ///
    /// Status, schedule and timestamps are never copied.
    pub fn clone_job(&self, job_id: i64) -> QueueResult<JobRecord> {
        let now = self.clock.now();
        let mut storage = lock(&self.storage)?;
        let original = storage.get_job(job_id)?;

        let mut spec = original.spec;
        spec.name = format!("{} (copy)", spec.name);
        spec.scheduled_time = None;

        let id = storage.insert_job(&spec, JobStatus::Queued, now)?;
        tracing::info!("Cloned job {} as {}", job_id, id);
        Ok(storage.get_job(id)?)
    }

    /// Replaces the definition of a job that is not running
    ///
    /// Changing the scheduled time reschedules the job: a future time makes
    /// it `scheduled` with no position, otherwise it joins the tail of the
    /// queue (a job already queued keeps its slot).
    pub fn update(&self, job_id: i64, spec: JobSpec) -> QueueResult<JobRecord> {
        validate_job_spec(&spec)?;
        let job = lock(&self.storage)?.update_job(job_id, &spec, self.clock.now())?;
        tracing::info!(
            "Updated job {} '{}': {} (position {:?})",
            job.id,
            job.spec.name,
            job.status,
            job.queue_position
        );
        Ok(job)
    }

    /// Deletes a job that is not running; its discovered files are kept
    pub fn delete(&self, job_id: i64) -> QueueResult<()> {
        lock(&self.storage)?.delete_job(job_id)?;
        tracing::info!("Deleted job {}", job_id);
        Ok(())
    }

    /// Moves a queued job to `position` (1-based)
    pub fn move_to(&self, job_id: i64, position: i64) -> QueueResult<()> {
        lock(&self.storage)?.move_job(job_id, position, self.clock.now())?;
        tracing::info!("Moved job {} to position {}", job_id, position);
        Ok(())
    }

    /// Flips the autostart flag on every queued job, based on the first
    /// queued job's current value
    ///
    /// # Returns
    ///
    /// The new value, or None when nothing is queued
    pub fn toggle_autostart(&self) -> QueueResult<Option<bool>> {
        let mut storage = lock(&self.storage)?;
        let Some(first) = storage.next_queued_job()? else {
            return Ok(None);
        };

        let enabled = !first.spec.autostart;
        let updated = storage.set_queued_autostart(enabled, self.clock.now())?;
        tracing::info!("Autostart {} on {} queued jobs", enabled, updated);
        Ok(Some(enabled))
    }

    // ===== Reads =====

    pub fn get(&self, job_id: i64) -> QueueResult<JobRecord> {
        Ok(lock(&self.storage)?.get_job(job_id)?)
    }

    /// Lists jobs after reclaiming stale ones
    pub fn list(&self, status: Option<JobStatus>) -> QueueResult<Vec<JobRecord>> {
        self.sweep_stale()?;
        Ok(lock(&self.storage)?.list_jobs(status)?)
    }

    /// The verified running job, if any
    pub fn running(&self) -> QueueResult<Option<JobRecord>> {
        Ok(self.list(Some(JobStatus::Running))?.into_iter().next())
    }

    pub fn stats(&self) -> QueueResult<QueueStats> {
        self.sweep_stale()?;
        Ok(lock(&self.storage)?.queue_stats()?)
    }

    fn promotion_lock(&self) -> QueueResult<std::sync::MutexGuard<'_, ()>> {
        self.promotion
            .lock()
            .map_err(|_| QueueError::Storage(StorageError::LockPoisoned))
    }
}

/// Maps a crawl result to the job's terminal status and recorded outcome
fn job_outcome(result: Result<CrawlSummary, ScoutError>) -> (JobStatus, JobOutcome) {
    match result {
        Ok(summary) if summary.all_failed() => (
            JobStatus::Failed,
            JobOutcome {
                error_message: Some(format!(
                    "all {} sites failed: {}",
                    summary.reports.len(),
                    summary
                        .failed_sites()
                        .filter_map(|r| r.error.as_deref())
                        .collect::<Vec<_>>()
                        .join("; ")
                )),
                result_summary: Some(summary.describe()),
                discovered_count: summary.persisted as u64,
            },
        ),
        Ok(summary) => (
            JobStatus::Completed,
            JobOutcome {
                error_message: None,
                result_summary: Some(summary.describe()),
                discovered_count: summary.persisted as u64,
            },
        ),
        Err(e) => (
            JobStatus::Failed,
            JobOutcome {
                error_message: Some(e.to_string()),
                result_summary: None,
                discovered_count: 0,
            },
        ),
    }
}

/// Stop signal backed by the job's lease
struct LeaseStop {
    registry: Arc<dyn LivenessRegistry>,
    job_id: i64,
    lease: Lease,
}

impl StopSignal for LeaseStop {
    fn is_stopped(&self) -> bool {
        match self.registry.is_current(self.job_id, self.lease) {
            Ok(current) => !current,
            Err(e) => {
                tracing::warn!("Could not check lease on job {}: {}", self.job_id, e);
                false
            }
        }
    }
}

/// Refreshes a worker's lease until it is revoked or the task is aborted
async fn keep_alive(
    registry: Arc<dyn LivenessRegistry>,
    job_id: i64,
    lease: Lease,
    every: std::time::Duration,
) {
    let mut interval = tokio::time::interval(every.max(std::time::Duration::from_millis(10)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match registry.heartbeat(job_id, lease) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Lease {} on job {} revoked; heartbeat stops", lease, job_id);
                return;
            }
            Err(e) => tracing::warn!("Heartbeat for job {} failed: {}", job_id, e),
        }
    }
}

/// Progress sink persisting the percentage onto the running job row
struct JobProgress {
    storage: SharedStorage,
    clock: Arc<dyn Clock>,
}

impl ProgressSink for JobProgress {
    fn report(&self, update: &ProgressUpdate) -> Result<(), SinkError> {
        tracing::info!("[{}%] {}", update.percent(), update.message);
        let Some(job_id) = update.job_id else {
            return Ok(());
        };
        lock(&self.storage)
            .and_then(|mut storage| {
                storage.update_job_progress(job_id, update.percent(), self.clock.now())
            })
            .map_err(|e| SinkError::Storage(e.to_string()))
    }
}
