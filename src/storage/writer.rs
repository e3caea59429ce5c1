//! Batched persistence of discovered files
//!
//! A `BatchWriter` belongs to one site crawl. Accepted candidates are
//! buffered and flushed when the buffer reaches the batch size and again
//! when the crawl finishes.
//!
//! One site crawl is one ledger visit: each domain it reaches (the seed's
//! site, or the host of an accepted file) is upserted once, in the first
//! flush after it is seen.

use crate::sink::{DiscoveryEvent, DiscoveryNotifier};
use crate::storage::{lock, NewDiscoveredFile, SharedStorage, Storage};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Buffers discovered files and commits them in bulk with the site ledger
pub struct BatchWriter {
    storage: SharedStorage,
    notifier: Arc<dyn DiscoveryNotifier>,
    job_id: Option<i64>,
    batch_size: usize,
    buffer: Vec<NewDiscoveredFile>,
    persisted: usize,
    /// Visited domains not yet written to the ledger
    visits: Vec<String>,
    /// Domains already recorded by this writer
    recorded: HashSet<String>,
}

impl BatchWriter {
    pub fn new(
        storage: SharedStorage,
        notifier: Arc<dyn DiscoveryNotifier>,
        job_id: Option<i64>,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            storage,
            notifier,
            job_id,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            persisted: 0,
            visits: Vec::new(),
            recorded: HashSet::new(),
        }
    }

    /// Notes a visit to `domain`, recorded in the ledger by the next flush
    ///
    /// Repeated visits to the same domain within one writer count once.
    pub fn record_visit(&mut self, domain: &str) {
        if !self.recorded.contains(domain) && !self.visits.iter().any(|d| d == domain) {
            self.visits.push(domain.to_string());
        }
    }

    /// Buffers a file, flushing when the batch is full
    ///
    /// # Returns
    ///
    /// Number of rows inserted by a flush this call triggered (usually 0)
    pub fn push(&mut self, file: NewDiscoveredFile) -> usize {
        self.buffer.push(file);
        if self.buffer.len() >= self.batch_size {
            self.flush()
        } else {
            0
        }
    }

    /// Files waiting in the buffer
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Rows inserted so far (post-dedup)
    pub fn persisted(&self) -> usize {
        self.persisted
    }

    /// Flushes the remaining buffer and pending visits, returning the total
    /// inserted rows
    pub fn finish(mut self) -> usize {
        self.flush();
        self.persisted
    }

    /// Writes the buffer in one transaction together with a ledger upsert
    /// for every pending visit and every distinct domain in it that this
    /// writer has not recorded yet
    ///
    /// # Failure handling
    ///
    /// 1. If the combined transaction fails, it is rolled back
    /// 2. Files are inserted again in their own transaction, and one by one
    ///    if that fails too
    /// 3. Each domain's ledger upsert is retried individually, falling back
    ///    to read-then-branch (touch if present, else insert)
    ///
    /// Anything that still cannot be stored is logged with its URL or domain.
    pub fn flush(&mut self) -> usize {
        let batch = std::mem::take(&mut self.buffer);
        let domains = self.unrecorded_domains(&batch);
        if batch.is_empty() && domains.is_empty() {
            return 0;
        }
        let now = Utc::now();

        let result =
            lock(&self.storage).and_then(|mut storage| storage.persist_batch(&batch, &domains, now));

        let inserted = match result {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::warn!(
                    "Batch of {} files failed ({}); retrying files and ledger separately",
                    batch.len(),
                    e
                );
                let inserted = if batch.is_empty() {
                    0
                } else {
                    self.insert_files_fallback(&batch, now)
                };
                for domain in &domains {
                    self.record_site_fallback(domain, now);
                }
                inserted
            }
        };

        self.recorded.extend(domains.iter().cloned());

        tracing::debug!(
            "Flushed {} files ({} new, {} domains)",
            batch.len(),
            inserted,
            domains.len()
        );

        self.persisted += inserted;
        if inserted > 0 {
            self.notifier.files_discovered(DiscoveryEvent {
                job_id: self.job_id,
                new_files: inserted,
            });
        }

        inserted
    }

    /// Pending visits, then the batch's domains, minus those already recorded
    fn unrecorded_domains(&mut self, batch: &[NewDiscoveredFile]) -> Vec<String> {
        let mut domains = std::mem::take(&mut self.visits);
        for domain in distinct_domains(batch) {
            if !domains.contains(&domain) {
                domains.push(domain);
            }
        }
        domains.retain(|domain| !self.recorded.contains(domain));
        domains
    }

    fn insert_files_fallback(&self, batch: &[NewDiscoveredFile], now: DateTime<Utc>) -> usize {
        let result = lock(&self.storage).and_then(|mut storage| storage.insert_files(batch, now));
        match result {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::warn!("Bulk file insert failed ({}); inserting one by one", e);
                batch
                    .iter()
                    .filter(|file| self.insert_one(file, now))
                    .count()
            }
        }
    }

    fn insert_one(&self, file: &NewDiscoveredFile, now: DateTime<Utc>) -> bool {
        let result = lock(&self.storage).and_then(|mut storage| storage.insert_file(file, now));
        match result {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::warn!(
                    "Could not persist discovered file {} (from {}): {}",
                    file.url,
                    file.source_page,
                    e
                );
                false
            }
        }
    }

    fn record_site_fallback(&self, domain: &str, now: DateTime<Utc>) {
        let result = lock(&self.storage).and_then(|mut storage| {
            match storage.upsert_site(domain, now) {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::debug!("Ledger upsert for {} failed ({}); reading first", domain, e);
                    match storage.get_site(domain)? {
                        Some(_) => storage.touch_site(domain, now).map(|_| ()),
                        None => storage.insert_site(domain, now),
                    }
                }
            }
        });

        if let Err(e) = result {
            tracing::warn!("Could not update site ledger for {}: {}", domain, e);
        }
    }
}

/// Distinct domains of a batch in first-seen order
fn distinct_domains(batch: &[NewDiscoveredFile]) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();
    for file in batch {
        if !domains.contains(&file.domain) {
            domains.push(file.domain.clone());
        }
    }
    domains
}
