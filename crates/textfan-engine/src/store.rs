//! In-memory, session-keyed job state store.
//!
//! The store is the only shared mutable state between a job's background
//! task and concurrent status pollers. Its concurrency discipline:
//!
//! - one lock per record, so independent jobs never contend;
//! - exactly one writer per record (the owning dispatch task), any number
//!   of readers;
//! - reads return a full-record copy taken under the record lock, so a
//!   poll observes the record strictly before or after a mutation — never
//!   a mix of old and new fields.
//!
//! Status transitions are monotonic. Once a record is terminal
//! (`Completed` or `Error`), every further mutation is absorbed silently;
//! a straggling in-flight completion arriving after an abort cannot revive
//! or alter a finished job.
//!
//! Retention is bounded: creating a record past the configured cap evicts
//! the oldest terminal records first. Live jobs are never evicted.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use textfan_core::{Error, JobSnapshot, JobStatus, Result};

#[derive(Debug)]
struct JobRecord {
    status: JobStatus,
    total_chunks: usize,
    completed_chunks: usize,
    results: Vec<Option<String>>,
    output: Option<String>,
    error: Option<String>,
    created_at: Instant,
}

impl JobRecord {
    fn new() -> Self {
        Self {
            status: JobStatus::Splitting,
            total_chunks: 0,
            completed_chunks: 0,
            results: Vec::new(),
            output: None,
            error: None,
            created_at: Instant::now(),
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        let progress = match (self.status, self.total_chunks) {
            (JobStatus::Completed, _) => 100,
            (_, 0) => 0,
            (_, total) => ((self.completed_chunks * 100) / total) as u8,
        };
        JobSnapshot {
            status: self.status,
            progress,
            total_chunks: self.total_chunks,
            completed_chunks: self.completed_chunks,
            results: self.results.clone(),
            output: self.output.clone(),
            error: self.error.clone(),
        }
    }
}

/// Session-keyed store of job records with snapshot-only reads.
pub struct JobStore {
    records: RwLock<HashMap<String, Arc<Mutex<JobRecord>>>>,
    max_retained: usize,
}

impl JobStore {
    /// Creates a store retaining at most `max_retained` records; terminal
    /// records past the cap are evicted oldest-first on insertion.
    pub fn new(max_retained: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_retained: max_retained.max(1),
        }
    }

    /// Creates a fresh record for `session_id` with status `Splitting`.
    ///
    /// A terminal record under the same identifier is replaced; a live one
    /// is protected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateSession`] if a non-terminal job already
    /// holds the identifier.
    pub fn create(&self, session_id: &str) -> Result<()> {
        let mut records = self.records.write();

        if let Some(existing) = records.get(session_id) {
            if !existing.lock().status.is_terminal() {
                return Err(Error::DuplicateSession {
                    session_id: session_id.to_owned(),
                });
            }
        }

        Self::evict_terminal(&mut records, self.max_retained);
        records.insert(session_id.to_owned(), Arc::new(Mutex::new(JobRecord::new())));
        Ok(())
    }

    /// Returns an immutable copy of the record, or `None` for an unknown
    /// identifier.
    pub fn snapshot(&self, session_id: &str) -> Option<JobSnapshot> {
        let record = self.records.read().get(session_id).cloned()?;
        let guard = record.lock();
        Some(guard.snapshot())
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Transitions the record to `Processing` with its final chunk count
    /// and pre-sizes the result slots.
    pub(crate) fn begin_processing(&self, session_id: &str, total_chunks: usize) {
        self.with_record(session_id, |record| {
            record.status = JobStatus::Processing;
            record.total_chunks = total_chunks;
            record.results = vec![None; total_chunks];
        });
    }

    /// Writes one chunk's completion into its slot, at most once, and bumps
    /// the completed count.
    pub(crate) fn record_chunk_result(&self, session_id: &str, index: usize, text: String) {
        self.with_record(session_id, |record| {
            if index < record.results.len() && record.results[index].is_none() {
                record.results[index] = Some(text);
                record.completed_chunks += 1;
            }
        });
    }

    /// Marks the job completed with its final joined output.
    pub(crate) fn mark_completed(&self, session_id: &str, output: String) {
        self.with_record(session_id, |record| {
            record.status = JobStatus::Completed;
            record.output = Some(output);
        });
    }

    /// Marks the job failed. Result slots already written stay visible.
    pub(crate) fn mark_error(&self, session_id: &str, message: String) {
        self.with_record(session_id, |record| {
            record.status = JobStatus::Error;
            record.error = Some(message);
        });
    }

    /// Applies `mutate` to the record under its lock, skipping unknown
    /// identifiers and terminal records.
    fn with_record(&self, session_id: &str, mutate: impl FnOnce(&mut JobRecord)) {
        let Some(record) = self.records.read().get(session_id).cloned() else {
            return;
        };
        let mut guard = record.lock();
        if guard.status.is_terminal() {
            return;
        }
        mutate(&mut guard);
    }

    /// Evicts oldest terminal records until an insertion fits within
    /// `max_retained`.
    fn evict_terminal(records: &mut HashMap<String, Arc<Mutex<JobRecord>>>, max_retained: usize) {
        while records.len() >= max_retained {
            let oldest = records
                .iter()
                .filter(|(_, record)| record.lock().status.is_terminal())
                .min_by_key(|(_, record)| record.lock().created_at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    tracing::debug!(session_id = %id, "evicting terminal job record");
                    records.remove(&id);
                }
                // Every record is live; let the map grow rather than drop
                // an in-flight job.
                None => break,
            }
        }
    }
}
