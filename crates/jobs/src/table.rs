// crates/jobs/src/table.rs
//! The authoritative in-memory job table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use repo_jobs_types::{JobId, JobSnapshot};
use tokio::sync::{broadcast, watch};

use crate::error::{JobError, JobResult};
use crate::persist::PersistRequest;
use crate::record::JobRecord;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct TableInner {
    jobs: HashMap<JobId, JobRecord>,
    revision: u64,
}

/// All known jobs, behind one mutex.
///
/// Every mutation bumps the table revision and, while still holding the
/// mutex, publishes the full table to the persistence writer and the
/// changed record to subscribers. Publishing is a non-blocking channel
/// send; no I/O happens under the lock.
pub struct JobTable {
    inner: Mutex<TableInner>,
    persist_tx: watch::Sender<PersistRequest>,
    events: broadcast::Sender<JobSnapshot>,
}

impl JobTable {
    /// Build a table from restored snapshots. The returned receiver feeds the writer.
    pub(crate) fn new(restored: Vec<JobSnapshot>) -> (Self, watch::Receiver<PersistRequest>) {
        let jobs: HashMap<JobId, JobRecord> = restored
            .into_iter()
            .map(|snap| {
                let record = JobRecord::restore(snap);
                (record.id().clone(), record)
            })
            .collect();
        let initial = PersistRequest {
            revision: 0,
            snapshots: Arc::new(sorted_snapshots(&jobs)),
        };
        let (persist_tx, persist_rx) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let table = Self {
            inner: Mutex::new(TableInner { jobs, revision: 0 }),
            persist_tx,
            events,
        };
        (table, persist_rx)
    }

    // Every mutation leaves the map consistent before it can panic, so a
    // poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, record: JobRecord) -> JobSnapshot {
        let mut inner = self.lock();
        let snapshot = record.snapshot();
        inner.jobs.insert(record.id().clone(), record);
        self.publish(&mut inner, &snapshot);
        snapshot
    }

    pub fn mark_running(&self, id: &JobId) -> JobResult<JobSnapshot> {
        self.mutate(id, JobRecord::mark_running)
    }

    pub fn mark_succeeded(&self, id: &JobId) -> JobResult<JobSnapshot> {
        self.mutate(id, JobRecord::mark_succeeded)
    }

    pub fn mark_failed(&self, id: &JobId, error: impl Into<String>) -> JobResult<JobSnapshot> {
        let error = error.into();
        self.mutate(id, move |record| record.mark_failed(error))
    }

    pub fn set_progress(&self, id: &JobId, progress: impl Into<String>) -> JobResult<JobSnapshot> {
        let progress = progress.into();
        self.mutate(id, move |record| record.set_progress(progress))
    }

    fn mutate<F>(&self, id: &JobId, apply: F) -> JobResult<JobSnapshot>
    where
        F: FnOnce(&mut JobRecord) -> JobResult<()>,
    {
        let mut inner = self.lock();
        let record = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| JobError::UnknownJob(id.clone()))?;
        apply(record)?;
        let snapshot = record.snapshot();
        self.publish(&mut inner, &snapshot);
        Ok(snapshot)
    }

    // O(n log n) in the table size, under the lock. Records are never removed.
    fn publish(&self, inner: &mut TableInner, changed: &JobSnapshot) {
        inner.revision += 1;
        self.persist_tx.send_replace(PersistRequest {
            revision: inner.revision,
            snapshots: Arc::new(sorted_snapshots(&inner.jobs)),
        });
        // No subscribers is fine.
        let _ = self.events.send(changed.clone());
    }

    pub fn get(&self, id: &JobId) -> Option<JobSnapshot> {
        self.lock().jobs.get(id).map(JobRecord::snapshot)
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        sorted_snapshots(&self.lock().jobs)
    }

    /// Jobs that are still queued or running.
    pub fn active(&self) -> Vec<JobSnapshot> {
        self.list()
            .into_iter()
            .filter(|snap| !snap.is_terminal())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Revision of the latest mutation; `0` for a freshly loaded table.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobSnapshot> {
        self.events.subscribe()
    }
}

fn sorted_snapshots(jobs: &HashMap<JobId, JobRecord>) -> Vec<JobSnapshot> {
    let mut snapshots: Vec<JobSnapshot> = jobs.values().map(JobRecord::snapshot).collect();
    snapshots.sort_by(|a, b| {
        a.created_at
            .total_cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    snapshots
}
