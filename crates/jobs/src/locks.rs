// crates/jobs/src/locks.rs
//! Per-resource mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

/// Hands out one async lock per resource key.
///
/// Locks are created on first use and kept for the life of the process, so
/// every caller asking for the same key gets the same lock. The registry
/// mutex is held only for the map lookup, never while a job runs.
///
/// The map is never pruned; its size is the number of distinct resource
/// keys seen since startup. Job records are never pruned either, and every
/// table mutation clones and sorts the whole table (see `JobTable`), so
/// mutation cost grows with the number of jobs ever submitted.
#[derive(Debug, Default)]
pub struct ResourceLockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ResourceLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `resource_key`.
    ///
    /// Tokio's mutex queues waiters in FIFO order, so jobs on one key start
    /// in the order the lock was requested.
    pub fn lock_for(&self, resource_key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(resource_key) {
            return Arc::clone(lock);
        }
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(resource_key.to_string(), Arc::clone(&lock));
        lock
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
