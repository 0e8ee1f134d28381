// crates/jobs/src/persist.rs
//! Background writer that mirrors the job table to the store.

use std::sync::Arc;

use repo_jobs_store::JobStore;
use repo_jobs_types::JobSnapshot;
use tokio::sync::watch;

/// The whole table as of one mutation.
#[derive(Debug, Clone)]
pub(crate) struct PersistRequest {
    pub revision: u64,
    pub snapshots: Arc<Vec<JobSnapshot>>,
}

/// Spawn the single writer task.
///
/// The writer always saves the newest published table; revisions published
/// while a save is in flight collapse into one follow-up save. Returns a
/// receiver carrying the last revision handed to the store. The task exits
/// once the table (the sending side) is dropped and the final revision has
/// been saved.
pub(crate) fn spawn_writer(
    store: Arc<JobStore>,
    mut requests: watch::Receiver<PersistRequest>,
) -> watch::Receiver<u64> {
    let (saved_tx, saved_rx) = watch::channel(requests.borrow().revision);

    tokio::spawn(async move {
        while requests.changed().await.is_ok() {
            let request = requests.borrow_and_update().clone();
            match store.try_save(&request.snapshots).await {
                Ok(()) => tracing::trace!(
                    backend = store.name(),
                    revision = request.revision,
                    jobs = request.snapshots.len(),
                    "job table persisted"
                ),
                Err(e) => {
                    tracing::warn!(
                        backend = store.name(),
                        revision = request.revision,
                        error = %e,
                        "failed to persist job table (non-fatal)"
                    );
                    crate::metrics::record_save_failure(store.name());
                }
            }
            saved_tx.send_replace(request.revision);
        }
        tracing::debug!(backend = store.name(), "job store writer stopped");
    });

    saved_rx
}
