// crates/jobs/src/manager.rs
//! Central job manager: submission, the worker pool, and queries.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::time::Instant;

use repo_jobs_store::JobStore;
use repo_jobs_types::{JobId, JobSnapshot, JobStatus, Metadata};
use tokio::sync::{broadcast, mpsc, watch, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinError;

use crate::config::JobManagerConfig;
use crate::context::JobContext;
use crate::locks::ResourceLockRegistry;
use crate::metrics;
use crate::persist;
use crate::record::JobRecord;
use crate::table::JobTable;

/// Error recorded on a job that could not be handed to a worker.
pub const POOL_UNAVAILABLE: &str = "worker pool unavailable";

type TaskFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type BoxedTask = Box<dyn FnOnce(JobContext) -> TaskFuture + Send>;

struct WorkItem {
    ctx: JobContext,
    task: BoxedTask,
    enqueued_at: Instant,
}

struct ManagerInner {
    table: Arc<JobTable>,
    locks: Arc<ResourceLockRegistry>,
    queue_tx: mpsc::UnboundedSender<WorkItem>,
    queue_depth: Arc<AtomicUsize>,
    saved_rx: watch::Receiver<u64>,
    max_workers: usize,
    backend: &'static str,
}

/// Runs submitted jobs on a fixed pool of worker tasks.
///
/// Jobs sharing a resource key never run at the same time; jobs on
/// different keys run in parallel up to `max_workers`. Cloning is cheap and
/// every clone drives the same pool. Once the last clone is dropped the
/// workers finish whatever is already queued and exit.
///
/// Must be created inside a multi-threaded tokio runtime.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<ManagerInner>,
}

impl JobManager {
    /// Select the store from `config`, load it, and start the pool.
    ///
    /// Never fails: an unreachable Redis falls back to the file store and an
    /// unreadable store starts an empty table.
    pub async fn new(config: JobManagerConfig) -> Self {
        let store = JobStore::from_config(&config.store).await;
        Self::with_store(store, config.max_workers).await
    }

    /// Start a manager on an already-selected store.
    pub async fn with_store(store: JobStore, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        let backend = store.name();

        let restored = store.load().await;
        let stuck = restored
            .iter()
            .filter(|snap| snap.status == JobStatus::Running)
            .count();
        if stuck > 0 {
            tracing::warn!(
                stuck,
                "restored jobs still marked running; they are not resumed and need manual requeue"
            );
        }
        let restored_count = restored.len();

        let (table, persist_rx) = JobTable::new(restored);
        let table = Arc::new(table);
        let saved_rx = persist::spawn_writer(Arc::new(store), persist_rx);

        let locks = Arc::new(ResourceLockRegistry::new());
        let queue_depth = Arc::new(AtomicUsize::new(0));
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        spawn_workers(max_workers, queue_rx, &locks, &queue_depth);

        tracing::info!(
            backend,
            max_workers,
            restored = restored_count,
            "job manager started"
        );

        Self {
            inner: Arc::new(ManagerInner {
                table,
                locks,
                queue_tx,
                queue_depth,
                saved_rx,
                max_workers,
                backend,
            }),
        }
    }

    /// Queue `task` to run against `resource_key`.
    ///
    /// Returns the new `Queued` record immediately; this never waits for a
    /// worker or for the resource lock. The task receives a [`JobContext`]
    /// for posting progress. An `Err` from the task, or a panic inside it,
    /// marks the job `Failed` with the error's `Display` text.
    pub fn submit<F, Fut, E>(
        &self,
        resource_key: impl Into<String>,
        kind: impl Into<String>,
        metadata: Metadata,
        task: F,
    ) -> JobSnapshot
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display,
    {
        let record = JobRecord::new(resource_key, kind, metadata);
        let ctx = JobContext::new(&record, Arc::clone(&self.inner.table));
        let snapshot = self.inner.table.insert(record);
        metrics::record_submitted(&snapshot.repo_type);

        let task: BoxedTask = Box::new(move |ctx: JobContext| -> TaskFuture {
            Box::pin(async move { task(ctx).await.map_err(|e| e.to_string()) })
        });

        let depth = self.inner.queue_depth.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_queue_depth(depth);

        let item = WorkItem {
            ctx,
            task,
            enqueued_at: Instant::now(),
        };
        if self.inner.queue_tx.send(item).is_err() {
            self.inner.queue_depth.fetch_sub(1, Ordering::Relaxed);
            tracing::error!(job_id = %snapshot.id, "worker pool is gone; failing job");
            return match self.inner.table.mark_failed(&snapshot.id, POOL_UNAVAILABLE) {
                Ok(failed) => failed,
                Err(_) => snapshot,
            };
        }

        tracing::debug!(
            job_id = %snapshot.id,
            resource_key = %snapshot.repo_url,
            kind = %snapshot.repo_type,
            "job queued"
        );
        snapshot
    }

    /// Post progress for a running job. Unknown or finished jobs are ignored.
    pub fn update_progress(&self, job_id: &JobId, progress: impl Into<String>) {
        if let Err(e) = self.inner.table.set_progress(job_id, progress) {
            tracing::debug!(job_id = %job_id, error = %e, "progress update ignored");
        }
    }

    /// Current state of one job, or `None` if the id is unknown.
    pub fn get(&self, job_id: &JobId) -> Option<JobSnapshot> {
        self.inner.table.get(job_id)
    }

    /// Every job, oldest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        self.inner.table.list()
    }

    /// Jobs still queued or running.
    pub fn active_jobs(&self) -> Vec<JobSnapshot> {
        self.inner.table.active()
    }

    /// Stream of job snapshots, one per mutation.
    ///
    /// Slow receivers see `RecvError::Lagged` and skip ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<JobSnapshot> {
        self.inner.table.subscribe()
    }

    /// Wait until every mutation made so far has been handed to the store.
    pub async fn flush(&self) {
        let target = self.inner.table.revision();
        let mut saved = self.inner.saved_rx.clone();
        if saved.wait_for(|revision| *revision >= target).await.is_err() {
            tracing::warn!(target, "job store writer stopped before flush completed");
        }
    }

    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    /// `"file"` or `"redis"`.
    pub fn backend_name(&self) -> &'static str {
        self.inner.backend
    }

    /// Jobs submitted but not yet picked up by a worker.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue_depth.load(Ordering::Relaxed)
    }

    /// Number of distinct resource keys that have had a lock created.
    pub fn resource_count(&self) -> usize {
        self.inner.locks.len()
    }
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobManager")
            .field("backend", &self.inner.backend)
            .field("max_workers", &self.inner.max_workers)
            .field("jobs", &self.inner.table.len())
            .finish()
    }
}

fn spawn_workers(
    count: usize,
    queue_rx: mpsc::UnboundedReceiver<WorkItem>,
    locks: &Arc<ResourceLockRegistry>,
    queue_depth: &Arc<AtomicUsize>,
) {
    let queue_rx = Arc::new(AsyncMutex::new(queue_rx));
    for worker_id in 0..count {
        let queue_rx = Arc::clone(&queue_rx);
        let locks = Arc::clone(locks);
        let queue_depth = Arc::clone(queue_depth);
        tokio::spawn(async move {
            loop {
                // The resource lock is requested before the queue is released,
                // so same-key jobs queue on their lock in dequeue order.
                let (item, acquire, ready) = {
                    let mut rx = queue_rx.lock().await;
                    let Some(item) = rx.recv().await else { break };
                    let lock = locks.lock_for(item.ctx.resource_key());
                    let mut acquire = Box::pin(lock.lock_owned());
                    let ready = poll_once(acquire.as_mut()).await;
                    (item, acquire, ready)
                };
                let depth = queue_depth.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
                metrics::set_queue_depth(depth);

                let guard = match ready {
                    Some(guard) => guard,
                    None => acquire.await,
                };
                run_job(worker_id, item, guard).await;
            }
            tracing::debug!(worker_id, "job worker stopped");
        });
    }
}

/// Poll `fut` exactly once. A pending future keeps its registration (for a
/// lock, its place in the wait queue) and can be awaited later.
async fn poll_once<F>(mut fut: F) -> Option<F::Output>
where
    F: Future + Unpin,
{
    std::future::poll_fn(|cx| match Pin::new(&mut fut).poll(cx) {
        Poll::Ready(output) => Poll::Ready(Some(output)),
        Poll::Pending => Poll::Ready(None),
    })
    .await
}

/// Execute one job while holding its resource lock.
///
/// The task runs in its own spawned task so that a panic surfaces as a
/// `JoinError` here instead of unwinding through the worker. `_guard` is
/// dropped on every return path.
async fn run_job(worker_id: usize, item: WorkItem, _guard: OwnedMutexGuard<()>) {
    let WorkItem {
        ctx,
        task,
        enqueued_at,
    } = item;
    let table = Arc::clone(&ctx.table);
    let id = ctx.id().clone();
    metrics::record_started(enqueued_at.elapsed());

    if let Err(e) = table.mark_running(&id) {
        tracing::warn!(worker_id, job_id = %id, error = %e, "job could not start");
        return;
    }
    tracing::debug!(
        worker_id,
        job_id = %id,
        resource_key = %ctx.resource_key(),
        "job running"
    );

    let started = Instant::now();
    let outcome = tokio::spawn(async move { task(ctx).await }).await;
    let finished = match outcome {
        Ok(Ok(())) => table.mark_succeeded(&id),
        Ok(Err(message)) => {
            tracing::warn!(worker_id, job_id = %id, error = %message, "job failed");
            table.mark_failed(&id, message)
        }
        Err(join_err) => {
            let message = join_error_message(join_err);
            tracing::error!(worker_id, job_id = %id, error = %message, "job task aborted");
            table.mark_failed(&id, message)
        }
    };

    match finished {
        Ok(snapshot) => {
            metrics::record_finished(snapshot.status, started.elapsed());
            tracing::debug!(
                worker_id,
                job_id = %id,
                status = %snapshot.status,
                duration_secs = started.elapsed().as_secs_f64(),
                "job finished"
            );
        }
        Err(e) => tracing::warn!(worker_id, job_id = %id, error = %e, "job result not recorded"),
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "job task was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("job task panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("job task panicked: {msg}")
    } else {
        "job task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn manager(workers: usize) -> (JobManager, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = JobStore::from(repo_jobs_store::FileStore::new(tmp.path().join("jobs.json")));
        (JobManager::with_store(store, workers).await, tmp)
    }

    async fn wait_terminal(manager: &JobManager, id: &JobId) -> JobSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(snap) = manager.get(id).filter(JobSnapshot::is_terminal) {
                    return snap;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not finish")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_and_complete() {
        let (manager, _tmp) = manager(2).await;
        let snap = manager.submit("repo1", "github", Metadata::new(), |_ctx| async {
            Ok::<_, String>(())
        });
        assert_eq!(snap.status, JobStatus::Queued);

        let done = wait_terminal(&manager, &snap.id).await;
        assert_eq!(done.status, JobStatus::Success);
        assert_eq!(done.progress.as_deref(), Some("done"));
        assert_eq!(done.error, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_task_is_failed_not_fatal() {
        let (manager, _tmp) = manager(1).await;
        let bad = manager.submit("repo1", "github", Metadata::new(), |_ctx| async {
            if true {
                panic!("index out of range");
            }
            Ok::<_, String>(())
        });
        let failed = wait_terminal(&manager, &bad.id).await;
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(
            failed.error.as_deref(),
            Some("job task panicked: index out of range")
        );

        // The lone worker and the repo1 lock both survived.
        let good = manager.submit("repo1", "github", Metadata::new(), |_ctx| async {
            Ok::<_, String>(())
        });
        assert_eq!(wait_terminal(&manager, &good.id).await.status, JobStatus::Success);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_max_workers_floor() {
        let (manager, _tmp) = manager(0).await;
        assert_eq!(manager.max_workers(), 1);
        assert_eq!(manager.backend_name(), "file");
    }

    #[test]
    fn test_join_error_message_for_string_payload() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt
            .block_on(async { tokio::spawn(async { panic!("{}", String::from("owned")) }).await })
            .unwrap_err();
        assert_eq!(join_error_message(err), "job task panicked: owned");
    }
}
