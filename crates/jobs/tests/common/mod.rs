// Shared helpers for job manager integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use repo_jobs::{FileStore, JobId, JobManager, JobSnapshot, JobStore, Metadata};

/// Install a test subscriber once; `RUST_LOG=repo_jobs=debug` shows manager logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn file_manager(path: &Path, workers: usize) -> JobManager {
    init_tracing();
    JobManager::with_store(JobStore::from(FileStore::new(path)), workers).await
}

pub fn metadata(pairs: &[(&str, serde_json::Value)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Poll until the job reaches a terminal state.
pub async fn wait_terminal(manager: &JobManager, id: &JobId) -> JobSnapshot {
    wait_until(manager, id, JobSnapshot::is_terminal).await
}

pub async fn wait_until<F>(manager: &JobManager, id: &JobId, cond: F) -> JobSnapshot
where
    F: Fn(&JobSnapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(snap) = manager.get(id).filter(|s| cond(s)) {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("job {id} did not reach the expected state"))
}
