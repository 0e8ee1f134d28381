// crates/jobs/src/context.rs
use std::sync::Arc;

use repo_jobs_types::{JobId, Metadata};

use crate::record::JobRecord;
use crate::table::JobTable;

/// Handle passed to a running task.
///
/// Exposes the job's identity and metadata and lets the task post progress
/// without going through the manager.
#[derive(Clone)]
pub struct JobContext {
    id: JobId,
    resource_key: String,
    kind: String,
    metadata: Metadata,
    pub(crate) table: Arc<JobTable>,
}

impl JobContext {
    pub(crate) fn new(record: &JobRecord, table: Arc<JobTable>) -> Self {
        Self {
            id: record.id().clone(),
            resource_key: record.resource_key().to_string(),
            kind: record.kind().to_string(),
            metadata: record.metadata().clone(),
            table,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn resource_key(&self) -> &str {
        &self.resource_key
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Replace the job's progress marker.
    pub fn update_progress(&self, progress: impl Into<String>) {
        if let Err(e) = self.table.set_progress(&self.id, progress) {
            tracing::debug!(job_id = %self.id, error = %e, "progress update ignored");
        }
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("id", &self.id)
            .field("resource_key", &self.resource_key)
            .field("kind", &self.kind)
            .finish()
    }
}
