// crates/jobs/src/record.rs
//! A single job and its lifecycle transitions.

use repo_jobs_types::{now_secs, JobId, JobSnapshot, JobStatus, Metadata};

use crate::error::{JobError, JobResult};

pub const PROGRESS_STARTING: &str = "starting";
pub const PROGRESS_DONE: &str = "done";
pub const PROGRESS_ERROR: &str = "error";

/// One unit of work tracked by the job table.
///
/// Identity fields (`id`, resource key, kind, metadata, `created_at`) are
/// fixed at construction. Lifecycle fields change only through the `mark_*`
/// methods, each of which checks the current status first and bumps
/// `updated_at`.
#[derive(Debug, Clone)]
pub struct JobRecord {
    id: JobId,
    resource_key: String,
    kind: String,
    status: JobStatus,
    error: Option<String>,
    progress: Option<String>,
    created_at: f64,
    updated_at: f64,
    metadata: Metadata,
}

impl JobRecord {
    /// Create a new `Queued` job with a fresh id.
    pub fn new(resource_key: impl Into<String>, kind: impl Into<String>, metadata: Metadata) -> Self {
        let created_at = now_secs();
        Self {
            id: JobId::generate(),
            resource_key: resource_key.into(),
            kind: kind.into(),
            status: JobStatus::Queued,
            error: None,
            progress: None,
            created_at,
            updated_at: created_at,
            metadata,
        }
    }

    /// Rebuild a record exactly as it was persisted. Nothing is resumed.
    pub fn restore(snapshot: JobSnapshot) -> Self {
        let snapshot = snapshot.normalized();
        Self {
            id: snapshot.id,
            resource_key: snapshot.repo_url,
            kind: snapshot.repo_type,
            status: snapshot.status,
            error: snapshot.error,
            progress: snapshot.progress,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            metadata: snapshot.metadata,
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

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn progress(&self) -> Option<&str> {
        self.progress.as_deref()
    }

    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    pub fn updated_at(&self) -> f64 {
        self.updated_at
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// `Queued -> Running`, progress `"starting"`.
    pub fn mark_running(&mut self) -> JobResult<()> {
        self.transition(JobStatus::Running)?;
        self.progress = Some(PROGRESS_STARTING.to_string());
        Ok(())
    }

    /// `Running -> Success`, progress `"done"`.
    pub fn mark_succeeded(&mut self) -> JobResult<()> {
        self.transition(JobStatus::Success)?;
        self.progress = Some(PROGRESS_DONE.to_string());
        Ok(())
    }

    /// `Running | Queued -> Failed`, progress `"error"`.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> JobResult<()> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.progress = Some(PROGRESS_ERROR.to_string());
        Ok(())
    }

    /// Replace the progress marker of a running job.
    pub fn set_progress(&mut self, progress: impl Into<String>) -> JobResult<()> {
        if self.status != JobStatus::Running {
            return Err(JobError::NotRunning {
                id: self.id.clone(),
                status: self.status,
            });
        }
        self.progress = Some(progress.into());
        self.touch();
        Ok(())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            repo_url: self.resource_key.clone(),
            repo_type: self.kind.clone(),
            status: self.status,
            error: self.error.clone(),
            progress: self.progress.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            metadata: self.metadata.clone(),
        }
    }

    fn transition(&mut self, next: JobStatus) -> JobResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    // The wall clock may step backwards; updated_at must not.
    fn touch(&mut self) {
        self.updated_at = now_secs().max(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        let mut metadata = Metadata::new();
        metadata.insert("language".into(), serde_json::json!("en"));
        JobRecord::new("https://github.com/acme/widgets", "github", metadata)
    }

    #[test]
    fn test_new_record_is_queued() {
        let rec = record();
        assert_eq!(rec.status(), JobStatus::Queued);
        assert_eq!(rec.error(), None);
        assert_eq!(rec.progress(), None);
        assert_eq!(rec.created_at(), rec.updated_at());
        assert_eq!(rec.resource_key(), "https://github.com/acme/widgets");
        assert_eq!(rec.kind(), "github");
    }

    #[test]
    fn test_success_lifecycle() {
        let mut rec = record();
        rec.mark_running().unwrap();
        assert_eq!(rec.status(), JobStatus::Running);
        assert_eq!(rec.progress(), Some("starting"));

        rec.set_progress("embedding 3/10").unwrap();
        assert_eq!(rec.progress(), Some("embedding 3/10"));

        rec.mark_succeeded().unwrap();
        assert_eq!(rec.status(), JobStatus::Success);
        assert_eq!(rec.progress(), Some("done"));
        assert_eq!(rec.error(), None);
    }

    #[test]
    fn test_failure_lifecycle() {
        let mut rec = record();
        rec.mark_running().unwrap();
        rec.mark_failed("boom").unwrap();
        assert_eq!(rec.status(), JobStatus::Failed);
        assert_eq!(rec.error(), Some("boom"));
        assert_eq!(rec.progress(), Some("error"));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut rec = record();
        rec.mark_running().unwrap();
        rec.mark_succeeded().unwrap();
        let before = rec.snapshot();

        assert!(matches!(
            rec.mark_running(),
            Err(JobError::InvalidTransition { from: JobStatus::Success, to: JobStatus::Running, .. })
        ));
        assert!(rec.mark_failed("late").is_err());
        assert!(rec.mark_succeeded().is_err());
        assert!(matches!(rec.set_progress("again"), Err(JobError::NotRunning { .. })));
        assert_eq!(rec.snapshot(), before);
    }

    #[test]
    fn test_cannot_succeed_without_running() {
        let mut rec = record();
        assert!(rec.mark_succeeded().is_err());
        assert!(rec.set_progress("early").is_err());
        assert_eq!(rec.status(), JobStatus::Queued);
    }

    #[test]
    fn test_queued_job_can_fail_directly() {
        let mut rec = record();
        rec.mark_failed("worker pool unavailable").unwrap();
        assert_eq!(rec.status(), JobStatus::Failed);
    }

    #[test]
    fn test_updated_at_never_decreases() {
        let mut snap = record().snapshot();
        // Pretend the last write happened in the future relative to our clock.
        snap.updated_at = now_secs() + 3600.0;
        let mut rec = JobRecord::restore(snap.clone());
        rec.mark_running().unwrap();
        assert_eq!(rec.updated_at(), snap.updated_at);
        rec.set_progress("still going").unwrap();
        assert!(rec.updated_at() >= snap.updated_at);
    }

    #[test]
    fn test_restore_preserves_fields() {
        let mut rec = record();
        rec.mark_running().unwrap();
        let snap = rec.snapshot();
        let restored = JobRecord::restore(snap.clone());
        assert_eq!(restored.snapshot(), snap);
        assert_eq!(restored.status(), JobStatus::Running);
    }
}
