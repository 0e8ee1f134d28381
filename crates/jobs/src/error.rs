// crates/jobs/src/error.rs
use repo_jobs_types::{JobId, JobStatus};
use thiserror::Error;

/// Errors from mutating a job record.
///
/// The manager treats all of these as bookkeeping conditions to log; none
/// of them are surfaced to the code that submitted the job.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    UnknownJob(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {id} is {status}, progress can only be posted while running")]
    NotRunning { id: JobId, status: JobStatus },
}

pub type JobResult<T> = Result<T, JobError>;
