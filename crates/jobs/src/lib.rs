// crates/jobs/src/lib.rs
//! Background job execution for repository processing.
//!
//! Provides:
//! - `JobManager`: bounded worker pool with per-resource serialization
//! - `JobTable`: the mutex-guarded job table, mirrored to a `JobStore`
//! - `ResourceLockRegistry`: one lock per resource key
//! - `JobContext`: handle a running task uses to post progress
//!
//! Jobs restored from the store in the `running` state are left as they are;
//! nothing is resumed after a restart.

pub mod config;
pub mod context;
pub mod error;
pub mod locks;
pub mod manager;
pub mod metrics;
mod persist;
pub mod record;
pub mod table;

pub use config::{default_max_workers, JobManagerConfig};
pub use context::JobContext;
pub use error::{JobError, JobResult};
pub use locks::ResourceLockRegistry;
pub use manager::{JobManager, POOL_UNAVAILABLE};
pub use record::JobRecord;
pub use table::JobTable;

pub use repo_jobs_store::{FileStore, JobStore, RedisStore, StoreConfig};
pub use repo_jobs_types::{JobId, JobSnapshot, JobStatus, Metadata};
