// crates/job-types/src/lib.rs
//! Shared types for the repo job manager.
//!
//! `JobSnapshot` is the one wire shape for jobs: it is what the stores
//! persist (as a JSON array) and what queries hand back to callers.

pub mod snapshot;
pub mod status;

pub use snapshot::{now_secs, JobId, JobSnapshot, Metadata};
pub use status::{JobStatus, ParseStatusError};
