// crates/job-store/src/error.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a job store backend.
///
/// These never reach `JobManager` callers: `load` coerces them to an empty
/// table and the persistence writer logs and drops them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on job store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize job table: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Timed out after {timeout:?} connecting to redis")]
    ConnectTimeout { timeout: Duration },

    #[error("Redis connection unavailable")]
    ConnectionUnavailable,
}

impl StoreError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
