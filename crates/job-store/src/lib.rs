// crates/job-store/src/lib.rs
//! Durable storage for the job table.
//!
//! Both backends store the whole table as one JSON array of
//! [`JobSnapshot`]s and overwrite it on every save, so a document written
//! by one backend can be copied verbatim into the other.
//!
//! Persistence is best effort: `load` never fails (it degrades to an empty
//! table) and callers are expected to log and drop `try_save` errors.

pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod redis_store;

pub use config::{default_file_path, StoreConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REDIS_KEY};
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use redis_store::RedisStore;

use repo_jobs_types::JobSnapshot;

/// The configured persistence backend.
#[derive(Debug)]
pub enum JobStore {
    File(FileStore),
    Redis(RedisStore),
}

impl JobStore {
    /// Pick a backend for `config`.
    ///
    /// A Redis URL that fails to open or does not answer `PING` within
    /// `connect_timeout` falls back to the file backend with a warning.
    pub async fn from_config(config: &StoreConfig) -> Self {
        if let Some(url) = config.redis_url.as_deref() {
            match RedisStore::connect(url, config.redis_key.clone(), config.connect_timeout).await {
                Ok(store) => {
                    tracing::info!(key = %config.redis_key, "using redis job store");
                    return Self::Redis(store);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %config.file_path.display(),
                        "redis job store unavailable; falling back to file store"
                    );
                }
            }
        }
        tracing::info!(path = %config.file_path.display(), "using file job store");
        Self::File(FileStore::new(config.file_path.clone()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Redis(_) => "redis",
        }
    }

    pub async fn load(&self) -> Vec<JobSnapshot> {
        match self {
            Self::File(store) => store.load().await,
            Self::Redis(store) => store.load().await,
        }
    }

    pub async fn try_save(&self, snapshots: &[JobSnapshot]) -> StoreResult<()> {
        match self {
            Self::File(store) => store.try_save(snapshots).await,
            Self::Redis(store) => store.try_save(snapshots).await,
        }
    }

    /// Save the table, logging and discarding any failure.
    pub async fn save(&self, snapshots: &[JobSnapshot]) {
        if let Err(e) = self.try_save(snapshots).await {
            tracing::warn!(backend = self.name(), error = %e, "failed to persist job table");
        }
    }
}

impl From<FileStore> for JobStore {
    fn from(store: FileStore) -> Self {
        Self::File(store)
    }
}

impl From<RedisStore> for JobStore {
    fn from(store: RedisStore) -> Self {
        Self::Redis(store)
    }
}
