// crates/jobs/src/config.rs
//! Manager configuration, normally built once by the owning process.

use std::path::PathBuf;

use repo_jobs_store::StoreConfig;

/// Upper bound for the derived default pool size.
const DEFAULT_MAX_WORKERS_CAP: usize = 8;
/// Parallelism assumed when the platform cannot report it.
const FALLBACK_PARALLELISM: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobManagerConfig {
    /// Number of worker tasks. Always at least 1.
    pub max_workers: usize,
    pub store: StoreConfig,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            store: StoreConfig::default(),
        }
    }
}

impl JobManagerConfig {
    /// Read `MAX_JOB_WORKERS` plus the store variables (see [`StoreConfig::from_env`]).
    pub fn from_env() -> Self {
        let max_workers = match std::env::var("MAX_JOB_WORKERS") {
            Ok(raw) if raw.trim().is_empty() => default_max_workers(),
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(v) if v > 0 => v,
                _ => {
                    tracing::warn!(
                        env_var = "MAX_JOB_WORKERS",
                        value = %raw,
                        "invalid worker count; using default"
                    );
                    default_max_workers()
                }
            },
            Err(_) => default_max_workers(),
        };
        Self {
            max_workers,
            store: StoreConfig::from_env(),
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.store = self.store.with_redis_url(url);
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = self.store.with_file_path(path);
        self
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

/// Twice the available parallelism, capped at 8.
pub fn default_max_workers() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_PARALLELISM);
    (parallelism * 2).min(DEFAULT_MAX_WORKERS_CAP)
}
