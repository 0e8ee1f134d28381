// crates/job-store/src/config.rs
//! Store selection and location.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REDIS_KEY: &str = "job_store";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

const STORE_DIR: &str = ".adalflow";
const STORE_FILE: &str = "job_store.json";

/// Where the job table is persisted.
///
/// A configured `redis_url` selects the Redis backend; otherwise (or if
/// Redis cannot be reached at startup) the table lives in `file_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub redis_url: Option<String>,
    pub redis_key: String,
    pub file_path: PathBuf,
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_key: DEFAULT_REDIS_KEY.to_string(),
            file_path: default_file_path(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// Read `REDIS_URL`, `JOB_STORE_KEY` and `JOB_STORE_PATH`.
    ///
    /// Unset or blank variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: env_non_empty("REDIS_URL"),
            redis_key: env_non_empty("JOB_STORE_KEY").unwrap_or(defaults.redis_key),
            file_path: env_non_empty("JOB_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
            connect_timeout: defaults.connect_timeout,
        }
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    pub fn with_redis_key(mut self, key: impl Into<String>) -> Self {
        self.redis_key = key.into();
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = path.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// `~/.adalflow/job_store.json`, or `./job_store.json` when there is no home directory.
pub fn default_file_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(STORE_DIR).join(STORE_FILE),
        None => {
            tracing::warn!("no home directory; job store falls back to the working directory");
            PathBuf::from(STORE_FILE)
        }
    }
}

pub(crate) fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
