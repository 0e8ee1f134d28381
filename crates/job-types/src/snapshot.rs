// crates/job-types/src/snapshot.rs
//! Serialized form of a single job.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::JobStatus;

/// Caller-supplied job metadata. Opaque to the manager, passed through verbatim.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Unique identifier for a job.
///
/// Freshly created jobs get a UUID v4; ids restored from a store are kept
/// as whatever string was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Current wall-clock time as float seconds since the Unix epoch.
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Point-in-time copy of a job record.
///
/// Every field has a serde default so that partially written or older
/// store documents still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(default = "JobId::generate")]
    pub id: JobId,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub repo_type: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default = "now_secs")]
    pub created_at: f64,
    #[serde(default)]
    pub updated_at: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl JobSnapshot {
    /// Clamp `updated_at` so it is never earlier than `created_at`.
    ///
    /// A document without `updated_at` deserializes it as `0.0`; after
    /// normalizing it equals `created_at`.
    pub fn normalized(mut self) -> Self {
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
        }
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
