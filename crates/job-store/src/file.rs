// crates/job-store/src/file.rs
//! Local single-file job store.

use std::path::{Path, PathBuf};

use repo_jobs_types::JobSnapshot;

use crate::codec;
use crate::error::{StoreError, StoreResult};

/// Keeps the whole job table in one JSON file.
///
/// Every save rewrites the file: the document is written to `<path>.tmp`
/// and renamed over the target, so a reader never sees a half-written table.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved table, or an empty one if the file is missing or unreadable.
    pub async fn load(&self) -> Vec<JobSnapshot> {
        match self.try_load().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read job store file");
                Vec::new()
            }
        }
    }

    pub async fn try_load(&self) -> StoreResult<Vec<JobSnapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(codec::decode(&bytes, "file")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    pub async fn try_save(&self, snapshots: &[JobSnapshot]) -> StoreResult<()> {
        let payload = codec::encode(snapshots)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, &payload)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::io(&self.path, e));
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
