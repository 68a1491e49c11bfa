//! On-disk artifact storage.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ARTIFACT_EXTENSION: &str = "mp3";

/// Directory holding one MP3 artifact per job, named `{job_id}.mp3`.
///
/// Several components delete from this directory concurrently, so every
/// removal treats "already gone" as success.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the storage directory if needed.
    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn artifact_path(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", job_id, ARTIFACT_EXTENSION))
    }

    /// Job id owning a file in the storage directory: everything before the
    /// first dot of the file name.
    pub fn job_id_for(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let id = name.split('.').next()?;
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }

    pub async fn artifact_exists(&self, job_id: &str) -> bool {
        tokio::fs::try_exists(self.artifact_path(job_id))
            .await
            .unwrap_or(false)
    }

    /// Removes the artifact of `job_id`. Returns whether a file was deleted.
    pub async fn remove_artifact(&self, job_id: &str) -> io::Result<bool> {
        remove_if_present(&self.artifact_path(job_id)).await
    }

    /// Removes the artifact and any intermediate file left behind for `job_id`.
    ///
    /// Errors are logged per file; the number of removed files is returned.
    pub async fn remove_job_files(&self, job_id: &str) -> usize {
        let prefix = format!("{}.", job_id);
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Failed to read artifact directory {:?}: {}", self.root, e);
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    break;
                }
            };
            let matches = entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            match remove_if_present(&entry.path()).await {
                Ok(true) => {
                    debug!("Removed {:?}", entry.path());
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to remove {:?}: {}", entry.path(), e),
            }
        }
        removed
    }
}

pub(crate) async fn remove_if_present(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
