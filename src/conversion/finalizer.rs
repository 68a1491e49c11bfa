//! Serving finished artifacts and reclaiming them afterwards.
//!
//! Once a client has fetched a job's MP3, the file and the job record are
//! deleted after a short grace period so interrupted transfers can be retried.

use super::models::{ConversionJob, JobStatus};
use super::registry::JobRegistry;
use super::storage::{ArtifactStore, ARTIFACT_EXTENSION};
use crate::server::metrics;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tracing::{debug, info, warn};

pub const DEFAULT_DOWNLOAD_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Job not found")]
    UnknownJob,

    #[error("File not ready or not found")]
    NotCompleted(JobStatus),

    #[error("File not found")]
    ArtifactMissing,

    #[error("Failed to open artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// True for the variants a client should see as "not found".
    pub fn is_not_found(&self) -> bool {
        !matches!(self, DownloadError::Io(_))
    }
}

/// An opened artifact ready to be streamed.
///
/// Holds a [`CleanupGuard`]: when the download value (or the response body it
/// was moved into) is dropped, the delayed deletion is scheduled.
pub struct Download {
    pub job: ConversionJob,
    pub file: File,
    pub len: u64,
    pub guard: CleanupGuard,
}

impl Download {
    /// File name offered to the client, built from the sanitized title.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.job.title, ARTIFACT_EXTENSION)
    }
}

#[derive(Clone)]
pub struct DownloadFinalizer {
    registry: JobRegistry,
    store: ArtifactStore,
    grace: Duration,
    scheduled: Arc<Mutex<HashSet<String>>>,
}

impl DownloadFinalizer {
    pub fn new(registry: JobRegistry, store: ArtifactStore, grace: Duration) -> Self {
        Self {
            registry,
            store,
            grace,
            scheduled: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Opens the artifact of a completed job.
    pub async fn open(&self, job_id: &str) -> Result<Download, DownloadError> {
        let job = self
            .registry
            .get(job_id)
            .await
            .ok_or(DownloadError::UnknownJob)?;
        if job.status != JobStatus::Completed {
            return Err(DownloadError::NotCompleted(job.status));
        }

        let path = self.store.artifact_path(job_id);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Job {} is completed but {:?} is missing", job_id, path);
                return Err(DownloadError::ArtifactMissing);
            }
            Err(e) => return Err(DownloadError::Io(e)),
        };
        let len = file.metadata().await?.len();

        debug!("Serving {:?} for job {}", path, job_id);
        Ok(Download {
            job,
            file,
            len,
            guard: CleanupGuard {
                finalizer: self.clone(),
                job_id: job_id.to_string(),
            },
        })
    }

    /// Schedules deletion of the artifact and job record after the grace period.
    ///
    /// Returns false when a deletion for this job is already pending.
    pub fn schedule_cleanup(&self, job_id: &str) -> bool {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No runtime available to clean up job {}", job_id);
                return false;
            }
        };

        {
            let mut scheduled = self
                .scheduled
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !scheduled.insert(job_id.to_string()) {
                return false;
            }
        }

        debug!(
            "Job {} will be cleaned up in {}s",
            job_id,
            self.grace.as_secs()
        );
        let finalizer = self.clone();
        let job_id = job_id.to_string();
        handle.spawn(async move {
            tokio::time::sleep(finalizer.grace).await;
            finalizer.cleanup(&job_id).await;
        });
        true
    }

    async fn cleanup(&self, job_id: &str) {
        match self.store.remove_artifact(job_id).await {
            Ok(true) => metrics::record_artifact_reclaimed("download"),
            Ok(false) => debug!("Artifact of job {} was already gone", job_id),
            Err(e) => warn!("Failed to delete artifact of job {}: {}", job_id, e),
        }
        if self.registry.delete(job_id).await.is_some() {
            info!("Cleaned up downloaded job {}", job_id);
        }
        self.scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id);
    }

    pub fn is_cleanup_pending(&self, job_id: &str) -> bool {
        self.scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(job_id)
    }
}

/// Schedules the delayed cleanup of a job when dropped, whether the transfer
/// finished or was interrupted.
pub struct CleanupGuard {
    finalizer: DownloadFinalizer,
    job_id: String,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.finalizer.schedule_cleanup(&self.job_id);
    }
}
