//! Periodic reclamation of stale artifacts and job records.
//!
//! Jobs whose clients never download the result would otherwise keep their
//! MP3 on disk and their record in memory forever. The sweeper runs at a fixed
//! interval and removes:
//! - files in the artifact directory older than the retention threshold, along
//!   with the job they belong to
//! - failed jobs that finished longer ago than the threshold, which never have
//!   an artifact to trigger the first rule

use super::models::JobStatus;
use super::registry::JobRegistry;
use super::storage::{remove_if_present, ArtifactStore};
use crate::server::metrics;
use std::io;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct RetentionSettings {
    pub sweep_interval: Duration,
    pub max_age: Duration,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

/// Counters of a single sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted_files: usize,
    pub deleted_jobs: usize,
    pub skipped_young: usize,
    pub errors: usize,
}

#[derive(Clone)]
pub struct RetentionSweeper {
    registry: JobRegistry,
    store: ArtifactStore,
    settings: RetentionSettings,
}

impl RetentionSweeper {
    pub fn new(registry: JobRegistry, store: ArtifactStore, settings: RetentionSettings) -> Self {
        Self {
            registry,
            store,
            settings,
        }
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now()).await
    }

    /// Runs one sweep as if the current time were `now`.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();
        self.sweep_files(now, &mut report).await;
        self.sweep_failed_jobs(now, &mut report).await;

        if report.deleted_files > 0 || report.deleted_jobs > 0 || report.errors > 0 {
            info!(
                "Retention sweep: scanned={}, deleted_files={}, deleted_jobs={}, skipped_young={}, errors={}",
                report.scanned,
                report.deleted_files,
                report.deleted_jobs,
                report.skipped_young,
                report.errors
            );
        } else {
            debug!(
                "Retention sweep: scanned={}, nothing to reclaim",
                report.scanned
            );
        }
        report
    }

    async fn sweep_files(&self, now: SystemTime, report: &mut SweepReport) {
        let root = self.store.root();
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Artifact directory does not exist: {:?}", root);
                return;
            }
            Err(e) => {
                error!("Failed to read artifact directory {:?}: {}", root, e);
                report.errors += 1;
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    report.errors += 1;
                    break;
                }
            };
            let path = entry.path();

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Reclaimed by someone else between listing and inspecting
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Failed to stat {:?}: {}", path, e);
                    report.errors += 1;
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            report.scanned += 1;

            let age = match metadata.modified() {
                // A modification time in the future counts as age zero
                Ok(modified) => now.duration_since(modified).unwrap_or(Duration::ZERO),
                Err(e) => {
                    warn!("Failed to read modification time of {:?}: {}", path, e);
                    report.errors += 1;
                    continue;
                }
            };
            if age <= self.settings.max_age {
                report.skipped_young += 1;
                continue;
            }

            match remove_if_present(&path).await {
                Ok(true) => {
                    debug!("Deleted stale artifact {:?} (age {}s)", path, age.as_secs());
                    report.deleted_files += 1;
                    metrics::record_artifact_reclaimed("retention");
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to delete {:?}: {}", path, e);
                    report.errors += 1;
                    continue;
                }
            }

            if let Some(job_id) = ArtifactStore::job_id_for(&path) {
                if self.registry.delete(&job_id).await.is_some() {
                    debug!("Deleted job {} with its stale artifact", job_id);
                    report.deleted_jobs += 1;
                }
            }
        }
    }

    async fn sweep_failed_jobs(&self, now: SystemTime, report: &mut SweepReport) {
        let max_age = self.settings.max_age;
        let stale: Vec<String> = self
            .registry
            .list_all()
            .await
            .into_iter()
            .filter(|job| job.status == JobStatus::Error)
            .filter(|job| {
                job.finished_at
                    .and_then(|at| now.duration_since(at).ok())
                    .map(|age| age > max_age)
                    .unwrap_or(false)
            })
            .map(|job| job.id)
            .collect();

        for job_id in stale {
            if self.registry.delete(&job_id).await.is_some() {
                debug!("Deleted stale failed job {}", job_id);
                report.deleted_jobs += 1;
            }
        }
    }

    /// Runs a sweep every interval until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        info!(
            "Starting retention sweeper (interval={}s, max_age={}s)",
            self.settings.sweep_interval.as_secs(),
            self.settings.max_age.as_secs()
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.settings.sweep_interval);
            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Retention sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }
        })
    }
}
