//! Drives conversion jobs from request acceptance to a terminal state.
//!
//! Per job the workflow is linear:
//! 1. validate the URL and register the job (synchronous, before responding)
//! 2. start the progress simulator
//! 3. fetch metadata, store the sanitized title
//! 4. extract the audio to the job's artifact path
//! 5. stop the simulator and record `completed`, or `error` plus cleanup of
//!    partial files when any step failed

use super::models::{ConversionJob, TransitionError};
use super::progress::{ProgressSimulator, DEFAULT_TICK_INTERVAL};
use super::registry::{JobRegistry, RegistryError};
use super::storage::ArtifactStore;
use crate::extractor::{ExtractionProvider, ProviderError, Quality};
use crate::server::metrics;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Substrings identifying the supported video hosts.
pub const SUPPORTED_HOST_MARKERS: [&str; 2] = ["youtube.com", "youtu.be"];

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Invalid YouTube URL")]
    InvalidUrl,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("provider reported success but no artifact exists at {0:?}")]
    MissingArtifact(PathBuf),
}

/// Returns true if `url` points at a supported video host.
pub fn is_supported_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && SUPPORTED_HOST_MARKERS.iter().any(|m| url.contains(m))
}

pub fn validate_video_url(url: &str) -> Result<(), ConversionError> {
    if is_supported_url(url) {
        Ok(())
    } else {
        Err(ConversionError::InvalidUrl)
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub progress_tick: Duration,
    /// Overrides the provider's baseline quality when a request has none.
    pub default_quality: Option<Quality>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            progress_tick: DEFAULT_TICK_INTERVAL,
            default_quality: None,
        }
    }
}

#[derive(Clone)]
pub struct ConversionOrchestrator {
    registry: JobRegistry,
    provider: Arc<dyn ExtractionProvider>,
    store: ArtifactStore,
    settings: OrchestratorSettings,
}

impl ConversionOrchestrator {
    pub fn new(
        registry: JobRegistry,
        provider: Arc<dyn ExtractionProvider>,
        store: ArtifactStore,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            provider,
            store,
            settings,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &Arc<dyn ExtractionProvider> {
        &self.provider
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Accepts a conversion request.
    ///
    /// Returns as soon as the job is registered; the conversion itself runs on
    /// a spawned task that owns its own error handling.
    pub async fn submit(
        &self,
        url: &str,
        quality: Option<Quality>,
    ) -> Result<ConversionJob, ConversionError> {
        validate_video_url(url)?;

        let quality = quality
            .filter(|q| !q.is_empty())
            .or_else(|| self.settings.default_quality.clone())
            .unwrap_or_else(|| self.provider.default_quality());

        let job = self
            .registry
            .create(ConversionJob::new(Uuid::new_v4().to_string(), quality))
            .await?;
        info!("Created conversion job {} for {}", job.id, url);
        metrics::record_job_created();

        let simulator = ProgressSimulator::start(
            self.registry.clone(),
            job.id.clone(),
            self.settings.progress_tick,
        )
        .await;

        let orchestrator = self.clone();
        let job_id = job.id.clone();
        let url = url.trim().to_string();
        let quality = job.quality.clone();
        tokio::spawn(async move {
            orchestrator.run(job_id, url, quality, simulator).await;
        });

        Ok(self.registry.get(&job.id).await.unwrap_or(job))
    }

    /// Runs the provider calls for one job and records the outcome.
    async fn run(
        self,
        job_id: String,
        url: String,
        quality: Quality,
        simulator: ProgressSimulator,
    ) {
        let started = Instant::now();
        let outcome = self.convert(&job_id, &url, &quality).await;

        // Stop ticking before the terminal write so the two never interleave
        simulator.cancel().await;

        match outcome {
            Ok(()) => {
                match self.registry.mutate(&job_id, |job| job.complete()).await {
                    Ok(Ok(())) => {
                        info!(
                            "Conversion job {} completed in {}ms",
                            job_id,
                            started.elapsed().as_millis()
                        );
                        metrics::record_job_finished("completed", started.elapsed());
                    }
                    Ok(Err(e)) => warn!("Could not complete job {}: {}", job_id, e),
                    Err(e) => {
                        // The record was reclaimed while converting, drop the orphan file too
                        warn!("Job {} vanished before completion: {}", job_id, e);
                        self.store.remove_job_files(&job_id).await;
                        metrics::record_job_finished("reclaimed", started.elapsed());
                    }
                }
            }
            Err(e) => {
                warn!("Conversion job {} failed: {}", job_id, e);
                match self
                    .registry
                    .mutate(&job_id, |job| job.fail(e.to_string()))
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(t)) => warn!("Could not fail job {}: {}", job_id, t),
                    Err(r) => debug!("Failed job {} no longer registered: {}", job_id, r),
                }
                let removed = self.store.remove_job_files(&job_id).await;
                if removed > 0 {
                    debug!("Removed {} partial file(s) of job {}", removed, job_id);
                }
                metrics::record_job_finished("failed", started.elapsed());
            }
        }
    }

    async fn convert(
        &self,
        job_id: &str,
        url: &str,
        quality: &Quality,
    ) -> Result<(), ConversionError> {
        let info = self.provider.fetch_info(url).await?;
        self.registry
            .mutate(job_id, |job| job.record_metadata(&info.title))
            .await??;
        debug!("Job {} metadata ready: {:?}", job_id, info.title);

        let destination = self.store.artifact_path(job_id);
        self.provider
            .extract_audio(url, quality, &destination)
            .await?;

        if !self.store.artifact_exists(job_id).await {
            return Err(ConversionError::MissingArtifact(destination));
        }
        Ok(())
    }
}
