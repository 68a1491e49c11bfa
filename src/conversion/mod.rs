//! Conversion job lifecycle.
//!
//! Jobs live in the [`JobRegistry`] from the moment a request is accepted.
//! The [`ConversionOrchestrator`] drives them to a terminal state while a
//! [`ProgressSimulator`] reports approximate progress. Artifacts are reclaimed
//! either by the [`DownloadFinalizer`] shortly after a download or by the
//! [`RetentionSweeper`] once they get too old, whichever comes first.

mod finalizer;
mod models;
mod orchestrator;
mod progress;
mod registry;
mod retention;
mod storage;

pub use finalizer::{CleanupGuard, Download, DownloadError, DownloadFinalizer, DEFAULT_DOWNLOAD_GRACE};
pub use models::{
    sanitize_title, ConversionJob, JobStatus, TickOutcome, TransitionError, COMPLETE_PROGRESS,
    FALLBACK_TITLE, INITIAL_PROGRESS, METADATA_READY_PROGRESS, PLACEHOLDER_TITLE,
    PROGRESS_CEILING,
};
pub use orchestrator::{
    is_supported_url, validate_video_url, ConversionError, ConversionOrchestrator,
    OrchestratorSettings, SUPPORTED_HOST_MARKERS,
};
pub use progress::{tick, ProgressSimulator, DEFAULT_TICK_INTERVAL, MAX_TICK_INCREMENT};
pub use registry::{JobRegistry, RegistryError};
pub use retention::{
    RetentionSettings, RetentionSweeper, SweepReport, DEFAULT_MAX_AGE, DEFAULT_SWEEP_INTERVAL,
};
pub use storage::{ArtifactStore, ARTIFACT_EXTENSION};
