//! Data models for conversion jobs.
//!
//! Defines the job record, its status, and the transitions allowed between them.

use crate::extractor::Quality;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;

/// Title shown until metadata has been retrieved.
pub const PLACEHOLDER_TITLE: &str = "Processing...";

/// Title used when sanitizing leaves nothing behind.
pub const FALLBACK_TITLE: &str = "audio";

/// Progress set when a job starts.
pub const INITIAL_PROGRESS: u8 = 5;

/// Progress reached once metadata has been retrieved.
pub const METADATA_READY_PROGRESS: u8 = 20;

/// Highest progress a job can show before it is confirmed complete.
pub const PROGRESS_CEILING: u8 = 90;

pub const COMPLETE_PROGRESS: u8 = 100;

/// Status of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed, // terminal
    Error,     // terminal
}

impl JobStatus {
    /// Returns true if this is a terminal state (Completed or Error).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("job {id} is already {status}")]
    AlreadyTerminal { id: String, status: JobStatus },
}

/// Result of a single progress tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Progress moved to the contained value.
    Advanced(u8),
    /// Progress is at the ceiling, nothing to do until the job finishes.
    Holding,
    /// The job is terminal, the ticker must stop.
    Finished,
}

/// A single conversion request's tracked lifecycle state.
///
/// This is also the body of the status endpoint, so anything internal is
/// skipped during serialization.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    pub id: String,
    pub status: JobStatus,
    pub title: String,
    pub quality: Quality,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the job reached a terminal state.
    #[serde(skip)]
    pub finished_at: Option<SystemTime>,
}

impl ConversionJob {
    pub fn new(id: impl Into<String>, quality: Quality) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Processing,
            title: PLACEHOLDER_TITLE.to_string(),
            quality,
            progress: 0,
            error: None,
            finished_at: None,
        }
    }

    /// Raises progress to `value`, never lowering it and never going past the
    /// ceiling. No-op once terminal.
    fn raise_progress(&mut self, value: u8) {
        if self.status.is_terminal() {
            return;
        }
        self.progress = self.progress.max(value.min(PROGRESS_CEILING));
    }

    pub fn start_progress(&mut self) {
        self.raise_progress(INITIAL_PROGRESS);
    }

    /// Applies one simulated progress tick of `increment` percent.
    pub fn tick_progress(&mut self, increment: f64) -> TickOutcome {
        if self.status.is_terminal() {
            return TickOutcome::Finished;
        }
        if self.progress >= PROGRESS_CEILING {
            return TickOutcome::Holding;
        }
        let next = (self.progress as f64 + increment.max(0.0)).min(PROGRESS_CEILING as f64);
        self.raise_progress(next.floor() as u8);
        TickOutcome::Advanced(self.progress)
    }

    /// Stores the sanitized title and marks the metadata phase as done.
    pub fn record_metadata(&mut self, raw_title: &str) -> Result<(), TransitionError> {
        self.ensure_processing()?;
        self.title = sanitize_title(raw_title);
        self.raise_progress(METADATA_READY_PROGRESS);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.ensure_processing()?;
        self.status = JobStatus::Completed;
        self.progress = COMPLETE_PROGRESS;
        self.finished_at = Some(SystemTime::now());
        Ok(())
    }

    /// Moves the job to `error`, keeping progress where it was.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_processing()?;
        self.status = JobStatus::Error;
        self.error = Some(message.into());
        self.finished_at = Some(SystemTime::now());
        Ok(())
    }

    fn ensure_processing(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Strips everything but letters, digits, underscores and whitespace so the
/// title can be used as a file name.
pub fn sanitize_title(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        collapsed
    }
}
