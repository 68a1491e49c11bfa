//! Extraction provider abstraction.
//!
//! The provider is the external collaborator that knows how to read metadata
//! for a video URL and how to turn that video's audio track into an MP3 file.
//! Everything else in the crate only talks to it through [`ExtractionProvider`].

mod ytdlp;

pub use ytdlp::{YtDlpProvider, YtDlpSettings};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Requested audio quality.
///
/// Opaque to everything but the provider: clients may send it either as a
/// JSON string (`"192"`, `"320K"`) or a number (`5`), and it is forwarded as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "QualityValue")]
pub struct Quality(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum QualityValue {
    Text(String),
    Number(serde_json::Number),
}

impl From<QualityValue> for Quality {
    fn from(value: QualityValue) -> Self {
        match value {
            QualityValue::Text(s) => Quality(s.trim().to_string()),
            QualityValue::Number(n) => Quality(n.to_string()),
        }
    }
}

impl Quality {
    pub fn new(value: impl Into<String>) -> Self {
        Quality(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata returned by the provider for a video URL.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    /// Display title, unsanitized.
    pub title: String,
    /// The provider's raw metadata document.
    pub raw: serde_json::Value,
}

/// Errors that can occur while talking to the extraction provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with status {status}: {message}")]
    ToolFailed {
        tool: String,
        status: String,
        message: String,
    },

    #[error("invalid provider output: {0}")]
    InvalidOutput(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for extraction providers.
///
/// Calls are long-running (tens of seconds to minutes) and are never
/// cancelled by the caller once issued.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Short provider name, used in logs and the status document.
    fn name(&self) -> &str;

    /// Quality used when a request does not specify one.
    fn default_quality(&self) -> Quality;

    /// Retrieve metadata for `url`.
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, ProviderError>;

    /// Extract the audio track of `url` as an MP3 written at `destination`.
    async fn extract_audio(
        &self,
        url: &str,
        quality: &Quality,
        destination: &Path,
    ) -> Result<(), ProviderError>;

    /// Check that the provider is usable.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
