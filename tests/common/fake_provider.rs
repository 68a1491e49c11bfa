//! In-process stand-in for the yt-dlp provider.

use super::constants::*;
use async_trait::async_trait;
use mp3_converter_server::extractor::{ExtractionProvider, ProviderError, Quality, VideoInfo};
use serde_json::json;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Provider with scripted outcomes.
///
/// Successful extractions write [`FAKE_MP3_BYTES`] to the destination. Every
/// quality it was asked for is recorded so tests can check forwarding.
pub struct FakeProvider {
    pub fail_info: bool,
    pub fail_extract: bool,
    pub extract_delay: Duration,
    pub qualities: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new() -> Self {
        Self {
            fail_info: false,
            fail_extract: false,
            extract_delay: Duration::ZERO,
            qualities: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_info() -> Self {
        Self {
            fail_info: true,
            ..Self::new()
        }
    }

    pub fn failing_extract() -> Self {
        Self {
            fail_extract: true,
            ..Self::new()
        }
    }

    pub fn slow(extract_delay: Duration) -> Self {
        Self {
            extract_delay,
            ..Self::new()
        }
    }

    pub fn recorded_qualities(&self) -> Vec<String> {
        self.qualities.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn default_quality(&self) -> Quality {
        Quality::new("192")
    }

    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, ProviderError> {
        if self.fail_info {
            return Err(ProviderError::ToolFailed {
                tool: "fake".to_string(),
                status: "1".to_string(),
                message: "ERROR: Video unavailable".to_string(),
            });
        }
        Ok(VideoInfo {
            title: FAKE_VIDEO_TITLE.to_string(),
            raw: json!({
                "title": FAKE_VIDEO_TITLE,
                "duration": FAKE_VIDEO_DURATION,
                "webpage_url": url,
            }),
        })
    }

    async fn extract_audio(
        &self,
        _url: &str,
        quality: &Quality,
        destination: &Path,
    ) -> Result<(), ProviderError> {
        self.qualities
            .lock()
            .unwrap()
            .push(quality.as_str().to_string());
        tokio::time::sleep(self.extract_delay).await;

        if self.fail_extract {
            tokio::fs::write(destination.with_extension("webm.part"), b"partial").await?;
            return Err(ProviderError::ToolFailed {
                tool: "fake".to_string(),
                status: "1".to_string(),
                message: "ERROR: Postprocessing failed".to_string(),
            });
        }
        tokio::fs::write(destination, FAKE_MP3_BYTES).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
