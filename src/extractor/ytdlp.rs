//! Extraction provider backed by the `yt-dlp` command line tool.

use super::{ExtractionProvider, ProviderError, Quality, VideoInfo};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Quality handed to yt-dlp when the client does not ask for one.
pub const DEFAULT_QUALITY: &str = "192";

const TOOL_NAME: &str = "yt-dlp";

#[derive(Debug, Clone)]
pub struct YtDlpSettings {
    /// Path or name of the yt-dlp executable.
    pub binary: PathBuf,
    /// Forwarded as `--ffmpeg-location` when set.
    pub ffmpeg_location: Option<PathBuf>,
    /// Upper bound for a single yt-dlp invocation.
    pub timeout: Option<Duration>,
}

impl Default for YtDlpSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(TOOL_NAME),
            ffmpeg_location: None,
            timeout: None,
        }
    }
}

pub struct YtDlpProvider {
    settings: YtDlpSettings,
}

impl YtDlpProvider {
    pub fn new(settings: YtDlpSettings) -> Self {
        Self { settings }
    }

    async fn run(&self, args: Vec<OsString>) -> Result<Output, ProviderError> {
        debug!("Running {:?} {:?}", self.settings.binary, args);

        let mut command = Command::new(&self.settings.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.settings.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| ProviderError::Timeout(limit))?,
            None => command.output().await,
        }
        .map_err(|source| ProviderError::Launch {
            tool: TOOL_NAME.to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(ProviderError::ToolFailed {
                tool: TOOL_NAME.to_string(),
                status: output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                message: summarize_stderr(&output.stderr),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl ExtractionProvider for YtDlpProvider {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn default_quality(&self) -> Quality {
        Quality::new(DEFAULT_QUALITY)
    }

    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, ProviderError> {
        let args = vec![
            OsString::from("--dump-single-json"),
            OsString::from("--no-warnings"),
            OsString::from("--no-playlist"),
            OsString::from(url),
        ];
        let output = self.run(args).await?;
        parse_video_info(&output.stdout)
    }

    async fn extract_audio(
        &self,
        url: &str,
        quality: &Quality,
        destination: &Path,
    ) -> Result<(), ProviderError> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = extract_args(
            url,
            quality,
            destination,
            self.settings.ffmpeg_location.as_deref(),
        );
        self.run(args).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let output = self.run(vec![OsString::from("--version")]).await?;
        debug!(
            "{} version {}",
            TOOL_NAME,
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

/// Builds the yt-dlp arguments for extracting `url` into `destination`.
///
/// `--no-mtime` keeps the artifact's mtime at its creation time; the retention
/// sweeper ages files by mtime.
fn extract_args(
    url: &str,
    quality: &Quality,
    destination: &Path,
    ffmpeg_location: Option<&Path>,
) -> Vec<OsString> {
    // yt-dlp picks the final extension itself after post-processing.
    let template = destination.with_extension("%(ext)s");

    let mut args = vec![
        OsString::from("--no-playlist"),
        OsString::from("--no-warnings"),
        OsString::from("--no-mtime"),
        OsString::from("--extract-audio"),
        OsString::from("--audio-format"),
        OsString::from("mp3"),
        OsString::from("--audio-quality"),
        OsString::from(audio_quality_arg(quality)),
        OsString::from("--output"),
        template.into_os_string(),
    ];
    if let Some(ffmpeg) = ffmpeg_location {
        args.push(OsString::from("--ffmpeg-location"));
        args.push(ffmpeg.as_os_str().to_os_string());
    }
    args.push(OsString::from(url));
    args
}

/// Maps the opaque quality hint to yt-dlp's `--audio-quality` argument.
///
/// `0..=9` is yt-dlp's VBR scale, bigger numbers are bitrates in kbps.
fn audio_quality_arg(quality: &Quality) -> String {
    let value = quality.as_str();
    if value.is_empty() {
        return DEFAULT_QUALITY.to_string() + "K";
    }
    match value.parse::<u32>() {
        Ok(n) if n <= 9 => n.to_string(),
        Ok(n) => format!("{}K", n),
        Err(_) => value.to_string(),
    }
}

fn parse_video_info(stdout: &[u8]) -> Result<VideoInfo, ProviderError> {
    let raw: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| ProviderError::InvalidOutput(format!("JSON parse error: {}", e)))?;

    let title = raw
        .get("title")
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| ProviderError::InvalidOutput("metadata has no title".to_string()))?;

    Ok(VideoInfo { title, raw })
}

/// Keeps the `ERROR:` lines yt-dlp prints, or the last line when there are none.
fn summarize_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let errors: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .collect();

    if !errors.is_empty() {
        return errors.join("; ");
    }

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("no output")
        .to_string()
}
