mod file_config;

pub use file_config::{ConversionConfig, FileConfig, ProviderConfig, RetentionConfig};

use crate::conversion::{OrchestratorSettings, RetentionSettings};
use crate::extractor::{Quality, YtDlpSettings};
use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub bind_address: String,
    pub logging_level: RequestsLoggingLevel,
    pub downloads_dir: PathBuf,
    pub frontend_dir_path: Option<String>,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_location: Option<PathBuf>,
    pub provider_timeout_sec: u64,
    pub sweep_interval_sec: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            metrics_port: 9092,
            bind_address: "0.0.0.0".to_string(),
            logging_level: RequestsLoggingLevel::Path,
            downloads_dir: PathBuf::from("downloads"),
            frontend_dir_path: None,
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
            provider_timeout_sec: 0,
            sweep_interval_sec: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub port: u16,
    pub metrics_port: u16,
    pub bind_address: String,
    pub logging_level: RequestsLoggingLevel,
    pub downloads_dir: PathBuf,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub provider: ProviderSettings,
    pub conversion: ConversionSettings,
    pub retention: RetentionPolicy,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub ytdlp_path: PathBuf,
    pub ffmpeg_location: Option<PathBuf>,
    /// 0 disables the timeout.
    pub timeout_sec: u64,
}

impl ProviderSettings {
    pub fn to_ytdlp_settings(&self) -> YtDlpSettings {
        YtDlpSettings {
            binary: self.ytdlp_path.clone(),
            ffmpeg_location: self.ffmpeg_location.clone(),
            timeout: (self.timeout_sec > 0).then(|| Duration::from_secs(self.timeout_sec)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversionSettings {
    pub default_quality: Option<String>,
    pub progress_tick_ms: u64,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            default_quality: None,
            progress_tick_ms: 1000,
        }
    }
}

impl ConversionSettings {
    pub fn to_orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            progress_tick: Duration::from_millis(self.progress_tick_ms),
            default_quality: self.default_quality.clone().map(Quality::new),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub sweep_interval_secs: u64,
    pub max_age_secs: u64,
    pub download_grace_secs: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            max_age_secs: 3600,
            download_grace_secs: 30,
        }
    }
}

impl RetentionPolicy {
    pub fn to_retention_settings(&self) -> RetentionSettings {
        RetentionSettings {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_age: Duration::from_secs(self.max_age_secs),
        }
    }

    pub fn download_grace(&self) -> Duration {
        Duration::from_secs(self.download_grace_secs)
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port {
            bail!("port and metrics_port must differ (both are {})", port);
        }
        let bind_address = file
            .bind_address
            .unwrap_or_else(|| cli.bind_address.clone());

        let logging_level = match file.logging_level {
            Some(s) => match parse_logging_level(&s) {
                Some(level) => level,
                None => bail!("Invalid logging_level in config file: {:?}", s),
            },
            None => cli.logging_level.clone(),
        };

        let downloads_dir = file
            .downloads_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.downloads_dir.clone());
        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let provider_file = file.provider.unwrap_or_default();
        let provider = ProviderSettings {
            ytdlp_path: provider_file
                .ytdlp_path
                .map(PathBuf::from)
                .unwrap_or_else(|| cli.ytdlp_path.clone()),
            ffmpeg_location: provider_file
                .ffmpeg_location
                .map(PathBuf::from)
                .or_else(|| cli.ffmpeg_location.clone()),
            timeout_sec: provider_file.timeout_sec.unwrap_or(cli.provider_timeout_sec),
        };

        let conversion_file = file.conversion.unwrap_or_default();
        let conversion_defaults = ConversionSettings::default();
        let conversion = ConversionSettings {
            default_quality: conversion_file
                .default_quality
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
            progress_tick_ms: conversion_file
                .progress_tick_ms
                .unwrap_or(conversion_defaults.progress_tick_ms),
        };

        let retention_file = file.retention.unwrap_or_default();
        let retention_defaults = RetentionPolicy::default();
        let retention = RetentionPolicy {
            sweep_interval_secs: retention_file
                .sweep_interval_secs
                .unwrap_or(cli.sweep_interval_sec),
            max_age_secs: retention_file
                .max_age_secs
                .unwrap_or(retention_defaults.max_age_secs),
            download_grace_secs: retention_file
                .download_grace_secs
                .unwrap_or(retention_defaults.download_grace_secs),
        };

        if conversion.progress_tick_ms == 0 {
            bail!("progress_tick_ms must be greater than 0");
        }
        if retention.sweep_interval_secs == 0 {
            bail!("sweep_interval_secs must be greater than 0");
        }
        if retention.max_age_secs == 0 {
            bail!("max_age_secs must be greater than 0");
        }
        if retention.download_grace_secs == 0 {
            bail!("download_grace_secs must be greater than 0");
        }

        Ok(Self {
            port,
            metrics_port,
            bind_address,
            logging_level,
            downloads_dir,
            frontend_dir_path,
            provider,
            conversion,
            retention,
        })
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            bind_address: self.bind_address.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            frontend_dir_path: self.frontend_dir_path.clone(),
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
