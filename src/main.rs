use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mp3_converter_server::config;
use mp3_converter_server::conversion::{
    ArtifactStore, ConversionOrchestrator, DownloadFinalizer, JobRegistry, RetentionSweeper,
};
use mp3_converter_server::extractor::{ExtractionProvider, YtDlpProvider};
use mp3_converter_server::server::{metrics, run_server, RequestsLoggingLevel, ServerState};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,

    /// The address both servers bind to.
    #[clap(long, default_value = "0.0.0.0")]
    pub bind_address: String,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Directory where converted MP3 files are stored. Created if missing.
    #[clap(long, value_parser = parse_path, default_value = "downloads")]
    pub downloads_dir: PathBuf,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// The yt-dlp executable.
    #[clap(long, default_value = "yt-dlp")]
    pub ytdlp_path: PathBuf,

    /// Directory or binary of ffmpeg, forwarded to yt-dlp.
    #[clap(long)]
    pub ffmpeg_location: Option<PathBuf>,

    /// Timeout in seconds for a single yt-dlp call. 0 disables the timeout.
    #[clap(long, default_value_t = 0)]
    pub provider_timeout_sec: u64,

    /// Interval in seconds between retention sweeps of the downloads directory.
    #[clap(long, default_value_t = 60)]
    pub sweep_interval_sec: u64,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            port: args.port,
            metrics_port: args.metrics_port,
            bind_address: args.bind_address.clone(),
            logging_level: args.logging_level.clone(),
            downloads_dir: args.downloads_dir.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            ytdlp_path: args.ytdlp_path.clone(),
            ffmpeg_location: args.ffmpeg_location.clone(),
            provider_timeout_sec: args.provider_timeout_sec,
            sweep_interval_sec: args.sweep_interval_sec,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  downloads_dir: {:?}", app_config.downloads_dir);
    info!("  port: {}", app_config.port);
    info!("  yt-dlp: {:?}", app_config.provider.ytdlp_path);

    info!("Initializing metrics...");
    metrics::init_metrics();

    let store = ArtifactStore::new(app_config.downloads_dir.clone());
    store
        .ensure_root()
        .await
        .with_context(|| format!("Failed to create {:?}", app_config.downloads_dir))?;

    let provider: Arc<dyn ExtractionProvider> = Arc::new(YtDlpProvider::new(
        app_config.provider.to_ytdlp_settings(),
    ));
    match provider.health_check().await {
        Ok(()) => info!("Extraction provider {} is available", provider.name()),
        Err(e) => warn!(
            "Extraction provider {} is not usable, conversions will fail: {}",
            provider.name(),
            e
        ),
    }

    let registry = JobRegistry::new();
    let orchestrator = ConversionOrchestrator::new(
        registry.clone(),
        provider,
        store.clone(),
        app_config.conversion.to_orchestrator_settings(),
    );
    let finalizer = DownloadFinalizer::new(
        registry.clone(),
        store.clone(),
        app_config.retention.download_grace(),
    );

    let shutdown_token = CancellationToken::new();
    let sweeper = RetentionSweeper::new(
        registry,
        store,
        app_config.retention.to_retention_settings(),
    );
    let sweeper_handle = sweeper.spawn(shutdown_token.child_token());

    let state = ServerState::new(app_config.server_config(), orchestrator, finalizer);

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown");
                signal_token.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    // Returns once the token is cancelled and in-flight requests drained
    let result = run_server(state, shutdown_token.clone()).await;
    info!("HTTP server stopped: {:?}", result);

    shutdown_token.cancel();
    if let Err(e) = sweeper_handle.await {
        warn!("Retention sweeper ended abnormally: {}", e);
    }
    result
}
