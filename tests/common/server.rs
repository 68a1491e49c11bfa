//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own registry and downloads directory.

use super::constants::*;
use super::fake_provider::FakeProvider;
use mp3_converter_server::conversion::{
    ArtifactStore, ConversionOrchestrator, DownloadFinalizer, JobRegistry, OrchestratorSettings,
};
use mp3_converter_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance backed by a [`FakeProvider`]
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    #[allow(dead_code)]
    pub port: u16,

    /// Registry for direct inspection in tests
    #[allow(dead_code)]
    pub registry: JobRegistry,

    // Private fields - keep resources alive until drop
    downloads_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Spawns a new test server on a random port with a well-behaved provider
    pub async fn spawn() -> Self {
        Self::spawn_with(Arc::new(FakeProvider::new())).await
    }

    /// Spawns a new test server on a random port using `provider`
    ///
    /// # Panics
    ///
    /// Panics if port binding fails or the server doesn't become ready within timeout
    pub async fn spawn_with(provider: Arc<FakeProvider>) -> Self {
        let downloads_dir = TempDir::new().expect("Failed to create downloads dir");

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            bind_address: "127.0.0.1".to_string(),
            ..Default::default()
        };

        let registry = JobRegistry::new();
        let store = ArtifactStore::new(downloads_dir.path());
        let orchestrator = ConversionOrchestrator::new(
            registry.clone(),
            provider,
            store.clone(),
            OrchestratorSettings {
                progress_tick: Duration::from_millis(TEST_PROGRESS_TICK_MS),
                default_quality: None,
            },
        );
        let finalizer = DownloadFinalizer::new(
            registry.clone(),
            store,
            Duration::from_millis(TEST_DOWNLOAD_GRACE_MS),
        );

        let app = make_app(ServerState::new(config, orchestrator, finalizer));

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            registry,
            downloads_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    pub fn downloads_dir(&self) -> &Path {
        self.downloads_dir.path()
    }

    /// Names of the files currently in the downloads directory
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.downloads_dir.path())
            .expect("Failed to read downloads dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await,
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
