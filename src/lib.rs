//! MP3 Converter Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod conversion;
pub mod extractor;
pub mod server;

// Re-export commonly used types for convenience
pub use conversion::{ConversionOrchestrator, DownloadFinalizer, JobRegistry, RetentionSweeper};
pub use extractor::{ExtractionProvider, YtDlpProvider};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
