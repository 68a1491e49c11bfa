use axum::extract::FromRef;

use crate::conversion::{ConversionOrchestrator, DownloadFinalizer, JobRegistry};
use crate::extractor::ExtractionProvider;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type SharedProvider = Arc<dyn ExtractionProvider>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub orchestrator: ConversionOrchestrator,
    pub finalizer: DownloadFinalizer,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        orchestrator: ConversionOrchestrator,
        finalizer: DownloadFinalizer,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            orchestrator,
            finalizer,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for ConversionOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.clone()
    }
}

impl FromRef<ServerState> for DownloadFinalizer {
    fn from_ref(input: &ServerState) -> Self {
        input.finalizer.clone()
    }
}

impl FromRef<ServerState> for JobRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.registry().clone()
    }
}

impl FromRef<ServerState> for SharedProvider {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.provider().clone()
    }
}
