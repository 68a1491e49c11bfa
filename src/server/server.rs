use anyhow::{Context, Result};
use std::any::Any;
use std::future::IntoFuture;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tracing::info;

use axum::{
    extract::State,
    handler::HandlerWithoutStateExt,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::conversion_routes::make_conversion_routes;
use super::error::{endpoint_not_found, ApiError};
use super::metrics::metrics_handler;
use super::{log_requests, state::*};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: &'static str,
    pub jobs: usize,
    pub provider: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION"),
        jobs: state.orchestrator.registry().len().await,
        provider: state.orchestrator.provider().name().to_string(),
    };
    Json(stats)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes = make_conversion_routes(state.clone());

    let home_router: Router = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service = ServeDir::new(frontend_path)
                .append_index_html_on_directories(true)
                .not_found_service(endpoint_not_found.into_service());
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .fallback(endpoint_not_found)
            .with_state(state.clone()),
    };

    home_router
        .nest("/api", api_routes)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves the API and the metrics endpoint until `shutdown` is cancelled.
pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let bind_address = state.config.bind_address.clone();
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;

    let listener = tokio::net::TcpListener::bind((bind_address.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind_address, port))?;
    let metrics_listener = tokio::net::TcpListener::bind((bind_address.as_str(), metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}:{}", bind_address, metrics_port))?;

    info!("Ready to serve at {}:{}!", bind_address, port);
    info!("Metrics available at port {}!", metrics_port);

    let app = make_app(state);
    let api_shutdown = shutdown.clone();
    let metrics_shutdown = shutdown.clone();

    let api = axum::serve(listener, app)
        .with_graceful_shutdown(async move { api_shutdown.cancelled().await });
    let metrics = axum::serve(metrics_listener, make_metrics_app())
        .with_graceful_shutdown(async move { metrics_shutdown.cancelled().await });

    tokio::try_join!(api.into_future(), metrics.into_future()).context("HTTP server error")?;
    info!("HTTP servers stopped");
    Ok(())
}
