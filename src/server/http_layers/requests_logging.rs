//! Request logging middleware
//!
//! Every request is counted in the HTTP metrics. What gets logged depends on
//! [`RequestsLoggingLevel`]; at `Body` level only small JSON or text bodies are
//! buffered, downloads are described by type and size and streamed untouched.

use super::super::state::ServerState;
use crate::server::metrics::record_http_request;
use axum::extract::State;
use axum::{
    body::{Body, HttpBody},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, Request, Response, StatusCode,
    },
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

#[derive(Debug, PartialEq)]
enum BodyLog {
    /// Small textual body, read it and log it.
    Buffer(usize),
    /// Anything else, log this description and pass the body through.
    Describe(String),
}

fn is_textual(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    mime == "application/json" || mime.starts_with("text/")
}

fn body_log(headers: &HeaderMap, exact_len: Option<u64>) -> BodyLog {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let len = match declared.or(exact_len) {
        Some(0) => return BodyLog::Describe("empty".to_string()),
        Some(len) => len,
        None => return BodyLog::Describe("length unknown".to_string()),
    };
    let size = byte_unit::Byte::from(len);

    if !is_textual(content_type) {
        let kind = if content_type.is_empty() {
            "untyped"
        } else {
            content_type
        };
        return BodyLog::Describe(format!("{} ({:#})", kind, size));
    }
    match usize::try_from(len) {
        Ok(len) if len < MAX_LOGGABLE_BODY_LENGTH => BodyLog::Buffer(len),
        _ => BodyLog::Describe(format!("too big to log ({:#})", size)),
    }
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} headers:", label);
    for (name, value) in headers.iter() {
        info!("    {:?}: {:?}", name, value);
    }
}

async fn log_body(label: &str, headers: &HeaderMap, body: Body) -> Result<Body, axum::Error> {
    match body_log(headers, body.size_hint().exact()) {
        BodyLog::Describe(description) => {
            info!("  {} body: {}", label, description);
            Ok(body)
        }
        BodyLog::Buffer(len) => {
            let bytes = axum::body::to_bytes(body, len).await?;
            info!("  {} body:\n{}", label, String::from_utf8_lossy(&bytes));
            Ok(Body::from(bytes))
        }
    }
}

/// Collapses per-job paths so the metrics path label stays bounded.
fn metrics_path(path: &str) -> String {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["api", endpoint @ ("status" | "download"), _] => format!("/api/{}/{{job_id}}", endpoint),
        ["api", ..] => path.to_string(),
        [""] => "/".to_string(),
        _ => "static".to_string(),
    }
}

pub async fn log_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let level = state.config.requests_logging_level.clone();
    let start = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, request.uri());
    }
    if level >= RequestsLoggingLevel::Headers {
        log_headers("Req", request.headers());
    }

    let request = if level >= RequestsLoggingLevel::Body {
        let (parts, body) = request.into_parts();
        match log_body("Req", &parts.headers, body).await {
            Ok(body) => Request::from_parts(parts, body),
            Err(err) => {
                error!("Failed to read request body of {} {}: {}", method, path, err);
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    } else {
        request
    };

    let response = next.run(request).await;
    let status = response.status();

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Resp", response.headers());
    }

    let response = if level >= RequestsLoggingLevel::Body {
        let (parts, body) = response.into_parts();
        match log_body("Resp", &parts.headers, body).await {
            Ok(body) => Response::from_parts(parts, body),
            Err(err) => {
                error!("Failed to read response body of {} {}: {}", method, path, err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    } else {
        response
    };

    let duration = start.elapsed();
    if level > RequestsLoggingLevel::None {
        info!("<<< {} ({}ms)", status.as_u16(), duration.as_millis());
    }
    record_http_request(&method, &metrics_path(&path), status.as_u16(), duration);

    response
}
