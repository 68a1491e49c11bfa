//! Conversion API handlers, mounted under `/api`.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::BufReader;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::error::{endpoint_not_found, ApiError};
use super::state::{ServerState, SharedProvider};
use crate::conversion::{
    validate_video_url, ConversionJob, ConversionOrchestrator, DownloadFinalizer, JobRegistry,
};
use crate::extractor::Quality;

const AUDIO_MPEG: &str = "audio/mpeg";

#[derive(Deserialize, Debug)]
pub struct ConvertRequest {
    pub url: String,
    #[serde(default)]
    pub quality: Option<Quality>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub job_id: String,
    pub title: String,
}

#[derive(Deserialize, Debug)]
pub struct VideoInfoRequest {
    pub url: String,
}

async fn post_convert(
    State(orchestrator): State<ConversionOrchestrator>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let job = orchestrator.submit(&request.url, request.quality).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ConvertResponse {
            job_id: job.id,
            title: job.title,
        }),
    ))
}

async fn get_status(
    State(registry): State<JobRegistry>,
    Path(job_id): Path<String>,
) -> Result<Json<ConversionJob>, ApiError> {
    registry
        .get(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))
}

async fn get_download(
    State(finalizer): State<DownloadFinalizer>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let download = finalizer.open(&job_id).await?;
    let content_disposition = content_disposition(&download.file_name());
    let len = download.len;
    let guard = download.guard;

    // The guard rides along with the body, cleanup is scheduled once the body is dropped
    let stream = ReaderStream::new(BufReader::new(download.file)).map(move |chunk| {
        let _ = &guard;
        chunk
    });

    debug!("Streaming {} bytes for job {}", len, job_id);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, AUDIO_MPEG)
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(format!("Failed to build download response: {}", e)))
}

async fn post_video_info(
    State(provider): State<SharedProvider>,
    payload: Result<Json<VideoInfoRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload?;
    validate_video_url(&request.url)?;
    let info = provider.fetch_info(request.url.trim()).await?;
    Ok(Json(info.raw))
}

/// Builds an attachment disposition with an ASCII fallback name and the
/// RFC 5987 encoded UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(file_name)
    )
}

pub fn make_conversion_routes(state: ServerState) -> Router {
    Router::new()
        .route("/convert", post(post_convert))
        .route("/status/{job_id}", get(get_status))
        .route("/download/{job_id}", get(get_download))
        .route("/videoinfo", post(post_video_info))
        .fallback(endpoint_not_found)
        .with_state(state)
}
