use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::conversion::{ConversionError, DownloadError};
use crate::extractor::ProviderError;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
pub const ENDPOINT_NOT_FOUND_MESSAGE: &str = "Endpoint not found";

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors surfaced by HTTP handlers.
///
/// `Internal` carries the detail for the log only, clients get a generic message.
#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::InvalidInput(message) | ApiError::NotFound(message) => message,
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                INTERNAL_ERROR_MESSAGE.to_string()
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<ConversionError> for ApiError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::InvalidUrl => ApiError::InvalidInput(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

pub async fn endpoint_not_found() -> ApiError {
    ApiError::NotFound(ENDPOINT_NOT_FOUND_MESSAGE.to_string())
}
