//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::processor::IngestError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Caller identity required")]
    Unauthorized,
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Upload blocked: {0}")]
    SecurityAbort(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Caller identity required".to_string(),
            ),
            ApiError::Validation(detail) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                detail.clone(),
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                detail.clone(),
            ),
            ApiError::SecurityAbort(detail) => {
                tracing::warn!(detail, "Upload rejected by malware scan");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "SECURITY_ABORT",
                    "Upload blocked: malware detected".to_string(),
                )
            }
            ApiError::NotFound(detail) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                detail.clone(),
            ),
            ApiError::Storage(detail) => {
                tracing::error!(detail, "API storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "The upload could not be stored".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(e) => ApiError::Validation(e.to_string()),
            IngestError::SecurityAbort { detail } => ApiError::SecurityAbort(detail),
            IngestError::Storage(detail) => ApiError::Storage(detail),
            IngestError::NotFound(id) => ApiError::NotFound(format!("Source {id} not found")),
        }
    }
}
