use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dr_core::Error;
use serde_json::json;

/// HTTP-facing error wrapper over the domain error.
///
/// Implements [`IntoResponse`] to produce consistent JSON error bodies of
/// the shape `{"error": ..., "code": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] Error),

    /// A malformed request body (bad multipart, unparsable number).
    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Core(core) => match core {
                Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
                }
                Error::JobNotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("job {id} not found"),
                ),
                Error::ArtifactNotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "file not found".to_string(),
                ),
                Error::DuplicateJob(id) => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("job {id} already exists"),
                ),
                Error::QueueFull => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "QUEUE_FULL",
                    "admission queue is full".to_string(),
                ),
                Error::ModelLoad(_) | Error::Execution(_) | Error::Io(_) => {
                    tracing::error!(error = %core, "internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
