//! HTTP error mapping for the gateway's own surfaces.
//!
//! The `/v1` sub-API answers in OpenAI format (see `llmserve_proxy::models`);
//! everything else uses the `{error, status}` body defined here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use llmserve_core::{EngineError, GenerationError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected before any generation started.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<GenerationError> for HttpError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::GenerationDisabled => Self::NotFound(err.to_string()),
            GenerationError::MaxTokensOutOfRange { .. } | GenerationError::VisionDisabled => {
                Self::BadRequest(err.to_string())
            }
        }
    }
}

impl From<EngineError> for HttpError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => Self::ServiceUnavailable(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
