//! OpenAI-format error bodies for the `/v1` surface.
//!
//! Request and response payloads live in `llmserve_core::contracts`; only
//! the error envelope is specific to this layer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use llmserve_core::EngineError;
use serde::{Deserialize, Serialize};

use crate::bridge::BridgeError;

/// Seconds a client should wait before retrying an unavailable engine.
const RETRY_AFTER_SECS: &str = "5";

/// Error response in OpenAI format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail within an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                code: None,
            },
        }
    }

    /// Create an error response with a code.
    pub fn with_code(
        message: impl Into<String>,
        error_type: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                code: Some(code.into()),
            },
        }
    }

    /// The request body did not parse.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(reason, "invalid_request_error")
    }

    /// Create an error response for model not found.
    pub fn model_not_found(model: &str) -> Self {
        Self::with_code(
            format!("The model `{model}` does not exist."),
            "invalid_request_error",
            "model_not_found",
        )
    }

    /// The engine could not be reached or broke mid-response.
    pub fn upstream_error(reason: &str) -> Self {
        Self::with_code(
            format!("Inference engine error: {reason}"),
            "server_error",
            "upstream_error",
        )
    }
}

/// A status code paired with an OpenAI error body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::invalid_request(reason),
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::ModelNotFound(model) => Self {
                status: StatusCode::NOT_FOUND,
                body: ErrorResponse::model_not_found(&model),
            },
            BridgeError::Engine(engine) => Self::from(engine),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = StatusCode::from_u16(err.suggested_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &err {
            // The engine's own validation message is meant for the caller
            EngineError::Rejected { message, .. } if status.is_client_error() => {
                ErrorResponse::invalid_request(message.clone())
            }
            EngineError::Unsupported(feature) => ErrorResponse::with_code(
                format!("{feature} is not supported by this deployment"),
                "invalid_request_error",
                "unsupported",
            ),
            other => ErrorResponse::upstream_error(&other.to_string()),
        };

        Self { status, body }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();

        if self.status == StatusCode::SERVICE_UNAVAILABLE
            && let Ok(value) = RETRY_AFTER_SECS.parse()
        {
            response.headers_mut().insert("retry-after", value);
        }

        response
    }
}
