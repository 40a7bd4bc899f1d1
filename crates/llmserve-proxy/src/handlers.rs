//! Handlers for the OpenAI-compatible sub-API.
//!
//! Each handler takes `State<Arc<EngineBridge>>`; the route table decides
//! which of them are mounted.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use llmserve_core::contracts::{ChatCompletionRequest, EmbeddingRequest, ModelsResponse};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::bridge::EngineBridge;
use crate::models::ApiError;
use crate::stream::sse_response;

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("Failed to parse request: {e}");
        ApiError::bad_request(format!("Invalid request body: {e}"))
    })
}

/// `GET /v1/models`
pub async fn list_models(State(bridge): State<Arc<EngineBridge>>) -> Json<ModelsResponse> {
    debug!("GET /v1/models");
    Json(ModelsResponse::single(bridge.model_card()))
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    State(bridge): State<Arc<EngineBridge>>,
    body: Bytes,
) -> Response {
    debug!("POST /v1/chat/completions");

    let request: ChatCompletionRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };
    if request.messages.is_empty() {
        return ApiError::bad_request("'messages' must contain at least one message")
            .into_response();
    }

    if request.stream {
        match bridge.chat_completion_stream(request).await {
            Ok(chunks) => sse_response(chunks),
            Err(e) => ApiError::from(e).into_response(),
        }
    } else {
        match bridge.chat_completion(request).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => ApiError::from(e).into_response(),
        }
    }
}

/// `POST /v1/embeddings`
pub async fn embeddings(State(bridge): State<Arc<EngineBridge>>, body: Bytes) -> Response {
    debug!("POST /v1/embeddings");

    let request: EmbeddingRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match bridge.embeddings(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
