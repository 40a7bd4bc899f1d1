//! `POST /generate` and `POST /sights`.
//!
//! Both accept a JSON body and answer with a chunked `text/plain` stream of
//! UTF-8 fragments. Omitted fields fall back to [`DEFAULT_PROMPT`] and the
//! deployment's token ceiling.

use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures_util::StreamExt;
use llmserve_core::DEFAULT_PROMPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::HttpError;
use crate::generation::TextStream;
use crate::state::AppState;

/// Body of `POST /generate`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Body of `POST /sights`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SightsBody {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Base64 image bytes, optionally as a `data:` URI.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// An empty body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, HttpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| HttpError::BadRequest(format!("Invalid request body: {e}")))
}

fn decode_image(encoded: &str) -> Result<Vec<u8>, HttpError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => encoded,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| HttpError::BadRequest(format!("image is not valid base64: {e}")))
}

fn text_stream_response(stream: TextStream) -> Response {
    let body = Body::from_stream(stream.map(|text| Ok::<_, Infallible>(Bytes::from(text))));
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; charset=utf-8")
        .header("cache-control", "no-cache")
        .header("x-accel-buffering", "no")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

pub async fn generate(State(state): State<AppState>, body: Bytes) -> Result<Response, HttpError> {
    let body: GenerateBody = parse_body(&body)?;
    let service = &state.generation;

    let stream = service.generate(
        body.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        body.max_tokens.unwrap_or(service.max_tokens()),
    )?;
    Ok(text_stream_response(stream))
}

pub async fn sights(State(state): State<AppState>, body: Bytes) -> Result<Response, HttpError> {
    let body: SightsBody = parse_body(&body)?;
    let service = &state.generation;

    let image = body.image.as_deref().map(decode_image).transpose()?;
    let stream = service.sights(
        body.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        image,
        body.max_tokens.unwrap_or(service.max_tokens()),
    )?;
    Ok(text_stream_response(stream))
}
