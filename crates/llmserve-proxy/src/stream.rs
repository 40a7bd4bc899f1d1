//! SSE encoding for streamed chat completions.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use llmserve_core::ChunkStream;
use serde::Serialize;
use tracing::{debug, error};

use crate::models::ErrorResponse;

const DONE_FRAME: &str = "data: [DONE]\n\n";

fn frame<T: Serialize>(payload: &T) -> Bytes {
    match serde_json::to_string(payload) {
        Ok(json) => Bytes::from(format!("data: {json}\n\n")),
        Err(e) => Bytes::from(format!(
            "data: {{\"error\":{{\"message\":\"failed to encode chunk: {e}\",\"type\":\"server_error\"}}}}\n\n"
        )),
    }
}

/// Encode a chunk stream as SSE frames.
///
/// Ends with `[DONE]` on success. An error after the first byte becomes a
/// single error frame, and the stream stops there.
pub fn encode_sse(chunks: ChunkStream) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    async_stream::stream! {
        let mut chunks = chunks;
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => yield Ok(frame(&chunk)),
                Err(e) => {
                    error!(error = %e, "Engine stream failed after response started");
                    yield Ok(frame(&ErrorResponse::upstream_error(&e.to_string())));
                    return;
                }
            }
        }
        debug!("Chat completion stream finished");
        yield Ok(Bytes::from_static(DONE_FRAME.as_bytes()));
    }
}

/// Build a `text/event-stream` response around a chunk stream.
///
/// Dropping the response body (client disconnect) drops `chunks`, which
/// releases the engine request.
pub fn sse_response(chunks: ChunkStream) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(encode_sse(chunks)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
