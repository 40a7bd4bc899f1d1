//! Completions client port.
//!
//! The generation surface talks to the completions surface through this
//! port. The default adapter goes over loopback HTTP; an in-process adapter
//! calls the engine bridge directly. Either way the streaming service code
//! is identical.

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::domain::{GenerationChunk, GenerationRequest};
use crate::ports::EngineError;

/// Stream of generation chunks in emission order.
pub type GenerationChunkStream = BoxStream<'static, Result<GenerationChunk, ClientError>>;

/// Errors raised by a completions client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection or I/O failure on the way to the completions surface.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The completions surface answered with a non-success status.
    #[error("Completions endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A stream frame could not be decoded.
    #[error("Malformed stream frame: {0}")]
    Decode(String),

    /// The request could not be built (for example, image encoding).
    #[error("Failed to build request: {0}")]
    Request(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Generation-API client bound to the completions surface.
#[async_trait]
pub trait CompletionsClient: Send + Sync + fmt::Debug {
    /// Dispatch a streaming chat request.
    async fn stream_chat(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationChunkStream, ClientError>;
}
