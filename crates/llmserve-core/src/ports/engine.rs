//! Inference engine port.
//!
//! The engine performs the actual token generation. The gateway never
//! samples, batches or manages model memory; it only adapts requests and
//! responses. Implementations must be safe to share across request tasks.

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::contracts::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest,
    EmbeddingResponse,
};

/// Stream of chat completion chunks in engine emission order.
///
/// Dropping the stream abandons the request; implementations release the
/// underlying connection so the engine can stop generating.
pub type ChunkStream = BoxStream<'static, Result<ChatCompletionChunk, EngineError>>;

/// Features the engine actually supports, as probed at initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineFeatures {
    pub vision: bool,
    pub embeddings: bool,
}

/// What the engine reported about itself at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    /// The engine's internal model identifier (usually a path).
    pub model_path: String,
    /// Context length declared by the engine, if it reports one.
    pub max_model_len: Option<u32>,
    pub features: EngineFeatures,
}

/// Errors raised by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be reached or is not ready.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// The engine lacks a feature the caller relies on.
    #[error("Engine does not support {0}")]
    Unsupported(String),

    /// The engine rejected the request.
    #[error("Engine rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response stream broke after it started.
    #[error("Stream interrupted: {0}")]
    Stream(String),

    /// The engine answered with something that is not the expected shape.
    #[error("Invalid engine response: {0}")]
    Protocol(String),

    /// Internal error.
    #[error("Internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Suggested HTTP status for surfacing this error before a stream starts.
    pub const fn suggested_status_code(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            Self::Unsupported(_) => 501,
            Self::Rejected { status, .. } => *status,
            Self::Stream(_) | Self::Protocol(_) => 502,
            Self::Internal(_) => 500,
        }
    }
}

/// Port to the external inference engine.
#[async_trait]
pub trait InferenceEngine: Send + Sync + fmt::Debug {
    /// Information captured at initialization.
    fn info(&self) -> &EngineInfo;

    /// Check that the engine is ready to serve.
    async fn health(&self) -> Result<(), EngineError>;

    /// Run a non-streaming chat completion.
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, EngineError>;

    /// Run a streaming chat completion.
    async fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChunkStream, EngineError>;

    /// Compute embeddings.
    async fn embeddings(&self, request: EmbeddingRequest)
    -> Result<EmbeddingResponse, EngineError>;
}
