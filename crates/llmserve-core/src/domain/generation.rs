//! Generation request and stream chunk types.

use thiserror::Error;

use crate::contracts::{ChatCompletionChunk, ChatCompletionMessage, ChatCompletionRequest};
use crate::domain::chat::ChatMessage;

/// Prompt used when a caller omits one.
pub const DEFAULT_PROMPT: &str = "Who are you? Please respond in pirate speak!";

/// The single chunk emitted when a generation stream fails mid-flight.
///
/// Existing callers match on this exact text.
pub const INTERNAL_ERROR_NOTICE: &str =
    "Internal error found. Check server logs for more information";

/// A streaming chat request built by the generation surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// A streaming request carrying one message.
    ///
    /// `max_tokens` is expected to be validated by the caller; see
    /// [`crate::CapabilityConfig::validate_max_tokens`].
    pub fn streaming(model: impl Into<String>, message: ChatMessage, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: vec![message],
            stream: true,
            max_tokens,
        }
    }

    /// Convert into the OpenAI wire request.
    pub fn into_chat_request(self) -> ChatCompletionRequest {
        let mut request = ChatCompletionRequest::new(
            self.model,
            self.messages
                .into_iter()
                .map(ChatCompletionMessage::from)
                .collect(),
        );
        request.stream = self.stream;
        request.max_tokens = Some(self.max_tokens);
        request
    }
}

/// One unit of a generation stream. Empty text is valid and still emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationChunk {
    pub delta_text: String,
}

impl GenerationChunk {
    pub fn new(delta_text: impl Into<String>) -> Self {
        Self {
            delta_text: delta_text.into(),
        }
    }
}

impl From<&ChatCompletionChunk> for GenerationChunk {
    fn from(chunk: &ChatCompletionChunk) -> Self {
        Self::new(chunk.delta_content().unwrap_or_default())
    }
}

/// Request-validation failures, raised before any engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("max_tokens must be between {min} and {max}, got {requested}")]
    MaxTokensOutOfRange { requested: u32, min: u32, max: u32 },

    #[error("Vision input is not enabled for this deployment")]
    VisionDisabled,

    #[error("Generation endpoints are disabled in embeddings-only mode")]
    GenerationDisabled,
}
