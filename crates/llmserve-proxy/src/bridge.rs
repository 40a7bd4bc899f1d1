//! Engine bridge.
//!
//! The one place that holds the engine handle. Everything that reaches the
//! engine, whether from the `/v1` handlers or the in-process completions
//! client, goes through here so model naming and response shaping stay
//! identical across surfaces.

use std::sync::Arc;

use futures_util::StreamExt;
use llmserve_core::contracts::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ContentPart,
    EmbeddingRequest, EmbeddingResponse, MessageContent, ModelCard,
};
use llmserve_core::{
    CapabilityConfig, ChunkStream, ClientError, EngineError, GenerationChunk,
    GenerationChunkStream, GenerationRequest, InferenceEngine, ServerOptions,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Model '{0}' is not served by this gateway")]
    ModelNotFound(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<BridgeError> for ClientError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::ModelNotFound(model) => {
                Self::Request(format!("unknown model '{model}'"))
            }
            BridgeError::Engine(engine) => Self::Engine(engine),
        }
    }
}

/// Owns the shared engine handle and translates model identifiers.
#[derive(Debug)]
pub struct EngineBridge {
    engine: Arc<dyn InferenceEngine>,
    model_id: String,
    max_model_len: u32,
    options: ServerOptions,
    created: i64,
}

impl EngineBridge {
    pub fn new(engine: Arc<dyn InferenceEngine>, capabilities: &CapabilityConfig) -> Self {
        let created = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or_default();

        Self {
            engine,
            model_id: capabilities.model_id.clone(),
            max_model_len: capabilities.max_tokens,
            options: capabilities.server_options.clone(),
            created,
        }
    }

    /// Advertised model identifier.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    /// The single entry of the models listing.
    pub fn model_card(&self) -> ModelCard {
        ModelCard {
            id: self.model_id.clone(),
            object: "model".to_string(),
            created: self.created,
            owned_by: "llmserve".to_string(),
            max_model_len: Some(self.max_model_len),
        }
    }

    /// Map an advertised identifier to the engine's model path.
    fn internal_model(&self, requested: &str) -> Result<String, BridgeError> {
        if requested == self.model_id {
            Ok(self.engine.info().model_path.clone())
        } else {
            Err(BridgeError::ModelNotFound(requested.to_string()))
        }
    }

    fn prepare(&self, mut request: ChatCompletionRequest) -> Result<ChatCompletionRequest, BridgeError> {
        request.model = self.internal_model(&request.model)?;
        if !self.options.disable_log_requests {
            info!(
                request_id = %uuid::Uuid::new_v4(),
                model = %self.model_id,
                stream = request.stream,
                max_tokens = ?request.max_tokens,
                prompt = %self.options.log_excerpt(&last_user_text(&request)),
                "Received chat request"
            );
        }
        Ok(request)
    }

    /// Non-streaming chat completion.
    pub async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, BridgeError> {
        let request = self.prepare(request)?;
        let mut response = self.engine.chat_completion(request).await?;

        response.model.clone_from(&self.model_id);
        for choice in &mut response.choices {
            choice.message.role.clone_from(&self.options.response_role);
        }
        Ok(response)
    }

    /// Streaming chat completion, chunks in engine order.
    pub async fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChunkStream, BridgeError> {
        let request = self.prepare(request)?;
        let upstream = self.engine.chat_completion_stream(request).await?;

        let model_id = self.model_id.clone();
        let role = self.options.response_role.clone();
        Ok(upstream
            .map(move |item| item.map(|chunk| relabel(chunk, &model_id, &role)))
            .boxed())
    }

    /// Run a generation request and adapt the engine stream into
    /// [`GenerationChunk`]s.
    pub async fn complete(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationChunkStream, BridgeError> {
        let stream = self.chat_completion_stream(request.into_chat_request()).await?;
        Ok(stream
            .map(|item| {
                item.map(|chunk| GenerationChunk::from(&chunk))
                    .map_err(ClientError::from)
            })
            .boxed())
    }

    pub async fn embeddings(
        &self,
        mut request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, BridgeError> {
        request.model = self.internal_model(&request.model)?;
        let mut response = self.engine.embeddings(request).await?;
        response.model.clone_from(&self.model_id);
        Ok(response)
    }
}

fn relabel(mut chunk: ChatCompletionChunk, model_id: &str, role: &str) -> ChatCompletionChunk {
    model_id.clone_into(&mut chunk.model);
    for choice in &mut chunk.choices {
        if let Some(existing) = choice.delta.role.as_mut() {
            role.clone_into(existing);
        }
    }
    chunk
}

/// Text of the last user message, for request logging.
fn last_user_text(request: &ChatCompletionRequest) -> String {
    let Some(message) = request.messages.iter().rev().find(|m| m.role == "user") else {
        return String::new();
    };

    match &message.content {
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    }
}
