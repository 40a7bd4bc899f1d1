//! Wire contracts shared between adapters.

pub mod openai;

pub use openai::{
    AssistantMessage, ChatChoice, ChatCompletionChunk, ChatCompletionMessage,
    ChatCompletionRequest, ChatCompletionResponse, ChatDelta, ChunkChoice, ContentPart,
    EmbeddingData, EmbeddingRequest, EmbeddingResponse, ImageUrl, MessageContent, ModelCard,
    ModelsResponse, Usage,
};
