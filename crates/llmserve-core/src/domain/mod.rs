//! Domain types for the generation surface.

pub mod chat;
pub mod generation;

pub use chat::{ChatMessage, ContentBlock, Role};
pub use generation::{
    DEFAULT_PROMPT, GenerationChunk, GenerationError, GenerationRequest, INTERNAL_ERROR_NOTICE,
};
