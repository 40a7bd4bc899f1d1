#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod capabilities;
pub mod contracts;
pub mod domain;
pub mod encoder;
pub mod error;
pub mod ports;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use capabilities::{
    CapabilityConfig, CapabilityError, DEFAULT_ENGINE_MAX_LEN, DeploymentMode, MAX_TOKENS_CEILING,
    MIN_GENERATION_TOKENS,
};
pub use domain::{
    ChatMessage, ContentBlock, DEFAULT_PROMPT, GenerationChunk, GenerationError,
    GenerationRequest, INTERNAL_ERROR_NOTICE, Role,
};
pub use encoder::{EncodeError, MultimodalEncoder};
pub use error::CoreError;
pub use ports::{
    ChunkStream, ClientError, CompletionsClient, EngineError, EngineFeatures, EngineInfo,
    GenerationChunkStream, InferenceEngine,
};
pub use settings::{
    BridgeMode, DEFAULT_ENGINE_ENDPOINT, DEFAULT_HOST, DEFAULT_PORT, EngineParams,
    GatewaySettings, ServerOptions, ServiceConfig, SettingsError, validate_settings,
};
