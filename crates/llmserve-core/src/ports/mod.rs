//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain and contract types.

pub mod completions;
pub mod engine;

pub use completions::{ClientError, CompletionsClient, GenerationChunkStream};
pub use engine::{ChunkStream, EngineError, EngineFeatures, EngineInfo, InferenceEngine};
