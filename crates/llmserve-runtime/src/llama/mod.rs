//! llama-server engine adapter.

mod engine;
mod props;

pub use engine::LlamaServerEngine;
