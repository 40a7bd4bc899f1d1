#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod health;
pub mod llama;
pub mod sse;

pub use health::{check_health, wait_for_health};
pub use llama::LlamaServerEngine;
pub use sse::{SseError, decode_chunks};
