#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod bridge;
pub mod handlers;
pub mod models;
pub mod stream;

pub use bridge::{BridgeError, EngineBridge};
pub use models::{ErrorDetail, ErrorResponse};
