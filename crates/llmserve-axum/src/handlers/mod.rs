//! HTTP handlers for the gateway's own endpoints.
//!
//! The `/v1` handlers live in `llmserve_proxy::handlers`.

pub mod generate;
pub mod health;
