//! Shared fixtures for the `/v1` handler tests.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::Request,
    routing::{get, post},
};
use http_body_util::BodyExt;
use llmserve_core::testing::ScriptedEngine;
use llmserve_core::{CapabilityConfig, EngineParams, GatewaySettings, InferenceEngine};
use llmserve_proxy::{EngineBridge, handlers};

pub const SERVED_MODEL: &str = "mistral-7b-instruct";

pub fn bridge(engine: Arc<ScriptedEngine>, embeddings: bool) -> Arc<EngineBridge> {
    let settings = GatewaySettings {
        engine_config: EngineParams::for_model(SERVED_MODEL),
        server_config: serde_json::Map::new(),
        service_config: Default::default(),
        vision: false,
        embeddings,
        mode: None,
        build: None,
        requirements: Vec::new(),
    };
    let capabilities = CapabilityConfig::resolve(&settings, engine.info()).unwrap();
    Arc::new(EngineBridge::new(engine, &capabilities))
}

/// Router with every `/v1` handler mounted.
pub fn v1_app(bridge: Arc<EngineBridge>) -> Router {
    Router::new()
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/embeddings", post(handlers::embeddings))
        .with_state(bridge)
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
