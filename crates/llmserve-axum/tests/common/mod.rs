//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use llmserve_axum::{AppContext, CorsConfig, create_router};
use llmserve_core::testing::ScriptedEngine;
use llmserve_core::{CapabilityConfig, EngineParams, GatewaySettings, InferenceEngine};
use tower::ServiceExt;

pub const MODEL_ID: &str = "mistral-7b-instruct";

/// Settings declaring the given features, with nothing else configured.
pub fn settings(vision: bool, embeddings: bool) -> GatewaySettings {
    GatewaySettings {
        engine_config: EngineParams::for_model(MODEL_ID),
        server_config: serde_json::Map::new(),
        service_config: Default::default(),
        vision,
        embeddings,
        mode: None,
        build: None,
        requirements: Vec::new(),
    }
}

pub fn capabilities(engine: &ScriptedEngine, vision: bool, embeddings: bool) -> CapabilityConfig {
    CapabilityConfig::resolve(&settings(vision, embeddings), engine.info()).unwrap()
}

/// Router over a scripted engine with the in-process bridge.
pub fn app(engine: Arc<ScriptedEngine>, vision: bool, embeddings: bool) -> Router {
    let caps = capabilities(&engine, vision, embeddings);
    create_router(AppContext::in_process(engine, caps), &CorsConfig::AllowAll)
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
