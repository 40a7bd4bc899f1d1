//! Mock llama-server for engine adapter tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

pub const MOCK_MODEL_PATH: &str = "/models/mock-7b.gguf";

/// What the mock answers with.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub deltas: Vec<String>,
    pub vision: bool,
    pub embeddings: bool,
    pub n_ctx: u32,
    /// Break the stream with an error event after this many deltas.
    pub error_after: Option<usize>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            deltas: vec!["Ahoy".into(), ", ".into(), "matey".into()],
            vision: false,
            embeddings: false,
            n_ctx: 8192,
            error_after: None,
        }
    }
}

#[derive(Clone)]
struct MockState {
    behavior: MockBehavior,
    seen: Arc<Mutex<Vec<Value>>>,
}

/// Handle to a running mock.
pub struct MockEngine {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<Value>>>,
}

impl MockEngine {
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Chat request bodies received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.seen.lock().unwrap().clone()
    }
}

pub async fn spawn_mock_engine(behavior: MockBehavior) -> MockEngine {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        behavior,
        seen: Arc::clone(&seen),
    };

    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route("/props", get(props))
        .route("/v1/chat/completions", post(chat))
        .route("/v1/embeddings", post(embeddings))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockEngine { addr, seen }
}

async fn props(State(state): State<MockState>) -> Json<Value> {
    Json(json!({
        "default_generation_settings": {"n_ctx": state.behavior.n_ctx},
        "total_slots": 1,
        "model_path": MOCK_MODEL_PATH,
        "modalities": {"vision": state.behavior.vision, "audio": false}
    }))
}

fn chunk(content: &str, finish: Option<&str>) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": MOCK_MODEL_PATH,
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": finish}]
    })
}

async fn chat(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.seen.lock().unwrap().push(body.clone());
    let behavior = &state.behavior;

    if body["max_tokens"].as_u64() == Some(999_999) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"code": 400, "message": "max_tokens too large", "type": "invalid_request_error"}})),
        )
            .into_response();
    }

    if body["stream"].as_bool() != Some(true) {
        return Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": MOCK_MODEL_PATH,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": behavior.deltas.concat()},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        }))
        .into_response();
    }

    let mut sse = String::new();
    for (i, delta) in behavior.deltas.iter().enumerate() {
        if behavior.error_after == Some(i) {
            sse.push_str("data: {\"error\":{\"message\":\"slot crashed\"}}\n\n");
            break;
        }
        let finish = (i + 1 == behavior.deltas.len()).then_some("stop");
        sse.push_str(&format!("data: {}\n\n", chunk(delta, finish)));
    }
    if behavior.error_after.is_none() {
        sse.push_str("data: [DONE]\n\n");
    }

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from(sse))
        .unwrap()
}

async fn embeddings(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    if !state.behavior.embeddings {
        return (
            StatusCode::NOT_IMPLEMENTED,
            Json(json!({"error": {"code": 501, "message": "This server does not support embeddings. Start it with `--embeddings`", "type": "not_supported_error"}})),
        )
            .into_response();
    }

    Json(json!({
        "object": "list",
        "data": [{"object": "embedding", "embedding": [0.1, 0.2, 0.3], "index": 0}],
        "model": body["model"],
        "usage": {"prompt_tokens": 1, "total_tokens": 1}
    }))
    .into_response()
}
