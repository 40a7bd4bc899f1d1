//! Scripted doubles for tests.
//!
//! Available under `cfg(test)` and the `test-utils` feature.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::contracts::{
    AssistantMessage, ChatChoice, ChatCompletionChunk, ChatCompletionRequest,
    ChatCompletionResponse, ChatDelta, ChunkChoice, EmbeddingData, EmbeddingRequest,
    EmbeddingResponse,
};
use crate::domain::{GenerationChunk, GenerationRequest};
use crate::ports::{
    ChunkStream, ClientError, CompletionsClient, EngineError, EngineFeatures, EngineInfo,
    GenerationChunkStream, InferenceEngine,
};

/// Internal model path reported by [`ScriptedEngine`].
pub const SCRIPTED_MODEL_PATH: &str = "/models/scripted.gguf";

/// Where a scripted stream stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    None,
    OnStart,
    After(usize),
}

/// Engine that replays a fixed list of deltas.
#[derive(Debug)]
pub struct ScriptedEngine {
    info: EngineInfo,
    deltas: Vec<String>,
    failure: Failure,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedEngine {
    pub fn new<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            info: EngineInfo {
                model_path: SCRIPTED_MODEL_PATH.to_string(),
                max_model_len: Some(2048),
                features: EngineFeatures::default(),
            },
            deltas: deltas.into_iter().map(Into::into).collect(),
            failure: Failure::None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn with_features(mut self, vision: bool, embeddings: bool) -> Self {
        self.info.features = EngineFeatures { vision, embeddings };
        self
    }

    #[must_use]
    pub const fn with_max_model_len(mut self, len: Option<u32>) -> Self {
        self.info.max_model_len = len;
        self
    }

    /// Emit `n` deltas, then fail the stream.
    #[must_use]
    pub const fn failing_after(mut self, n: usize) -> Self {
        self.failure = Failure::After(n);
        self
    }

    /// Refuse every call before any chunk is produced.
    #[must_use]
    pub const fn failing_on_start(mut self) -> Self {
        self.failure = Failure::OnStart;
        self
    }

    /// Number of completion calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent completion request, as received.
    pub fn last_request(&self) -> Option<ChatCompletionRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }

    fn record(&self, request: &ChatCompletionRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
    }
}

fn scripted_chunk(model: &str, content: &str, last: bool) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: "chatcmpl-scripted".to_string(),
        object: "chat.completion.chunk".to_string(),
        created: 0,
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChatDelta {
                role: None,
                content: Some(content.to_string()),
                extra: serde_json::Map::new(),
            },
            finish_reason: last.then(|| "stop".to_string()),
        }],
        usage: None,
    }
}

/// Apply a failure script to a list of items.
fn scripted_items<T>(
    items: Vec<T>,
    failure: Failure,
    fail: impl Fn() -> EngineError,
) -> Vec<Result<T, EngineError>> {
    let mut out: Vec<Result<T, EngineError>> = Vec::with_capacity(items.len() + 1);
    for (i, item) in items.into_iter().enumerate() {
        if failure == Failure::After(i) {
            out.push(Err(fail()));
            return out;
        }
        out.push(Ok(item));
    }
    if let Failure::After(n) = failure {
        if n >= out.len() {
            out.push(Err(fail()));
        }
    }
    out
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    fn info(&self) -> &EngineInfo {
        &self.info
    }

    async fn health(&self) -> Result<(), EngineError> {
        match self.failure {
            Failure::OnStart => Err(EngineError::Unavailable("scripted outage".into())),
            _ => Ok(()),
        }
    }

    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, EngineError> {
        self.record(&request);
        if self.failure != Failure::None {
            return Err(EngineError::Internal("scripted failure".into()));
        }

        Ok(ChatCompletionResponse {
            id: "chatcmpl-scripted".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: request.model,
            choices: vec![ChatChoice {
                index: 0,
                message: AssistantMessage {
                    role: "assistant".to_string(),
                    content: Some(self.deltas.concat()),
                    extra: serde_json::Map::new(),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        })
    }

    async fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChunkStream, EngineError> {
        self.record(&request);
        if self.failure == Failure::OnStart {
            return Err(EngineError::Unavailable("scripted outage".into()));
        }

        let count = self.deltas.len();
        let chunks = self
            .deltas
            .iter()
            .enumerate()
            .map(|(i, d)| scripted_chunk(&request.model, d, i + 1 == count))
            .collect();
        let items = scripted_items(chunks, self.failure, || {
            EngineError::Stream("scripted mid-stream failure".into())
        });

        Ok(futures_util::stream::iter(items).boxed())
    }

    async fn embeddings(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, EngineError> {
        if !self.info.features.embeddings {
            return Err(EngineError::Unsupported("embeddings".into()));
        }

        let inputs = match &request.input {
            serde_json::Value::Array(items) => items.len(),
            _ => 1,
        };
        Ok(EmbeddingResponse {
            object: "list".to_string(),
            data: (0..inputs)
                .map(|i| EmbeddingData {
                    object: "embedding".to_string(),
                    embedding: vec![0.25, 0.5, 0.75],
                    index: u32::try_from(i).unwrap_or(u32::MAX),
                })
                .collect(),
            model: request.model,
            usage: None,
        })
    }
}

/// Completions client that replays a fixed list of deltas.
#[derive(Debug)]
pub struct ScriptedClient {
    deltas: Vec<String>,
    failure: Failure,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    pub fn new<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            failure: Failure::None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Emit `n` deltas, then fail the stream.
    #[must_use]
    pub const fn failing_after(mut self, n: usize) -> Self {
        self.failure = Failure::After(n);
        self
    }

    /// Fail before returning a stream.
    #[must_use]
    pub const fn failing_on_start(mut self) -> Self {
        self.failure = Failure::OnStart;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }
}

#[async_trait]
impl CompletionsClient for ScriptedClient {
    async fn stream_chat(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationChunkStream, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if self.failure == Failure::OnStart {
            return Err(ClientError::Transport("connection refused".into()));
        }

        let chunks = self.deltas.iter().map(GenerationChunk::new).collect();
        let items: Vec<Result<GenerationChunk, ClientError>> =
            scripted_items(chunks, self.failure, || {
                EngineError::Stream("scripted mid-stream failure".into())
            })
            .into_iter()
            .map(|item| item.map_err(ClientError::from))
            .collect();

        Ok(futures_util::stream::iter(items).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_engine_marks_last_chunk() {
        let engine = ScriptedEngine::new(["a", "b"]);
        let chunks: Vec<_> = engine
            .chat_completion_stream(ChatCompletionRequest::new("m", vec![]))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        let last = chunks[1].as_ref().unwrap();
        assert_eq!(last.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_engine_fails_after_n() {
        let engine = ScriptedEngine::new(["a", "b", "c"]).failing_after(1);
        let chunks: Vec<_> = engine
            .chat_completion_stream(ChatCompletionRequest::new("m", vec![]))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        assert!(matches!(chunks[1], Err(EngineError::Stream(_))));
    }
}
