//! [`InferenceEngine`] backed by an OpenAI-compatible llama-server.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use llmserve_core::contracts::{
    ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, EmbeddingResponse,
};
use llmserve_core::{
    ChunkStream, EngineError, EngineFeatures, EngineInfo, EngineParams, InferenceEngine,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::props::ServerProps;
use crate::health::{check_health, wait_for_health};
use crate::sse::{decode_chunks, error_message};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to a running llama-server.
///
/// Constructed once at startup by [`LlamaServerEngine::connect`]; cheap to
/// clone and safe to share across request tasks.
#[derive(Debug, Clone)]
pub struct LlamaServerEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    info: EngineInfo,
}

impl LlamaServerEngine {
    /// Wait for the engine, then record what it reports about itself.
    ///
    /// Embedding support is only probed when `probe_embeddings` is set,
    /// since the probe runs a real forward pass.
    pub async fn connect(params: &EngineParams, probe_embeddings: bool) -> Result<Self, EngineError> {
        let base_url = params.endpoint.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to build HTTP client: {e}")))?;

        wait_for_health(
            &client,
            &base_url,
            Duration::from_secs(params.startup_timeout_secs),
        )
        .await?;

        let mut engine = Self {
            client,
            base_url,
            api_key: params.api_key.clone(),
            info: EngineInfo {
                model_path: params.model.clone(),
                max_model_len: None,
                features: EngineFeatures::default(),
            },
        };

        match engine.get_json::<ServerProps>("/props").await {
            Ok(props) => {
                engine.info.max_model_len = props.context_length();
                engine.info.features.vision = props.supports_vision();
                if let Some(path) = props.model_path {
                    engine.info.model_path = path;
                }
            }
            Err(e) => warn!(error = %e, "Engine does not expose /props; assuming text-only"),
        }

        if probe_embeddings {
            engine.info.features.embeddings = engine.probe_embeddings(&params.model).await;
        }

        info!(
            model_path = %engine.info.model_path,
            max_model_len = ?engine.info.max_model_len,
            vision = engine.info.features.vision,
            embeddings = engine.info.features.embeddings,
            "Inference engine connected"
        );

        Ok(engine)
    }

    async fn probe_embeddings(&self, model: &str) -> bool {
        let probe = json!({ "model": model, "input": "ping" });
        match self.post_json::<_, EmbeddingResponse>("/v1/embeddings", &probe).await {
            Ok(response) if !response.data.is_empty() => true,
            Ok(_) => {
                warn!("Embedding probe returned no vectors");
                false
            }
            Err(e) => {
                warn!(error = %e, "Embedding probe failed; start llama-server with --embeddings");
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngineError> {
        let response = self
            .authorize(self.client.get(self.url(path)).timeout(PROBE_TIMEOUT))
            .send()
            .await
            .map_err(map_transport)?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(map_transport)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        let response = self.send_post(path, body).await?;
        response.json().await.map_err(map_transport)
    }

    async fn send_post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, EngineError> {
        debug!(path, "Forwarding request to engine");
        let response = self
            .authorize(self.client.post(self.url(path)).json(body))
            .send()
            .await
            .map_err(map_transport)?;
        ensure_success(response).await
    }
}

#[async_trait]
impl InferenceEngine for LlamaServerEngine {
    fn info(&self) -> &EngineInfo {
        &self.info
    }

    async fn health(&self) -> Result<(), EngineError> {
        check_health(&self.client, &self.base_url).await
    }

    async fn chat_completion(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, EngineError> {
        request.stream = false;
        self.post_json("/v1/chat/completions", &request).await
    }

    async fn chat_completion_stream(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChunkStream, EngineError> {
        request.stream = true;
        let response = self.send_post("/v1/chat/completions", &request).await?;

        Ok(decode_chunks(response.bytes_stream())
            .map(|item| item.map_err(EngineError::from))
            .boxed())
    }

    async fn embeddings(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, EngineError> {
        if !self.info.features.embeddings {
            return Err(EngineError::Unsupported("embeddings".to_string()));
        }
        self.post_json("/v1/embeddings", &request).await
    }
}

fn map_transport(e: reqwest::Error) -> EngineError {
    if e.is_decode() {
        EngineError::Protocol(e.to_string())
    } else if e.is_body() {
        EngineError::Stream(e.to_string())
    } else {
        EngineError::Unavailable(e.to_string())
    }
}

/// Turn a non-2xx engine response into [`EngineError::Rejected`].
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").map(error_message))
        .unwrap_or(body);

    Err(EngineError::Rejected {
        status: status.as_u16(),
        message,
    })
}
