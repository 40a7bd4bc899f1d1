//! Completions clients used by the generation surface.
//!
//! Which one is wired in is decided by `service_config.bridge`:
//!
//! - [`LoopbackClient`] calls the gateway's own `/v1/chat/completions` over
//!   HTTP on the loopback interface. The generate/sights surface then goes
//!   through exactly the same request path as any external OpenAI client,
//!   and the two surfaces can be versioned independently.
//! - [`InProcessClient`] hands the request straight to the [`EngineBridge`],
//!   skipping the network hop.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use llmserve_core::{
    ClientError, CompletionsClient, GenerationChunk, GenerationChunkStream, GenerationRequest,
};
use llmserve_proxy::EngineBridge;
use llmserve_runtime::decode_chunks;
use tracing::debug;

/// Placeholder bearer credential for the loopback hop. Not a secret; the
/// gateway is the only party on either end.
pub const LOOPBACK_API_KEY: &str = "dummy";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client bound to the gateway's own `/v1` endpoint.
#[derive(Debug, Clone)]
pub struct LoopbackClient {
    http: reqwest::Client,
    base_url: String,
}

impl LoopbackClient {
    /// Build a client for a gateway listening on `bound`.
    ///
    /// Wildcard binds (`0.0.0.0`, `::`) are reached through the matching
    /// loopback address.
    pub fn new(bound: SocketAddr) -> Result<Self, ClientError> {
        let ip = match bound.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        let target = SocketAddr::new(ip, bound.port());

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: format!("http://{target}/v1"),
        })
    }

    /// Base URL of the completions surface, e.g. `http://127.0.0.1:3000/v1`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionsClient for LoopbackClient {
    async fn stream_chat(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationChunkStream, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, "Dispatching generation over loopback");

        let response = self
            .http
            .post(&url)
            .bearer_auth(LOOPBACK_API_KEY)
            .json(&request.into_chat_request())
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_chunks(response.bytes_stream())
            .map(|item| {
                item.map(|chunk| GenerationChunk::from(&chunk))
                    .map_err(ClientError::from)
            })
            .boxed())
    }
}

/// Client that calls the engine bridge directly.
#[derive(Debug, Clone)]
pub struct InProcessClient {
    bridge: Arc<EngineBridge>,
}

impl InProcessClient {
    pub const fn new(bridge: Arc<EngineBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl CompletionsClient for InProcessClient {
    async fn stream_chat(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationChunkStream, ClientError> {
        self.bridge.complete(request).await.map_err(ClientError::from)
    }
}
