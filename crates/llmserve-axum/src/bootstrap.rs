//! Gateway bootstrap - the composition root.
//!
//! This module is the only place where the engine, the completions surface
//! and the generation surface are wired together. Startup order is fixed:
//!
//! 1. validate settings
//! 2. connect to the engine and read what it reports about itself
//! 3. resolve capabilities
//! 4. bind the listener and build the route table
//! 5. serve until the cancellation token fires
//!
//! Any failure before step 5 aborts startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use llmserve_core::{
    BridgeMode, CapabilityConfig, ClientError, CompletionsClient, CoreError, GatewaySettings,
    InferenceEngine, ServiceConfig, validate_settings,
};
use llmserve_proxy::EngineBridge;
use llmserve_runtime::LlamaServerEngine;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{InProcessClient, LoopbackClient};
use crate::generation::StreamingGenerationService;
use crate::routes::{RouteTable, UI_PREFIX, build_routes, create_router};

/// CORS configuration for the gateway.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins.
    #[default]
    AllowAll,
    /// Allow specific origins.
    AllowOrigins(Vec<String>),
}

/// Listener configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port for the HTTP server.
    pub port: u16,
    /// Directory holding the chat UI, if it should be served.
    pub ui_dir: Option<PathBuf>,
    /// How `/generate` and `/sights` reach `/v1/chat/completions`.
    pub bridge: BridgeMode,
    /// CORS configuration.
    pub cors: CorsConfig,
}

impl ServerConfig {
    pub fn from_service(service: &ServiceConfig) -> Self {
        Self {
            host: service.host.clone(),
            port: service.port,
            ui_dir: service.ui_dir.clone(),
            bridge: service.bridge,
            cors: service
                .cors_origins
                .clone()
                .map_or(CorsConfig::AllowAll, CorsConfig::AllowOrigins),
        }
    }

    /// Set the directory the chat UI is served from.
    #[must_use]
    pub fn with_ui_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.ui_dir = Some(path.into());
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_service(&ServiceConfig::default())
    }
}

/// Everything a request handler may need, built once at startup.
pub struct AppContext {
    pub capabilities: CapabilityConfig,
    pub engine: Arc<dyn InferenceEngine>,
    /// Backs the `/v1` sub-API.
    pub bridge: Arc<EngineBridge>,
    /// Backs `/generate` and `/sights`.
    pub generation: StreamingGenerationService,
    pub routes: RouteTable,
    pub ui_root: Option<PathBuf>,
}

impl AppContext {
    /// Wire the context for a gateway listening on `bound`.
    ///
    /// In loopback mode the generation surface calls back into `bound`.
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        capabilities: CapabilityConfig,
        bridge_mode: BridgeMode,
        bound: SocketAddr,
    ) -> Result<Self, ClientError> {
        let bridge = Arc::new(EngineBridge::new(Arc::clone(&engine), &capabilities));
        let client: Arc<dyn CompletionsClient> = match bridge_mode {
            BridgeMode::Loopback => {
                let client = LoopbackClient::new(bound)?;
                info!(base_url = client.base_url(), "Generation surface uses loopback bridge");
                Arc::new(client)
            }
            BridgeMode::InProcess => {
                info!("Generation surface uses in-process bridge");
                Arc::new(InProcessClient::new(Arc::clone(&bridge)))
            }
        };
        Ok(Self::assemble(engine, capabilities, bridge, client))
    }

    /// Wire the context with the in-process bridge. Needs no listener.
    pub fn in_process(engine: Arc<dyn InferenceEngine>, capabilities: CapabilityConfig) -> Self {
        let bridge = Arc::new(EngineBridge::new(Arc::clone(&engine), &capabilities));
        let client = Arc::new(InProcessClient::new(Arc::clone(&bridge)));
        Self::assemble(engine, capabilities, bridge, client)
    }

    /// Serve the chat UI from `root`.
    #[must_use]
    pub fn with_ui_root(mut self, root: Option<PathBuf>) -> Self {
        self.ui_root = root;
        self
    }

    fn assemble(
        engine: Arc<dyn InferenceEngine>,
        capabilities: CapabilityConfig,
        bridge: Arc<EngineBridge>,
        client: Arc<dyn CompletionsClient>,
    ) -> Self {
        let routes = build_routes(&capabilities);
        let generation = StreamingGenerationService::new(client, &capabilities);
        Self {
            capabilities,
            engine,
            bridge,
            generation,
            routes,
            ui_root: None,
        }
    }
}

/// A bound, fully wired gateway that has not started serving yet.
pub struct Gateway {
    listener: TcpListener,
    local_addr: SocketAddr,
    routes: RouteTable,
    router: Router,
}

impl Gateway {
    /// Bind the configured address and wire the gateway.
    pub async fn bind(
        config: &ServerConfig,
        engine: Arc<dyn InferenceEngine>,
        capabilities: CapabilityConfig,
    ) -> Result<Self> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        Self::from_listener(listener, config, engine, capabilities)
    }

    /// Wire the gateway onto an already bound listener.
    ///
    /// The listener's real address is used for the loopback bridge, so an
    /// ephemeral port works.
    pub fn from_listener(
        listener: TcpListener,
        config: &ServerConfig,
        engine: Arc<dyn InferenceEngine>,
        capabilities: CapabilityConfig,
    ) -> Result<Self> {
        let local_addr = listener.local_addr()?;

        let ui_root = config.ui_dir.clone().filter(|dir| {
            let present = dir.is_dir();
            if !present {
                warn!(ui_dir = %dir.display(), "UI directory not found; chat UI disabled");
            }
            present
        });

        let ctx = AppContext::new(engine, capabilities, config.bridge, local_addr)
            .context("Failed to build completions client")?
            .with_ui_root(ui_root.clone());
        let routes = ctx.routes.clone();

        for spec in routes.routes() {
            info!(method = %spec.method, path = spec.path, "Route registered");
        }
        if let Some(root) = &ui_root {
            info!(prefix = UI_PREFIX, root = %root.display(), "Serving chat UI");
        }

        let router = create_router(ctx, &config.cors);
        Ok(Self {
            listener,
            local_addr,
            routes,
            router,
        })
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub const fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Serve until `cancel` fires, then drain in-flight requests.
    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        info!("llmserve gateway listening on http://{}", self.local_addr);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await?;
        info!("llmserve gateway stopped");
        Ok(())
    }
}

/// Validate settings, connect to the engine and resolve capabilities.
pub async fn prepare(
    settings: &GatewaySettings,
) -> Result<(Arc<dyn InferenceEngine>, CapabilityConfig), CoreError> {
    validate_settings(settings)?;

    info!(
        endpoint = %settings.engine_config.endpoint,
        model = %settings.engine_config.model,
        "Connecting to inference engine"
    );
    let engine = LlamaServerEngine::connect(&settings.engine_config, settings.embeddings).await?;

    let capabilities = CapabilityConfig::resolve(settings, engine.info())?;
    info!(
        model_id = %capabilities.model_id,
        mode = ?capabilities.mode,
        vision = capabilities.supports_vision,
        embeddings = capabilities.supports_embeddings,
        max_tokens = capabilities.max_tokens,
        "Capabilities resolved"
    );
    let ignored: Vec<&str> = capabilities
        .server_options
        .extra
        .keys()
        .map(String::as_str)
        .collect();
    if !ignored.is_empty() {
        warn!(keys = ?ignored, "Ignoring unrecognized server_config keys");
    }

    Ok((Arc::new(engine), capabilities))
}

/// Start the gateway and serve until `cancel` fires.
pub async fn start_server(settings: GatewaySettings, cancel: CancellationToken) -> Result<()> {
    let (engine, capabilities) = prepare(&settings)
        .await
        .context("Gateway startup failed")?;

    let config = ServerConfig::from_service(&settings.service_config);
    Gateway::bind(&config, engine, capabilities)
        .await?
        .serve(cancel)
        .await
}
