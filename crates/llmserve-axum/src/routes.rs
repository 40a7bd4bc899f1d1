//! Route table and router construction.
//!
//! The set of exposed endpoints is computed once from the resolved
//! [`CapabilityConfig`] by [`build_routes`], a pure function whose output can
//! be inspected and tested without starting a server. [`create_router`]
//! then mounts exactly the routes in that table; nothing is added or removed
//! afterwards.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{MethodRouter, get, post};
use llmserve_core::CapabilityConfig;
use llmserve_proxy::handlers as openai;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::{AppContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;
use crate::ui;

/// Path prefix of the UI sub-application.
pub const UI_PREFIX: &str = "/chat";

/// Which surface a route belongs to. The two sets never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteGroup {
    /// OpenAI-compatible sub-API under `/v1`.
    OpenAi,
    /// Custom streaming generation endpoints.
    Generation,
}

/// Every endpoint the gateway knows how to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListModels,
    ChatCompletions,
    Embeddings,
    Generate,
    Sights,
}

impl Endpoint {
    pub const fn path(self) -> &'static str {
        match self {
            Self::ListModels => "/v1/models",
            Self::ChatCompletions => "/v1/chat/completions",
            Self::Embeddings => "/v1/embeddings",
            Self::Generate => "/generate",
            Self::Sights => "/sights",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Self::ListModels => Method::GET,
            _ => Method::POST,
        }
    }

    pub const fn group(self) -> RouteGroup {
        match self {
            Self::ListModels | Self::ChatCompletions | Self::Embeddings => RouteGroup::OpenAi,
            Self::Generate | Self::Sights => RouteGroup::Generation,
        }
    }
}

/// One registered `(method, path)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: Method,
    pub path: &'static str,
    pub endpoint: Endpoint,
}

impl From<Endpoint> for RouteSpec {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            method: endpoint.method(),
            path: endpoint.path(),
            endpoint,
        }
    }
}

/// Immutable set of exposed routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<RouteSpec>,
}

impl RouteTable {
    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    pub fn contains(&self, endpoint: Endpoint) -> bool {
        self.routes.iter().any(|r| r.endpoint == endpoint)
    }

    /// Look up the route registered for `(method, path)`.
    pub fn find(&self, method: &Method, path: &str) -> Option<&RouteSpec> {
        self.routes
            .iter()
            .find(|r| r.method == *method && r.path == path)
    }

    /// Routes belonging to one surface.
    pub fn group(&self, group: RouteGroup) -> impl Iterator<Item = &RouteSpec> {
        self.routes
            .iter()
            .filter(move |r| r.endpoint.group() == group)
    }
}

/// Compose the route table from resolved capabilities.
///
/// - Models listing and chat completions are always exposed.
/// - Embeddings is exposed iff the deployment supports embeddings.
/// - `generate` is exposed unless the deployment is embeddings-only.
/// - `sights` additionally requires vision.
pub fn build_routes(capabilities: &CapabilityConfig) -> RouteTable {
    let mut endpoints = vec![Endpoint::ListModels, Endpoint::ChatCompletions];
    if capabilities.supports_embeddings {
        endpoints.push(Endpoint::Embeddings);
    }
    if capabilities.exposes_generation() {
        endpoints.push(Endpoint::Generate);
    }
    if capabilities.exposes_sights() {
        endpoints.push(Endpoint::Sights);
    }

    RouteTable {
        routes: endpoints.into_iter().map(RouteSpec::from).collect(),
    }
}

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

fn method_router(spec: &RouteSpec, state: &AppState) -> MethodRouter {
    let bridge = Arc::clone(&state.bridge);
    match spec.endpoint {
        Endpoint::ListModels => get(openai::list_models).with_state(bridge),
        Endpoint::ChatCompletions => post(openai::chat_completions).with_state(bridge),
        Endpoint::Embeddings => post(openai::embeddings).with_state(bridge),
        Endpoint::Generate => post(handlers::generate::generate).with_state(Arc::clone(state)),
        Endpoint::Sights => post(handlers::generate::sights).with_state(Arc::clone(state)),
    }
}

/// Create the gateway router.
///
/// Mounts every route in the context's table, `/health` and `/readyz`, and
/// the UI under [`UI_PREFIX`] when a UI root is configured.
pub fn create_router(ctx: AppContext, cors_config: &CorsConfig) -> Router {
    let state: AppState = Arc::new(ctx);

    let mut api = Router::new();
    for spec in state.routes.routes() {
        api = api.route(spec.path, method_router(spec, &state));
    }

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/readyz",
            get(handlers::health::readiness).with_state(Arc::clone(&state)),
        )
        .merge(api.layer(build_cors_layer(cors_config)));

    if let Some(root) = &state.ui_root {
        app = app.nest_service(UI_PREFIX, ui::ui_router(root));
    }

    app.layer(TraceLayer::new_for_http())
}
