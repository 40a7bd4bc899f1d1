#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod bootstrap;
pub mod client;
pub mod error;
pub mod generation;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod ui;

// Re-export primary types
pub use bootstrap::{AppContext, CorsConfig, Gateway, ServerConfig, prepare, start_server};
pub use client::{InProcessClient, LoopbackClient};
pub use error::HttpError;
pub use generation::{StreamingGenerationService, TextStream};
pub use routes::{Endpoint, RouteGroup, RouteSpec, RouteTable, build_routes, create_router};
pub use state::AppState;
