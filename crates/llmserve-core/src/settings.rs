//! Settings domain types and validation.
//!
//! These are the structured settings the gateway consumes. Parsing the
//! YAML file is the CLI's concern; everything here is plain serde types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capabilities::DeploymentMode;

/// Default port for the public gateway.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind host for the public gateway.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default base URL of the engine process.
pub const DEFAULT_ENGINE_ENDPOINT: &str = "http://127.0.0.1:8080";

const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 120;

/// Top-level gateway settings, one per process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Engine parameters.
    pub engine_config: EngineParams,

    /// Flat overlay applied onto [`ServerOptions`] defaults.
    #[serde(default)]
    pub server_config: Map<String, Value>,

    /// Listener, UI and bridge settings.
    #[serde(default)]
    pub service_config: ServiceConfig,

    /// Expose the vision-augmented generation endpoint.
    #[serde(default)]
    pub vision: bool,

    /// Expose the embeddings endpoint.
    #[serde(default)]
    pub embeddings: bool,

    /// Explicit deployment mode. Inferred from `embeddings` when absent.
    #[serde(default)]
    pub mode: Option<DeploymentMode>,

    /// Image build directives. Accepted for compatibility, never read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Value>,

    /// Extra packages for image builds. Accepted for compatibility, never read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
}

/// Parameters handed to the inference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Externally advertised model identifier.
    pub model: String,

    /// Context length ceiling. Probed from the engine when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_model_len: Option<u32>,

    /// Base URL of the OpenAI-compatible engine process.
    #[serde(default = "default_engine_endpoint")]
    pub endpoint: String,

    /// Credential for the engine process, if it requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// How long to wait for the engine to report healthy at startup.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// Engine-specific tuning, untouched by the gateway.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EngineParams {
    /// Parameters for a model with all other fields defaulted.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_model_len: None,
            endpoint: default_engine_endpoint(),
            api_key: None,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
            extra: Map::new(),
        }
    }
}

fn default_engine_endpoint() -> String {
    DEFAULT_ENGINE_ENDPOINT.to_string()
}

const fn default_startup_timeout() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_SECS
}

/// How the generation surface reaches the completions surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeMode {
    /// HTTP call to the gateway's own `/v1/chat/completions` on loopback.
    /// Keeps the two surfaces independently versionable.
    #[default]
    Loopback,
    /// Direct call into the engine bridge, no network hop.
    InProcess,
}

/// Listener and surface settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `chat.html` and its assets.
    pub ui_dir: Option<PathBuf>,
    pub bridge: BridgeMode,
    /// Allowed CORS origins. `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            ui_dir: None,
            bridge: BridgeMode::default(),
            cors_origins: None,
        }
    }
}

/// Request-handling defaults for the completions surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Role reported on generated messages.
    pub response_role: String,
    /// Name advertised on `/models`. Defaults to the configured model id.
    /// Accepts a string or a one-element list.
    #[serde(deserialize_with = "served_name")]
    pub served_model_name: Option<String>,
    /// Prompt characters kept when logging requests.
    pub max_log_len: usize,
    /// Suppress per-request logging.
    pub disable_log_requests: bool,
    /// Keys the gateway does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            response_role: "assistant".to_string(),
            served_model_name: None,
            max_log_len: 1000,
            disable_log_requests: true,
            extra: Map::new(),
        }
    }
}

fn served_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Names {
        One(String),
        List(Vec<String>),
    }

    match Option::<Names>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Names::One(name)) => Ok(Some(name)),
        Some(Names::List(names)) => match <[String; 1]>::try_from(names) {
            Ok([name]) => Ok(Some(name)),
            Err(names) if names.is_empty() => Ok(None),
            Err(names) => Err(serde::de::Error::custom(format!(
                "served_model_name accepts a single name, got {}",
                names.len()
            ))),
        },
    }
}

impl ServerOptions {
    /// Apply a flat key/value overlay onto the defaults.
    pub fn with_overlay(overlay: &Map<String, Value>) -> Result<Self, SettingsError> {
        let mut merged = match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(SettingsError::InvalidServerOption(e.to_string())),
        };
        for (key, value) in overlay {
            merged.insert(key.clone(), value.clone());
        }

        serde_json::from_value(Value::Object(merged))
            .map_err(|e| SettingsError::InvalidServerOption(e.to_string()))
    }

    /// Truncate a prompt for logging.
    pub fn log_excerpt<'a>(&self, prompt: &'a str) -> &'a str {
        match prompt.char_indices().nth(self.max_log_len) {
            Some((idx, _)) => &prompt[..idx],
            None => prompt,
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("engine_config.model cannot be empty")]
    EmptyModel,

    #[error("engine_config.max_model_len must be greater than zero")]
    ZeroMaxModelLen,

    #[error("engine_config.endpoint must be an http(s) URL, got {0}")]
    InvalidEndpoint(String),

    #[error("service_config.port must be non-zero")]
    InvalidPort,

    #[error("mode 'embeddings_only' requires 'embeddings: true'")]
    EmbeddingsOnlyWithoutEmbeddings,

    #[error("Invalid server_config: {0}")]
    InvalidServerOption(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &GatewaySettings) -> Result<(), SettingsError> {
    if settings.engine_config.model.trim().is_empty() {
        return Err(SettingsError::EmptyModel);
    }

    if settings.engine_config.max_model_len == Some(0) {
        return Err(SettingsError::ZeroMaxModelLen);
    }

    let endpoint = &settings.engine_config.endpoint;
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(SettingsError::InvalidEndpoint(endpoint.clone()));
    }

    if settings.service_config.port == 0 {
        return Err(SettingsError::InvalidPort);
    }

    if settings.mode == Some(DeploymentMode::EmbeddingsOnly) && !settings.embeddings {
        return Err(SettingsError::EmbeddingsOnlyWithoutEmbeddings);
    }

    ServerOptions::with_overlay(&settings.server_config)?;

    Ok(())
}
