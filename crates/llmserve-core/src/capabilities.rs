//! Capability resolution.
//!
//! `CapabilityConfig` is resolved exactly once, after the engine has been
//! initialized, and is read-only for the rest of the process. Every route
//! decision and every request bound is derived from it.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::GenerationError;
use crate::ports::EngineInfo;
use crate::settings::{EngineParams, GatewaySettings, ServerOptions, SettingsError};

/// Smallest `max_tokens` a generation request may ask for.
pub const MIN_GENERATION_TOKENS: u32 = 128;

/// Upper clamp applied to the engine's declared context length.
pub const MAX_TOKENS_CEILING: u32 = 4096;

/// Context length assumed when neither config nor engine declares one.
pub const DEFAULT_ENGINE_MAX_LEN: u32 = 2048;

/// Which public surfaces a deployment serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// Text (and optionally vision) generation endpoints are exposed.
    Generation,
    /// Only the OpenAI sub-API, including embeddings, is exposed.
    EmbeddingsOnly,
}

/// Capability errors. All of these abort startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("'{0}' is declared in the config but the engine does not support it")]
    UnsupportedByEngine(&'static str),

    #[error("embeddings-only mode requires embeddings support")]
    EmbeddingsOnlyWithoutEmbeddings,

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Immutable settings resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityConfig {
    /// Advertised model identifier (served name).
    pub model_id: String,
    pub engine_params: EngineParams,
    pub server_options: ServerOptions,
    pub supports_vision: bool,
    pub supports_embeddings: bool,
    pub mode: DeploymentMode,
    /// `min(declared engine max length, 4096)`, never below 1.
    pub max_tokens: u32,
}

impl CapabilityConfig {
    /// Resolve capabilities from settings and what the engine reported.
    ///
    /// Fails if a declared capability is not backed by the engine.
    pub fn resolve(settings: &GatewaySettings, engine: &EngineInfo) -> Result<Self, CapabilityError> {
        let server_options = ServerOptions::with_overlay(&settings.server_config)?;

        if settings.vision && !engine.features.vision {
            return Err(CapabilityError::UnsupportedByEngine("vision"));
        }
        if settings.embeddings && !engine.features.embeddings {
            return Err(CapabilityError::UnsupportedByEngine("embeddings"));
        }

        let mode = match settings.mode {
            Some(DeploymentMode::EmbeddingsOnly) if !settings.embeddings => {
                return Err(CapabilityError::EmbeddingsOnlyWithoutEmbeddings);
            }
            Some(mode) => mode,
            None if settings.embeddings => DeploymentMode::EmbeddingsOnly,
            None => DeploymentMode::Generation,
        };

        let declared = settings
            .engine_config
            .max_model_len
            .or(engine.max_model_len)
            .unwrap_or(DEFAULT_ENGINE_MAX_LEN);
        let max_tokens = declared.clamp(1, MAX_TOKENS_CEILING);

        if max_tokens < MIN_GENERATION_TOKENS && mode == DeploymentMode::Generation {
            tracing::warn!(
                max_tokens,
                min = MIN_GENERATION_TOKENS,
                "Engine context is shorter than the minimum generation length; \
                 every generation request will be rejected"
            );
        }

        let model_id = server_options
            .served_model_name
            .clone()
            .unwrap_or_else(|| settings.engine_config.model.clone());

        Ok(Self {
            model_id,
            engine_params: settings.engine_config.clone(),
            server_options,
            supports_vision: settings.vision,
            supports_embeddings: settings.embeddings,
            mode,
            max_tokens,
        })
    }

    /// Inclusive bounds for a generation request's `max_tokens`.
    pub fn token_bounds(&self) -> RangeInclusive<u32> {
        MIN_GENERATION_TOKENS..=self.max_tokens
    }

    /// Reject out-of-bounds `max_tokens` instead of clamping it.
    pub fn validate_max_tokens(&self, requested: u32) -> Result<u32, GenerationError> {
        if self.token_bounds().contains(&requested) {
            Ok(requested)
        } else {
            Err(GenerationError::MaxTokensOutOfRange {
                requested,
                min: MIN_GENERATION_TOKENS,
                max: self.max_tokens,
            })
        }
    }

    /// Whether the plain `generate` endpoint is exposed.
    pub fn exposes_generation(&self) -> bool {
        self.mode == DeploymentMode::Generation
    }

    /// Whether the vision-augmented `sights` endpoint is exposed.
    pub fn exposes_sights(&self) -> bool {
        self.supports_vision && self.exposes_generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::EngineFeatures;

    fn settings(max_model_len: Option<u32>) -> GatewaySettings {
        let mut engine_config = EngineParams::for_model("mistral-large");
        engine_config.max_model_len = max_model_len;
        GatewaySettings {
            engine_config,
            server_config: serde_json::Map::new(),
            service_config: crate::settings::ServiceConfig::default(),
            vision: false,
            embeddings: false,
            mode: None,
            build: None,
            requirements: Vec::new(),
        }
    }

    fn engine(max_model_len: Option<u32>, vision: bool, embeddings: bool) -> EngineInfo {
        EngineInfo {
            model_path: "/models/mistral-large.gguf".into(),
            max_model_len,
            features: EngineFeatures { vision, embeddings },
        }
    }

    #[test]
    fn test_max_tokens_clamped_to_ceiling() {
        let cfg = CapabilityConfig::resolve(&settings(Some(131_072)), &engine(None, false, false))
            .unwrap();
        assert_eq!(cfg.max_tokens, MAX_TOKENS_CEILING);
    }

    #[test]
    fn test_config_len_wins_over_engine_len() {
        let cfg = CapabilityConfig::resolve(&settings(Some(1024)), &engine(Some(8192), false, false))
            .unwrap();
        assert_eq!(cfg.max_tokens, 1024);
    }

    #[test]
    fn test_engine_len_used_when_config_silent() {
        let cfg =
            CapabilityConfig::resolve(&settings(None), &engine(Some(3000), false, false)).unwrap();
        assert_eq!(cfg.max_tokens, 3000);
    }

    #[test]
    fn test_default_len_when_nobody_declares() {
        let cfg = CapabilityConfig::resolve(&settings(None), &engine(None, false, false)).unwrap();
        assert_eq!(cfg.max_tokens, DEFAULT_ENGINE_MAX_LEN);
    }

    #[test]
    fn test_vision_without_engine_support_fails() {
        let mut s = settings(None);
        s.vision = true;
        assert_eq!(
            CapabilityConfig::resolve(&s, &engine(None, false, false)),
            Err(CapabilityError::UnsupportedByEngine("vision"))
        );
    }

    #[test]
    fn test_embeddings_without_engine_support_fails() {
        let mut s = settings(None);
        s.embeddings = true;
        assert_eq!(
            CapabilityConfig::resolve(&s, &engine(None, true, false)),
            Err(CapabilityError::UnsupportedByEngine("embeddings"))
        );
    }

    #[test]
    fn test_embeddings_flag_implies_embeddings_only_mode() {
        let mut s = settings(None);
        s.embeddings = true;
        s.vision = true;
        let cfg = CapabilityConfig::resolve(&s, &engine(None, true, true)).unwrap();
        assert_eq!(cfg.mode, DeploymentMode::EmbeddingsOnly);
        assert!(!cfg.exposes_generation());
        assert!(!cfg.exposes_sights());
    }

    #[test]
    fn test_explicit_generation_mode_with_embeddings() {
        let mut s = settings(None);
        s.embeddings = true;
        s.mode = Some(DeploymentMode::Generation);
        let cfg = CapabilityConfig::resolve(&s, &engine(None, false, true)).unwrap();
        assert!(cfg.exposes_generation());
        assert!(cfg.supports_embeddings);
    }

    #[test]
    fn test_served_model_name_overrides_model_id() {
        let mut s = settings(None);
        s.server_config
            .insert("served_model_name".into(), serde_json::json!("pirate-llm"));
        let cfg = CapabilityConfig::resolve(&s, &engine(None, false, false)).unwrap();
        assert_eq!(cfg.model_id, "pirate-llm");
    }

    #[test]
    fn test_validate_max_tokens_bounds() {
        let cfg = CapabilityConfig::resolve(&settings(Some(2048)), &engine(None, false, false))
            .unwrap();

        assert_eq!(cfg.validate_max_tokens(128), Ok(128));
        assert_eq!(cfg.validate_max_tokens(2048), Ok(2048));
        assert_eq!(
            cfg.validate_max_tokens(127),
            Err(GenerationError::MaxTokensOutOfRange {
                requested: 127,
                min: 128,
                max: 2048
            })
        );
        assert!(cfg.validate_max_tokens(2049).is_err());
    }
}
