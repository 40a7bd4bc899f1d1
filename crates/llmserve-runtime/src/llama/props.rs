//! Subset of llama-server's `GET /props` response.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServerProps {
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub default_generation_settings: Option<GenerationSettings>,
    #[serde(default)]
    pub modalities: Option<Modalities>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerationSettings {
    #[serde(default)]
    pub n_ctx: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Modalities {
    #[serde(default)]
    pub vision: bool,
}

impl ServerProps {
    pub fn context_length(&self) -> Option<u32> {
        self.default_generation_settings
            .as_ref()
            .and_then(|s| s.n_ctx)
            .filter(|&n| n > 0)
    }

    pub fn supports_vision(&self) -> bool {
        self.modalities.as_ref().is_some_and(|m| m.vision)
    }
}
