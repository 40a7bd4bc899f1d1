//! Settings file loading.
//!
//! The file is YAML with the sections of [`GatewaySettings`]. Command-line
//! flags override `service_config` fields after the file is read.

use std::path::Path;

use llmserve_core::GatewaySettings;

use crate::error::CliError;
use crate::parser::Cli;

/// Read and deserialize a settings file.
pub fn load_settings(path: &Path) -> Result<GatewaySettings, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&raw).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_settings(raw: &str) -> Result<GatewaySettings, serde_yaml::Error> {
    serde_yaml::from_str(raw)
}

/// Apply `--host`, `--port` and `--ui-dir`.
pub fn apply_overrides(settings: &mut GatewaySettings, cli: &Cli) {
    let service = &mut settings.service_config;
    if let Some(host) = &cli.host {
        service.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        service.port = port;
    }
    if let Some(dir) = &cli.ui_dir {
        service.ui_dir = Some(dir.clone());
    }
}
