//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Default settings file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "llmserve.yaml";

/// Serve an inference engine behind an OpenAI-compatible API and a chat UI.
#[derive(Debug, Parser)]
#[command(name = "llmserve")]
#[command(version)]
pub struct Cli {
    /// Path to the YAML settings file
    #[arg(short = 'c', long, env = "LLMSERVE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override `service_config.host`
    #[arg(long, env = "LLMSERVE_HOST")]
    pub host: Option<String>,

    /// Override `service_config.port`
    #[arg(short = 'p', long, env = "LLMSERVE_PORT")]
    pub port: Option<u16>,

    /// Override `service_config.ui_dir`
    #[arg(long = "ui-dir", env = "LLMSERVE_UI_DIR")]
    pub ui_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is unset.
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
