//! CLI error type and exit codes.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl CliError {
    /// Map error to an exit code (see sysexits.h).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Io { .. } => 66,     // EX_NOINPUT
            Self::Config { .. } => 78, // EX_CONFIG
        }
    }
}
