//! Startup-level error type.
//!
//! Everything here is fatal: it is raised before the server accepts a
//! connection and aborts the process.

use thiserror::Error;

use crate::capabilities::CapabilityError;
use crate::ports::EngineError;
use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Capability resolution failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Engine initialization failed: {0}")]
    Engine(#[from] EngineError),
}
