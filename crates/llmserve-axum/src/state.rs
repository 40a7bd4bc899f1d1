//! Shared application state type.

use std::sync::Arc;

use crate::bootstrap::AppContext;

/// Application state shared across all gateway handlers.
pub type AppState = Arc<AppContext>;
