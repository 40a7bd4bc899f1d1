//! Chat UI sub-application.
//!
//! `GET /` serves the entry document. Any other path serves the file under
//! the UI root if one exists there, otherwise the entry document, so client
//! side routes resolve. Paths are normalized and confined to the root
//! before the filesystem is consulted; `..` segments never escape it.

use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

/// Entry document of the chat UI, relative to the UI root.
pub const ENTRY_DOCUMENT: &str = "chat.html";

/// Build the UI router for assets under `root`.
pub fn ui_router(root: &Path) -> Router {
    let entry = root.join(ENTRY_DOCUMENT);

    // ServeDir rejects traversal and hands unresolvable paths to the fallback.
    // Directories count as unresolvable: no index.html lookup, no redirect.
    let assets = ServeDir::new(root)
        .append_index_html_on_directories(false)
        .fallback(ServeFile::new(&entry));

    Router::new()
        .route_service("/", ServeFile::new(&entry))
        .fallback_service(assets)
}
