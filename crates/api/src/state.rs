use std::sync::Arc;

use codelab_core::sandbox::engine::ExecutionEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc` and read-only.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The sandboxed execution engine, built once at startup.
    pub engine: Arc<ExecutionEngine>,
}
