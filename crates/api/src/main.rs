use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codelab_api::config::ServerConfig;
use codelab_api::router::build_app_router;
use codelab_api::state::AppState;
use codelab_core::sandbox::config::SandboxConfig;
use codelab_core::sandbox::engine::ExecutionEngine;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "codelab_api=debug,codelab_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let sandbox = SandboxConfig::from_env().expect("Invalid sandbox configuration");
    if config.request_timeout_secs <= sandbox.timeout.as_secs() {
        tracing::warn!(
            request_timeout_secs = config.request_timeout_secs,
            sandbox_timeout_secs = sandbox.timeout.as_secs(),
            "HTTP request timeout does not exceed the sandbox deadline"
        );
    }

    // --- Execution engine ---
    let engine = ExecutionEngine::from_config(&sandbox).expect("Failed to build execution engine");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        engine: Arc::new(engine),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped");
}

/// Resolve when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
