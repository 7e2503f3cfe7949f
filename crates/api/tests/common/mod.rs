use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use codelab_api::config::ServerConfig;
use codelab_api::router::build_app_router;
use codelab_api::state::AppState;
use codelab_core::sandbox::config::SandboxConfig;
use codelab_core::sandbox::engine::ExecutionEngine;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a 30-second request timeout and a 100-character source limit so the
/// length check is cheap to exercise.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_source_length: 100,
    }
}

/// Build the full application router backed by an engine that only knows
/// the `shell` runner and keeps its workspaces under `scratch_root`.
pub fn build_test_app(scratch_root: &Path) -> Router {
    let config = test_config();
    let sandbox = SandboxConfig {
        timeout: Duration::from_millis(500),
        scratch_root: scratch_root.to_path_buf(),
        max_output_bytes: 64 * 1024,
        languages: vec!["shell".to_string()],
    };
    let engine = ExecutionEngine::from_config(&sandbox).expect("build engine");

    let state = AppState {
        config: Arc::new(config.clone()),
        engine: Arc::new(engine),
    };
    build_app_router(state, &config)
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
