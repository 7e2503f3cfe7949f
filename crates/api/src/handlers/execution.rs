//! Handlers for code execution and runner discovery.

use axum::extract::{Path, State};
use axum::Json;
use codelab_core::sandbox::engine::ExecutionRequest;
use codelab_core::sandbox::outcome::ExecutionReport;
use codelab_core::sandbox::runner::Runner;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteCodeRequest {
    /// Source code to run.
    pub code: String,
    /// Language identifier (default: `python`).
    #[serde(default = "default_language")]
    pub language: String,
    /// Optional standard input.
    #[serde(default)]
    pub stdin: Option<String>,
}

fn default_language() -> String {
    "python".to_string()
}

/// Public description of a registered runner.
#[derive(Debug, Serialize)]
pub struct LanguageInfo {
    pub language: String,
    pub aliases: Vec<String>,
    pub file_extension: String,
}

impl From<&Runner> for LanguageInfo {
    fn from(runner: &Runner) -> Self {
        Self {
            language: runner.language.clone(),
            aliases: runner.aliases.clone(),
            file_extension: runner.file_extension.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /execute
///
/// Run a snippet in the sandbox. Every engine result, including an
/// unsupported language or a timeout, is a 200 with an [`ExecutionReport`];
/// only malformed input is rejected with 400.
pub async fn execute_code(
    State(state): State<AppState>,
    Json(input): Json<ExecuteCodeRequest>,
) -> AppResult<Json<DataResponse<ExecutionReport>>> {
    if input.code.trim().is_empty() {
        return Err(AppError::BadRequest("code is required".to_string()));
    }

    let max = state.config.max_source_length;
    if input.code.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "Code is too long (max {max} characters)"
        )));
    }

    if input.language.trim().is_empty() {
        return Err(AppError::BadRequest("language is required".to_string()));
    }

    let request = ExecutionRequest {
        source: input.code,
        language: input.language,
        stdin: input.stdin,
    };
    let report = state.engine.run(&request).await;

    Ok(Json(DataResponse { data: report }))
}

/// GET /languages
///
/// List registered runners in registration order.
pub async fn list_languages(State(state): State<AppState>) -> Json<DataResponse<Vec<LanguageInfo>>> {
    let data = state
        .engine
        .registry()
        .runners()
        .iter()
        .map(LanguageInfo::from)
        .collect();
    Json(DataResponse { data })
}

/// GET /languages/{language}
///
/// Resolve a name or alias the same way `/execute` does.
pub async fn get_language(
    State(state): State<AppState>,
    Path(language): Path<String>,
) -> AppResult<Json<DataResponse<LanguageInfo>>> {
    let runner = state.engine.registry().resolve(&language)?;
    Ok(Json(DataResponse {
        data: LanguageInfo::from(runner),
    }))
}
