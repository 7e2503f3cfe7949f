//! Per-request orchestration of the sandbox components.
//!
//! One call walks a fixed path:
//! 1. Resolve the runner (unknown languages stop here, before any I/O).
//! 2. Acquire a workspace holding the source.
//! 3. Supervise the process until exit or deadline.
//! 4. Assemble the outcome.
//! 5. Release the workspace.
//!
//! The engine keeps no per-request state; it is built once at startup and
//! shared behind an `Arc`.

use std::time::{Duration, Instant};

use serde::Deserialize;

use super::config::SandboxConfig;
use super::outcome::{self, ExecutionOutcome, ExecutionReport, ResultAssembler};
use super::runner::RunnerRegistry;
use super::supervisor::ProcessSupervisor;
use super::workspace::WorkspaceManager;
use crate::error::CoreError;

/// One submitted snippet. Length limits are the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutionRequest {
    pub source: String,
    pub language: String,
    #[serde(default)]
    pub stdin: Option<String>,
}

impl ExecutionRequest {
    pub fn new(source: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language: language.into(),
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// Runs untrusted snippets to completion or timeout.
#[derive(Debug)]
pub struct ExecutionEngine {
    registry: RunnerRegistry,
    workspaces: WorkspaceManager,
    supervisor: ProcessSupervisor,
    assembler: ResultAssembler,
    timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(config: &SandboxConfig, registry: RunnerRegistry) -> Self {
        Self {
            registry,
            workspaces: WorkspaceManager::new(config.scratch_root.clone()),
            supervisor: ProcessSupervisor::new(config.max_output_bytes),
            assembler: ResultAssembler::new(config.timeout, config.max_output_bytes),
            timeout: config.timeout,
        }
    }

    /// Build an engine whose registry holds the built-in runners named in
    /// `config.languages`.
    pub fn from_config(config: &SandboxConfig) -> Result<Self, CoreError> {
        let registry = RunnerRegistry::from_builtin(&config.languages)?;
        tracing::info!(
            languages = ?config.languages,
            timeout_ms = config.timeout.as_millis() as u64,
            scratch_root = %config.scratch_root.display(),
            "Execution engine configured"
        );
        Ok(Self::new(config, registry))
    }

    pub fn registry(&self) -> &RunnerRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute one request.
    ///
    /// Returns `Err(CoreError::UnsupportedLanguage)` without touching the
    /// filesystem when the language is not registered. Every other result,
    /// launch failures included, is a populated [`ExecutionOutcome`].
    #[tracing::instrument(skip_all, fields(language = %request.language))]
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, CoreError> {
        let started = Instant::now();

        let runner = self.registry.resolve(&request.language)?;

        let workspace = match self
            .workspaces
            .acquire(&request.source, &runner.file_extension)
            .await
        {
            Ok(ws) => ws,
            Err(e) => {
                tracing::error!(error = %e, "Failed to prepare workspace");
                return Ok(outcome::launch_failed(
                    format!("Failed to prepare workspace: {e}"),
                    started.elapsed(),
                ));
            }
        };

        let raw = self
            .supervisor
            .run(runner, &workspace, request.stdin.as_deref(), self.timeout)
            .await;
        let outcome = self.assembler.assemble(raw, started.elapsed());

        workspace.release().await;

        tracing::info!(
            status = ?outcome.status,
            succeeded = outcome.succeeded(),
            exit_code = ?outcome.exit_code,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Execution finished"
        );
        Ok(outcome)
    }

    /// Like [`execute`](Self::execute), but folds every result, including an
    /// unsupported language, into the serializable call contract.
    pub async fn run(&self, request: &ExecutionRequest) -> ExecutionReport {
        let started = Instant::now();
        match self.execute(request).await {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                tracing::info!(error = %e, "Rejected unsupported language");
                ExecutionReport::unsupported_language(&request.language, started.elapsed())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
