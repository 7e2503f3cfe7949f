//! Normalization of raw process results into [`ExecutionOutcome`]s.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::supervisor::{CapturedOutput, RawResult};

/// Stdout placeholder for a successful run that printed nothing at all.
pub const NO_OUTPUT_PLACEHOLDER: &str = "(No output)";

/// Terminal state of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The process exited on its own; `exit_code` says how.
    Completed,
    /// The deadline fired and the process group was killed.
    TimedOut,
    /// The interpreter could not be started.
    LaunchFailed,
}

/// Uniform result of one execution, populated on every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub stdout: String,
    /// Present only when something went wrong.
    pub stderr: Option<String>,
    /// Recorded for `Completed` only; `-1` when killed by a signal.
    pub exit_code: Option<i32>,
    /// Wall-clock time from request acceptance to assembly.
    pub elapsed: Duration,
    pub status: OutcomeStatus,
}

impl ExecutionOutcome {
    /// `Completed` with exit code 0.
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Completed && self.exit_code == Some(0)
    }
}

/// Applies the normalization rules for a given deadline.
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    timeout: Duration,
    max_output_bytes: usize,
}

impl ResultAssembler {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }

    pub fn assemble(&self, raw: RawResult, elapsed: Duration) -> ExecutionOutcome {
        match raw {
            RawResult::Exited {
                code: 0,
                stdout,
                stderr,
                ..
            } => {
                let silent = stdout.text.is_empty()
                    && stderr.text.is_empty()
                    && !stdout.truncated
                    && !stderr.truncated;
                let stdout = if silent {
                    NO_OUTPUT_PLACEHOLDER.to_string()
                } else {
                    self.render(stdout)
                };
                ExecutionOutcome {
                    stdout,
                    stderr: None,
                    exit_code: Some(0),
                    elapsed,
                    status: OutcomeStatus::Completed,
                }
            }
            RawResult::Exited {
                code,
                signal,
                stdout,
                stderr,
            } => {
                let stderr = if stderr.text.trim().is_empty() {
                    match signal {
                        Some(sig) => format!("Process terminated by signal {sig}"),
                        None => format!("Process exited with code {code}"),
                    }
                } else {
                    self.render(stderr)
                };
                ExecutionOutcome {
                    stdout: self.render(stdout),
                    stderr: Some(stderr),
                    exit_code: Some(code),
                    elapsed,
                    status: OutcomeStatus::Completed,
                }
            }
            RawResult::TimedOut { stdout, .. } => ExecutionOutcome {
                stdout: self.render(stdout),
                stderr: Some(timeout_notice(self.timeout)),
                exit_code: None,
                elapsed,
                status: OutcomeStatus::TimedOut,
            },
            RawResult::LaunchFailed { reason } => launch_failed(reason, elapsed),
        }
    }

    fn render(&self, captured: CapturedOutput) -> String {
        let mut text = captured.text;
        if captured.truncated {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!(
                "[output truncated after {} bytes]",
                self.max_output_bytes
            ));
        }
        text
    }
}

/// Outcome for a run that never got a process, e.g. because the workspace
/// could not be prepared.
pub fn launch_failed(reason: String, elapsed: Duration) -> ExecutionOutcome {
    ExecutionOutcome {
        stdout: String::new(),
        stderr: Some(reason),
        exit_code: None,
        elapsed,
        status: OutcomeStatus::LaunchFailed,
    }
}

/// Fixed human-readable notice used as stderr for timed-out runs.
pub fn timeout_notice(limit: Duration) -> String {
    format!("Execution timeout ({} limit exceeded)", describe_limit(limit))
}

fn describe_limit(limit: Duration) -> String {
    if limit.subsec_nanos() == 0 {
        match limit.as_secs() {
            1 => "1 second".to_string(),
            secs => format!("{secs} seconds"),
        }
    } else {
        format!("{} ms", limit.as_millis())
    }
}

// ---------------------------------------------------------------------------
// Wire contract
// ---------------------------------------------------------------------------

/// Status vocabulary exposed to callers; adds `UnsupportedLanguage`, which
/// never reaches the process layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Completed,
    TimedOut,
    LaunchFailed,
    UnsupportedLanguage,
}

impl From<OutcomeStatus> for ReportStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Completed => Self::Completed,
            OutcomeStatus::TimedOut => Self::TimedOut,
            OutcomeStatus::LaunchFailed => Self::LaunchFailed,
        }
    }
}

/// Serializable result handed to collaborators such as the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub stdout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub elapsed_seconds: f64,
    pub status: ReportStatus,
}

impl ExecutionReport {
    pub fn unsupported_language(language: &str, elapsed: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: Some(format!("Language '{language}' is not supported")),
            exit_code: None,
            elapsed_seconds: elapsed.as_secs_f64(),
            status: ReportStatus::UnsupportedLanguage,
        }
    }
}

impl From<ExecutionOutcome> for ExecutionReport {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: outcome.exit_code,
            elapsed_seconds: outcome.elapsed.as_secs_f64(),
            status: outcome.status.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
