//! Process-wide sandbox configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// Default wall-clock deadline for one execution.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default per-stream capture cap (1 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Directory name created under the system temp dir when no scratch root
/// is configured.
pub const DEFAULT_SCRATCH_DIR_NAME: &str = "codelab-sandbox";

/// Read-only settings shared by every execution.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock deadline after which the process group is killed.
    pub timeout: Duration,
    /// Root under which per-request workspaces are created.
    pub scratch_root: PathBuf,
    /// Maximum bytes captured per stream; the rest is discarded.
    pub max_output_bytes: usize,
    /// Built-in runners to register at startup.
    pub languages: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            scratch_root: std::env::temp_dir().join(DEFAULT_SCRATCH_DIR_NAME),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            languages: vec!["python".to_string()],
        }
    }
}

impl SandboxConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                             |
    /// |----------------------------|-------------------------------------|
    /// | `SANDBOX_TIMEOUT_SECS`     | `5`                                 |
    /// | `SANDBOX_SCRATCH_DIR`      | `<system temp dir>/codelab-sandbox` |
    /// | `SANDBOX_MAX_OUTPUT_BYTES` | `1048576`                           |
    /// | `ALLOWED_LANGUAGES`        | `python`                            |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from an arbitrary
    /// key lookup, so parsing can be tested without touching the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timeout_secs: u64 = parse_or("SANDBOX_TIMEOUT_SECS", &lookup, DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(CoreError::Validation(
                "SANDBOX_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let scratch_root = lookup("SANDBOX_SCRATCH_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.scratch_root);

        let max_output_bytes: usize = parse_or(
            "SANDBOX_MAX_OUTPUT_BYTES",
            &lookup,
            DEFAULT_MAX_OUTPUT_BYTES,
        )?;
        if max_output_bytes == 0 {
            return Err(CoreError::Validation(
                "SANDBOX_MAX_OUTPUT_BYTES must be greater than zero".to_string(),
            ));
        }

        let languages: Vec<String> = lookup("ALLOWED_LANGUAGES")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.languages);
        if languages.is_empty() {
            return Err(CoreError::Validation(
                "ALLOWED_LANGUAGES must name at least one language".to_string(),
            ));
        }

        Ok(Self {
            timeout: Duration::from_secs(timeout_secs),
            scratch_root,
            max_output_bytes,
            languages,
        })
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T, CoreError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{key} must be a number, got '{raw}'"))),
    }
}
