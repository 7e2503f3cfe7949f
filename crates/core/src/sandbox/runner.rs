//! Runner descriptors and the language registry.
//!
//! A [`Runner`] describes how to launch one interpreter or compiler against a
//! source file. The [`RunnerRegistry`] is filled once at startup and is only
//! read afterwards, so lookups need no synchronization.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::CoreError;

/// Placeholder replaced by the absolute path of the workspace source file.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Placeholder replaced by the absolute path of the workspace directory.
pub const DIR_PLACEHOLDER: &str = "{dir}";

/// Names of the runners that [`Runner::builtin`] knows about.
pub const BUILTIN_LANGUAGES: &[&str] = &["python", "javascript", "shell"];

/// How to invoke one interpreter or compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runner {
    /// Canonical language identifier, lowercase.
    pub language: String,
    /// Additional identifiers that resolve to this runner.
    pub aliases: Vec<String>,
    /// Program followed by its arguments. May reference [`FILE_PLACEHOLDER`]
    /// and [`DIR_PLACEHOLDER`].
    pub launch_args: Vec<String>,
    /// Extension of the source file, without the leading dot.
    pub file_extension: String,
    /// Environment applied on top of the ambient environment.
    pub env_overrides: BTreeMap<String, String>,
}

impl Runner {
    pub fn new<I, S>(language: &str, launch_args: I, file_extension: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            language: language.to_lowercase(),
            aliases: Vec::new(),
            launch_args: launch_args.into_iter().map(Into::into).collect(),
            file_extension: file_extension.trim_start_matches('.').to_string(),
            env_overrides: BTreeMap::new(),
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_lowercase());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env_overrides.insert(key.to_string(), value.to_string());
        self
    }

    /// CPython 3, with UTF-8 forced on the standard streams.
    pub fn python() -> Self {
        Self::new("python", ["python3", FILE_PLACEHOLDER], "py")
            .with_alias("python3")
            .with_alias("py")
            .with_env("PYTHONIOENCODING", "utf-8")
            .with_env("PYTHONDONTWRITEBYTECODE", "1")
    }

    /// Node.js.
    pub fn javascript() -> Self {
        Self::new("javascript", ["node", FILE_PLACEHOLDER], "js")
            .with_alias("js")
            .with_alias("node")
    }

    /// POSIX shell.
    pub fn shell() -> Self {
        Self::new("shell", ["sh", FILE_PLACEHOLDER], "sh").with_alias("sh")
    }

    /// Look up a built-in runner by name or alias (case-insensitive).
    pub fn builtin(name: &str) -> Option<Self> {
        [Self::python(), Self::javascript(), Self::shell()]
            .into_iter()
            .find(|runner| runner.answers_to(name))
    }

    /// Canonical name followed by all aliases.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.language.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    fn answers_to(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.identifiers().any(|id| id == name)
    }

    /// Expand the launch template for a concrete workspace.
    pub fn command_line(&self, file: &Path, dir: &Path) -> Vec<String> {
        let file = file.to_string_lossy();
        let dir = dir.to_string_lossy();
        self.launch_args
            .iter()
            .map(|arg| {
                arg.replace(FILE_PLACEHOLDER, &file)
                    .replace(DIR_PLACEHOLDER, &dir)
            })
            .collect()
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.language.trim().is_empty() {
            return Err(CoreError::Validation(
                "Runner language must not be empty".to_string(),
            ));
        }
        if self.launch_args.first().map_or(true, |program| program.is_empty()) {
            return Err(CoreError::Validation(format!(
                "Runner '{}' has no program to launch",
                self.language
            )));
        }
        if self.file_extension.is_empty() || self.file_extension.contains('/') {
            return Err(CoreError::Validation(format!(
                "Runner '{}' has an invalid file extension '{}'",
                self.language, self.file_extension
            )));
        }
        Ok(())
    }
}

/// Language identifier to [`Runner`] mapping.
///
/// Built during startup, then shared behind an `Arc` and never mutated.
#[derive(Debug, Default)]
pub struct RunnerRegistry {
    runners: Vec<Runner>,
    /// Lowercase identifier (name or alias) to index into `runners`.
    index: HashMap<String, usize>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from built-in runner names, e.g. the parsed
    /// `ALLOWED_LANGUAGES` list.
    pub fn from_builtin<S: AsRef<str>>(languages: &[S]) -> Result<Self, CoreError> {
        let mut registry = Self::new();
        for name in languages {
            let name = name.as_ref();
            let runner = Runner::builtin(name).ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown built-in language '{name}' (known: {})",
                    BUILTIN_LANGUAGES.join(", ")
                ))
            })?;
            registry.register(runner)?;
        }
        Ok(registry)
    }

    /// Add a runner. Fails if it is malformed or any of its identifiers is
    /// already taken.
    pub fn register(&mut self, runner: Runner) -> Result<(), CoreError> {
        runner.validate()?;

        if let Some(taken) = runner.identifiers().find(|id| self.index.contains_key(*id)) {
            return Err(CoreError::Validation(format!(
                "Language identifier '{taken}' is already registered"
            )));
        }

        let slot = self.runners.len();
        for id in runner.identifiers() {
            self.index.insert(id.to_string(), slot);
        }
        tracing::debug!(
            language = %runner.language,
            program = %runner.launch_args[0],
            "Registered runner"
        );
        self.runners.push(runner);
        Ok(())
    }

    /// Case-insensitive lookup by name or alias.
    pub fn resolve(&self, language: &str) -> Result<&Runner, CoreError> {
        self.index
            .get(&language.trim().to_lowercase())
            .map(|&slot| &self.runners[slot])
            .ok_or_else(|| CoreError::UnsupportedLanguage(language.to_string()))
    }

    /// Registered runners in registration order.
    pub fn runners(&self) -> &[Runner] {
        &self.runners
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
