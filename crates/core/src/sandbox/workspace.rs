//! Per-request scratch workspaces.
//!
//! Every [`Workspace`] is a fresh directory named by a random UUID under the
//! configured scratch root, holding exactly one source file. It is released
//! exactly once: explicitly through [`Workspace::release`], or by its `Drop`
//! impl if the owning request panicked or was cancelled first. Removal is
//! best-effort; failures are logged and never returned.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Base name of the source file inside a workspace.
pub const SOURCE_FILE_STEM: &str = "main";

/// Creates workspaces under a private scratch root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a uniquely named workspace and write `source` into it verbatim.
    ///
    /// Uniqueness comes from the random directory name plus an exclusive
    /// create, so concurrent callers never share a path.
    pub async fn acquire(&self, source: &str, extension: &str) -> io::Result<Workspace> {
        tokio::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.root)
            .await?;

        let dir = self.root.join(format!("run-{}", Uuid::new_v4()));
        tokio::fs::DirBuilder::new()
            .mode(0o700)
            .create(&dir)
            .await?;

        let file = dir.join(format!("{SOURCE_FILE_STEM}.{extension}"));
        // From here on the directory is owned by `workspace`, so an error
        // while writing still removes it on drop.
        let workspace = Workspace {
            dir,
            file,
            released: false,
        };
        workspace.write_source(source).await?;

        tracing::debug!(path = %workspace.dir.display(), "Workspace acquired");
        Ok(workspace)
    }
}

/// Exclusively owned scratch directory for one execution.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    file: PathBuf,
    released: bool,
}

impl Workspace {
    /// Directory holding the source file; used as the child's working dir.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of the source file.
    pub fn file_path(&self) -> &Path {
        &self.file
    }

    async fn write_source(&self, source: &str) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut f = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&self.file)
            .await?;
        f.write_all(source.as_bytes()).await?;
        f.flush().await
    }

    /// Remove the workspace directory. Errors are logged, not returned.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => tracing::debug!(path = %self.dir.display(), "Workspace released"),
            Err(e) => log_cleanup_failure(&self.dir, &e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        tracing::debug!(path = %self.dir.display(), "Workspace dropped without release");
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            log_cleanup_failure(&self.dir, &e);
        }
    }
}

fn log_cleanup_failure(dir: &Path, err: &io::Error) {
    // Already gone is fine.
    if err.kind() == io::ErrorKind::NotFound {
        return;
    }
    tracing::warn!(path = %dir.display(), error = %err, "Failed to remove workspace");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
