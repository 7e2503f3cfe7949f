use std::path::Path;
use std::time::Duration;

use codelab_core::sandbox::config::SandboxConfig;
use codelab_core::sandbox::engine::ExecutionEngine;
use codelab_core::sandbox::runner::{Runner, RunnerRegistry, FILE_PLACEHOLDER};

/// Build an engine rooted at `scratch_root` with the `shell` runner and a
/// runner pointing at an interpreter that does not exist.
pub fn test_engine(scratch_root: &Path, timeout: Duration) -> ExecutionEngine {
    let config = SandboxConfig {
        timeout,
        scratch_root: scratch_root.to_path_buf(),
        max_output_bytes: 64 * 1024,
        languages: vec!["shell".to_string()],
    };

    let mut registry = RunnerRegistry::new();
    registry.register(Runner::shell()).expect("register shell");
    registry
        .register(Runner::new(
            "ghost",
            ["/nonexistent/bin/ghost", FILE_PLACEHOLDER],
            "ghost",
        ))
        .expect("register ghost");

    ExecutionEngine::new(&config, registry)
}

/// `true` if the scratch root holds no workspaces (or was never created).
pub fn scratch_is_empty(root: &Path) -> bool {
    match std::fs::read_dir(root) {
        Ok(mut entries) => entries.next().is_none(),
        Err(e) => e.kind() == std::io::ErrorKind::NotFound,
    }
}

/// `true` while `pid` names a live, non-zombie process.
pub fn process_is_alive(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // Format: `pid (comm) state ...`; comm may contain spaces or parens.
    let state = stat
        .rfind(')')
        .and_then(|idx| stat[idx + 1..].split_whitespace().next())
        .unwrap_or("X");
    !matches!(state, "Z" | "X" | "x")
}

/// Wait up to two seconds for `pid` to disappear.
pub async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..40 {
        if !process_is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    !process_is_alive(pid)
}

/// Parse every line of `stdout` that is a bare integer.
pub fn pids_in(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
