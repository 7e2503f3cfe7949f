//! Child process supervision.
//!
//! [`ProcessSupervisor::run`] spawns the runner's command against a
//! workspace, feeds optional stdin, captures stdout and stderr independently
//! and enforces a wall-clock deadline. The child is made the leader of a new
//! process group; that whole group is SIGKILLed once the leader exits or the
//! deadline fires, and again from a drop guard if the supervising future is
//! abandoned, so no descendant outlives the request.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::runner::Runner;
use super::workspace::Workspace;

/// How long to keep draining output pipes after the process group is gone.
///
/// A descendant that escaped the group (e.g. via `setsid`) can hold a pipe
/// open forever; after this grace the readers return what they have.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Read buffer size per pipe read.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Text captured from one output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub text: String,
    /// `true` if the stream produced more than the configured cap.
    pub truncated: bool,
}

/// Unnormalized result of one supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResult {
    /// The process exited on its own before the deadline.
    Exited {
        /// Exit code, or `-1` if the process was killed by a signal.
        code: i32,
        /// Terminating signal, if any.
        signal: Option<i32>,
        stdout: CapturedOutput,
        stderr: CapturedOutput,
    },
    /// The deadline fired and the process group was killed.
    TimedOut {
        stdout: CapturedOutput,
        stderr: CapturedOutput,
    },
    /// The process could not be started (or supervised).
    LaunchFailed { reason: String },
}

/// Spawns and supervises one child process per call.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    max_output_bytes: usize,
}

impl ProcessSupervisor {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    /// Run `runner` against `workspace` and wait for exit or `timeout`.
    pub async fn run(
        &self,
        runner: &Runner,
        workspace: &Workspace,
        stdin: Option<&str>,
        timeout: Duration,
    ) -> RawResult {
        let argv = runner.command_line(workspace.file_path(), workspace.dir());
        let Some((program, args)) = argv.split_first() else {
            return RawResult::LaunchFailed {
                reason: format!("Runner '{}' has no program to launch", runner.language),
            };
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(workspace.dir())
            // Overrides are layered on top of the inherited environment.
            .envs(&runner.env_overrides)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let deadline = tokio::time::Instant::now() + timeout;

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let reason = describe_spawn_error(program, &e);
                tracing::error!(language = %runner.language, error = %e, "Failed to launch process");
                return RawResult::LaunchFailed { reason };
            }
        };

        let mut group = ProcessGroup::new(child.id());
        tracing::debug!(pid = ?child.id(), program = %program, "Process spawned");

        // Stdin is written from its own task so a child that never reads
        // cannot stall deadline enforcement. Dropping the pipe closes it.
        if let (Some(mut pipe), Some(data)) = (child.stdin.take(), stdin) {
            let data = data.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&data).await {
                    tracing::debug!(error = %e, "Child closed stdin early");
                }
            });
        }

        let stop_reading = CancellationToken::new();
        let stdout_task = spawn_capture(child.stdout.take(), self.max_output_bytes, &stop_reading);
        let stderr_task = spawn_capture(child.stderr.take(), self.max_output_bytes, &stop_reading);

        let waited = tokio::time::timeout_at(deadline, child.wait()).await;

        // Descendants die on every path, including a clean exit of the leader.
        group.kill();

        let exit = match waited {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to wait for child process");
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill child after wait error");
                }
                stop_reading.cancel();
                return RawResult::LaunchFailed {
                    reason: format!("Failed to supervise '{program}': {e}"),
                };
            }
            Err(_elapsed) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    language = %runner.language,
                    "Execution deadline exceeded, process group killed"
                );
                // Reap the leader; the group kill above already hit it.
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to reap timed-out child");
                }
                None
            }
        };

        let grace = {
            let stop_reading = stop_reading.clone();
            tokio::spawn(async move {
                tokio::time::sleep(DRAIN_GRACE).await;
                stop_reading.cancel();
            })
        };
        let (stdout, stderr) = tokio::join!(join_capture(stdout_task), join_capture(stderr_task));
        grace.abort();

        match exit {
            Some(status) => RawResult::Exited {
                code: status.code().unwrap_or(-1),
                signal: status.signal(),
                stdout,
                stderr,
            },
            None => RawResult::TimedOut { stdout, stderr },
        }
    }
}

/// SIGKILLs the child's process group once, at the latest on drop.
struct ProcessGroup {
    pgid: Option<libc::pid_t>,
}

impl ProcessGroup {
    fn new(leader_pid: Option<u32>) -> Self {
        Self {
            pgid: leader_pid.and_then(|pid| libc::pid_t::try_from(pid).ok()),
        }
    }

    fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        // SAFETY: killpg only sends a signal. `pgid` is the group created for
        // this child by `process_group(0)` at spawn time.
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            // ESRCH: every member has already exited.
            if err.raw_os_error() != Some(libc::ESRCH) {
                tracing::warn!(pgid, error = %err, "Failed to kill process group");
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

fn describe_spawn_error(program: &str, err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => format!("Interpreter '{program}' was not found"),
        io::ErrorKind::PermissionDenied => format!("Permission denied launching '{program}'"),
        _ => format!("Failed to launch '{program}': {err}"),
    }
}

fn spawn_capture<R>(
    handle: Option<R>,
    limit: usize,
    stop: &CancellationToken,
) -> JoinHandle<CapturedOutput>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let stop = stop.clone();
    tokio::spawn(async move { capture_stream(handle, limit, stop).await })
}

async fn join_capture(task: JoinHandle<CapturedOutput>) -> CapturedOutput {
    task.await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Output capture task failed");
        CapturedOutput::default()
    })
}

/// Read a stream until EOF or `stop`, keeping at most `limit` bytes.
///
/// Bytes past the cap are still read and discarded so the child never
/// blocks on a full pipe.
async fn capture_stream<R: AsyncRead + Unpin>(
    handle: Option<R>,
    limit: usize,
    stop: CancellationToken,
) -> CapturedOutput {
    let Some(mut reader) = handle else {
        return CapturedOutput::default();
    };

    let mut buf = Vec::new();
    let mut truncated = false;
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let n = tokio::select! {
            _ = stop.cancelled() => break,
            read = reader.read(&mut chunk) => match read {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            },
        };
        let room = limit.saturating_sub(buf.len());
        if n > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }

    CapturedOutput {
        text: String::from_utf8_lossy(&buf).into_owned(),
        truncated,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
