//! End-to-end tests for the execution engine against real child processes.
//!
//! Uses the `shell` runner so the suite only needs `sh` and coreutils.

#![cfg(target_os = "linux")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use codelab_core::error::CoreError;
use codelab_core::sandbox::engine::ExecutionRequest;
use codelab_core::sandbox::outcome::{OutcomeStatus, NO_OUTPUT_PLACEHOLDER};
use common::{pids_in, scratch_is_empty, test_engine, wait_for_exit};

const DEADLINE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Test: every exit path releases the workspace
// ---------------------------------------------------------------------------

#[tokio::test]
async fn workspace_is_released_on_every_path() {
    let root = tempfile::tempdir().expect("create temp dir");
    let engine = test_engine(root.path(), Duration::from_millis(300));

    let requests = [
        ExecutionRequest::new("echo ok", "shell"),
        ExecutionRequest::new("exit 4", "shell"),
        ExecutionRequest::new("sleep 30", "shell"),
        ExecutionRequest::new("anything", "ghost"),
    ];
    for request in &requests {
        engine.execute(request).await.expect("execute");
        assert!(
            scratch_is_empty(root.path()),
            "workspace left behind for {:?}",
            request.source
        );
    }
}

// ---------------------------------------------------------------------------
// Test: deadline kills the whole process tree
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sleeping_program_times_out_and_leaves_no_processes() {
    let root = tempfile::tempdir().expect("create temp dir");
    let deadline = Duration::from_millis(500);
    let engine = test_engine(root.path(), deadline);

    let source = "echo $$\nsleep 30 &\necho $!\nsleep 30\n";
    let outcome = engine
        .execute(&ExecutionRequest::new(source, "shell"))
        .await
        .expect("execute");

    assert_eq!(outcome.status, OutcomeStatus::TimedOut);
    assert_eq!(
        outcome.stderr.as_deref(),
        Some("Execution timeout (500 ms limit exceeded)")
    );
    assert!(outcome.elapsed >= deadline, "elapsed {:?}", outcome.elapsed);
    assert!(
        outcome.elapsed < deadline + Duration::from_secs(2),
        "elapsed {:?}",
        outcome.elapsed
    );

    let pids = pids_in(&outcome.stdout);
    assert_eq!(pids.len(), 2, "stdout: {:?}", outcome.stdout);
    for pid in pids {
        assert!(wait_for_exit(pid).await, "process {pid} survived the deadline");
    }
    assert!(scratch_is_empty(root.path()));
}

#[tokio::test]
async fn background_children_die_when_program_exits() {
    let root = tempfile::tempdir().expect("create temp dir");
    let engine = test_engine(root.path(), DEADLINE);

    let outcome = engine
        .execute(&ExecutionRequest::new("sleep 30 &\necho $!\n", "shell"))
        .await
        .expect("execute");

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(outcome.elapsed < Duration::from_secs(3));

    let pids = pids_in(&outcome.stdout);
    assert_eq!(pids.len(), 1, "stdout: {:?}", outcome.stdout);
    assert!(wait_for_exit(pids[0]).await, "background child survived");
}

#[tokio::test]
async fn cancelled_execution_kills_processes_and_releases_workspace() {
    let root = tempfile::tempdir().expect("create temp dir");
    let pid_dir = tempfile::tempdir().expect("create pid dir");
    let pid_file = pid_dir.path().join("pids");
    let engine = test_engine(root.path(), Duration::from_secs(30));

    let source = format!(
        "echo $$ > '{file}'\nsleep 30 &\necho $! >> '{file}'\nsleep 30\n",
        file = pid_file.display()
    );
    let request = ExecutionRequest::new(source, "shell");
    let result = tokio::time::timeout(Duration::from_millis(500), engine.execute(&request)).await;
    assert!(result.is_err(), "execution should still be running");

    let written = std::fs::read_to_string(&pid_file).expect("read pid file");
    let pids = pids_in(&written);
    assert_eq!(pids.len(), 2, "pid file: {written:?}");
    for pid in pids {
        assert!(wait_for_exit(pid).await, "process {pid} outlived the cancelled request");
    }
    assert!(scratch_is_empty(root.path()));
}

// ---------------------------------------------------------------------------
// Test: normalization of exit results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn silent_success_yields_placeholder() {
    let root = tempfile::tempdir().expect("create temp dir");
    let engine = test_engine(root.path(), DEADLINE);

    let outcome = engine
        .execute(&ExecutionRequest::new("exit 0", "shell"))
        .await
        .expect("execute");
    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.stdout, NO_OUTPUT_PLACEHOLDER);
    assert_eq!(outcome.stderr, None);
}

#[tokio::test]
async fn stderr_and_nonzero_exit_are_reported_exactly() {
    let root = tempfile::tempdir().expect("create temp dir");
    let engine = test_engine(root.path(), DEADLINE);

    let source = "echo 'NameError: name x is not defined' >&2\nexit 1\n";
    let outcome = engine
        .execute(&ExecutionRequest::new(source, "shell"))
        .await
        .expect("execute");
    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.exit_code, Some(1));
    assert_eq!(
        outcome.stderr.as_deref(),
        Some("NameError: name x is not defined\n")
    );
}

#[tokio::test]
async fn missing_interpreter_is_launch_failed() {
    let root = tempfile::tempdir().expect("create temp dir");
    let engine = test_engine(root.path(), DEADLINE);

    let outcome = engine
        .execute(&ExecutionRequest::new("boo", "ghost"))
        .await
        .expect("execute");
    assert_eq!(outcome.status, OutcomeStatus::LaunchFailed);
    assert_eq!(outcome.stdout, "");
    assert_eq!(
        outcome.stderr.as_deref(),
        Some("Interpreter '/nonexistent/bin/ghost' was not found")
    );
}

// ---------------------------------------------------------------------------
// Test: unsupported language never reaches the filesystem
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unsupported_language_creates_no_workspace() {
    let root = tempfile::tempdir().expect("create temp dir");
    let scratch = root.path().join("scratch");
    let engine = test_engine(&scratch, DEADLINE);

    let result = engine
        .execute(&ExecutionRequest::new("puts 1", "ruby"))
        .await;
    assert_matches!(result, Err(CoreError::UnsupportedLanguage(lang)) if lang == "ruby");
    assert!(!scratch.exists());
}

// ---------------------------------------------------------------------------
// Test: stdin round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stdin_is_echoed_back() {
    let root = tempfile::tempdir().expect("create temp dir");
    let engine = test_engine(root.path(), DEADLINE);

    let input = "3\n1 2 3\nünïcödé\n";
    let outcome = engine
        .execute(&ExecutionRequest::new("cat", "shell").with_stdin(input))
        .await
        .expect("execute");
    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.stdout, input);
}

// ---------------------------------------------------------------------------
// Test: concurrent requests do not see each other's output
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_are_isolated() {
    let root = tempfile::tempdir().expect("create temp dir");
    let engine = Arc::new(test_engine(root.path(), DEADLINE));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let marker = format!("marker-{i}");
                let source = format!("echo {marker}\nsleep 0.2\ncat\necho {marker}\n");
                let request = ExecutionRequest::new(source, "shell").with_stdin(format!("in-{i}\n"));
                let outcome = engine.execute(&request).await.expect("execute");
                (i, outcome)
            })
        })
        .collect();

    for (i, outcome) in futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("join"))
    {
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(
            outcome.stdout,
            format!("marker-{i}\nin-{i}\nmarker-{i}\n"),
            "request {i} saw foreign output"
        );
    }
    assert!(scratch_is_empty(root.path()));
}

// ---------------------------------------------------------------------------
// Test: run() always yields the wire contract
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_produces_report_for_every_status() {
    let root = tempfile::tempdir().expect("create temp dir");
    let engine = test_engine(root.path(), Duration::from_millis(300));

    let cases = [
        (ExecutionRequest::new("echo hi", "shell"), "completed"),
        (ExecutionRequest::new("sleep 5", "shell"), "timed_out"),
        (ExecutionRequest::new("x", "ghost"), "launch_failed"),
        (ExecutionRequest::new("x", "cobol"), "unsupported_language"),
    ];
    for (request, expected) in cases {
        let report = engine.run(&request).await;
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["status"], expected, "for {:?}", request.language);
        assert!(json["elapsed_seconds"].is_number());
    }
}
