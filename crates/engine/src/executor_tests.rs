// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

/// Write a stub task runner that keys its behavior off the task name
/// (argv[3], after `-t <taskfile>`).
fn stub_runner(dir: &tempfile::TempDir) -> ExecConfig {
    use std::os::unix::fs::PermissionsExt;

    let runner = dir.path().join("task-runner");
    let taskfile = dir.path().join("tasks.yml");
    std::fs::write(&taskfile, "# stub\n").unwrap();
    std::fs::write(
        &runner,
        "#!/bin/sh\n\
         task=\"$3\"\n\
         case \"$task\" in\n\
           hello) echo hi; exit 0 ;;\n\
           fail) echo nope >&2; exit 3 ;;\n\
           both) echo out; echo err >&2; exit 0 ;;\n\
           env-echo) echo \"GREETING=$GREETING\"; exit 0 ;;\n\
           slow) sleep 5; exit 0 ;;\n\
           *) echo \"unknown task: $task\" >&2; exit 127 ;;\n\
         esac\n",
    )
    .unwrap();
    std::fs::set_permissions(&runner, std::fs::Permissions::from_mode(0o755)).unwrap();
    ExecConfig::new(runner, taskfile)
}

fn collect() -> (std::sync::Arc<parking_lot::Mutex<Vec<String>>>, impl FnMut(&str) + Send) {
    let lines = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = lines.clone();
    (lines, move |line: &str| sink.lock().push(line.to_string()))
}

#[tokio::test]
async fn exit_zero_is_success_with_logs() {
    let dir = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(stub_runner(&dir));
    let (lines, on_line) = collect();

    let outcome = executor
        .run_task("hello", &HashMap::new(), &CancellationToken::new(), on_line)
        .await;

    assert_eq!(outcome.status, JobStatus::Success);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(*lines.lock(), vec!["hi".to_string()]);
}

#[tokio::test]
async fn nonzero_exit_is_failed_with_code() {
    let dir = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(stub_runner(&dir));
    let (lines, on_line) = collect();

    let outcome = executor
        .run_task("fail", &HashMap::new(), &CancellationToken::new(), on_line)
        .await;

    assert_eq!(outcome.status, JobStatus::Failed);
    assert_eq!(outcome.exit_code, Some(3));
    // stderr is folded into the same stream
    assert_eq!(*lines.lock(), vec!["nope".to_string()]);
}

#[tokio::test]
async fn stdout_and_stderr_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(stub_runner(&dir));
    let (lines, on_line) = collect();

    let outcome = executor
        .run_task("both", &HashMap::new(), &CancellationToken::new(), on_line)
        .await;

    assert_eq!(outcome.status, JobStatus::Success);
    let mut got = lines.lock().clone();
    got.sort();
    assert_eq!(got, vec!["err".to_string(), "out".to_string()]);
}

#[tokio::test]
async fn vars_are_exported_as_environment() {
    let dir = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(stub_runner(&dir));
    let (lines, on_line) = collect();
    let vars = HashMap::from([("GREETING".to_string(), "yo".to_string())]);

    executor
        .run_task("env-echo", &vars, &CancellationToken::new(), on_line)
        .await;

    assert_eq!(*lines.lock(), vec!["GREETING=yo".to_string()]);
}

#[tokio::test]
async fn missing_runner_is_error_with_message() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExecConfig::new(dir.path().join("does-not-exist"), dir.path().join("t.yml"));
    let executor = LocalExecutor::new(config);
    let (lines, on_line) = collect();

    let outcome = executor
        .run_task("hello", &HashMap::new(), &CancellationToken::new(), on_line)
        .await;

    assert_eq!(outcome.status, JobStatus::Error);
    assert!(outcome.exit_code.is_none());
    let lines = lines.lock();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("failed to spawn task runner"));
}

#[tokio::test]
async fn wall_clock_timeout_kills_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = stub_runner(&dir);
    config.timeout = Duration::from_millis(200);
    let executor = LocalExecutor::new(config);
    let (lines, on_line) = collect();

    let outcome = executor
        .run_task("slow", &HashMap::new(), &CancellationToken::new(), on_line)
        .await;

    assert_eq!(outcome.status, JobStatus::Timeout);
    assert!(lines.lock().iter().any(|l| l.contains("timed out")));
}

#[tokio::test]
async fn cancellation_kills_the_subprocess() {
    let dir = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(stub_runner(&dir));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = executor
        .run_task("slow", &HashMap::new(), &cancel, |_| {})
        .await;

    assert_eq!(outcome.status, JobStatus::Cancelled);
    // Well under the 5 s the task would otherwise sleep.
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn step_exec_collects_logs() {
    let dir = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(stub_runner(&dir));
    let mut logs = String::new();

    let outcome = executor.run_step("hello", &HashMap::new(), &mut logs).await;

    assert_eq!(outcome.status, JobStatus::Success);
    assert_eq!(logs, "hi\n");
}
