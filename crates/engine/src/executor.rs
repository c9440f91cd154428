// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local task execution.
//!
//! Spawns the external task-runner binary, feeds it the job's variables
//! through the environment, and folds stdout and stderr into a single
//! line stream. The executor never errors: every way an invocation can
//! end maps to a job status.

use async_trait::async_trait;
use foreman_core::JobStatus;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Hard wall-clock limit for local executions.
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(3600);

/// Where and how to invoke the task runner.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Task-runner binary.
    pub runner: PathBuf,
    /// Task definition file, passed as `-t <taskfile>`.
    pub taskfile: PathBuf,
    pub timeout: Duration,
}

impl ExecConfig {
    pub fn new(runner: PathBuf, taskfile: PathBuf) -> Self {
        Self {
            runner,
            taskfile,
            timeout: LOCAL_TIMEOUT,
        }
    }
}

/// Terminal result of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    pub status: JobStatus,
    pub exit_code: Option<i32>,
}

/// Seam between the plan runner and subprocess execution. Production code
/// uses [`LocalExecutor`]; tests substitute an in-memory fake.
#[async_trait]
pub trait StepExec: Send + Sync {
    /// Run `task` to completion, appending output to `logs`.
    async fn run_step(
        &self,
        task: &str,
        vars: &HashMap<String, String>,
        logs: &mut String,
    ) -> ExecOutcome;
}

pub struct LocalExecutor {
    config: ExecConfig,
}

enum Finish {
    Exited(std::io::Result<std::process::ExitStatus>),
    Timeout,
    Cancelled,
}

impl LocalExecutor {
    pub fn new(config: ExecConfig) -> Self {
        Self { config }
    }

    /// Invoke the task runner and stream merged output line by line.
    ///
    /// The callback fires once per line, in arrival order. Cancellation
    /// kills the subprocess; timeout does the same and reports `timeout`.
    pub async fn run_task(
        &self,
        task: &str,
        vars: &HashMap<String, String>,
        cancel: &CancellationToken,
        mut on_line: impl FnMut(&str) + Send,
    ) -> ExecOutcome {
        let mut cmd = Command::new(&self.config.runner);
        cmd.arg("-t")
            .arg(&self.config.taskfile)
            .arg(task)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in vars {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                on_line(&format!("failed to spawn task runner: {err}"));
                return ExecOutcome {
                    status: JobStatus::Error,
                    exit_code: None,
                };
            }
        };

        let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, line_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, line_tx.clone());
        }
        // The readers hold the only remaining senders once this drops, so
        // recv() returns None exactly when both pipes close.
        drop(line_tx);

        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let finish = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Finish::Cancelled,
                _ = tokio::time::sleep_until(deadline) => break Finish::Timeout,
                maybe_line = line_rx.recv() => match maybe_line {
                    Some(line) => on_line(&line),
                    None => {
                        // Pipes closed; reap the child under the same guards.
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break Finish::Cancelled,
                            _ = tokio::time::sleep_until(deadline) => break Finish::Timeout,
                            res = child.wait() => break Finish::Exited(res),
                        }
                    }
                },
            }
        };

        match finish {
            Finish::Exited(Ok(status)) => match status.code() {
                Some(0) => ExecOutcome {
                    status: JobStatus::Success,
                    exit_code: Some(0),
                },
                Some(code) => ExecOutcome {
                    status: JobStatus::Failed,
                    exit_code: Some(code),
                },
                // Killed by signal: no exit code to report.
                None => ExecOutcome {
                    status: JobStatus::Failed,
                    exit_code: None,
                },
            },
            Finish::Exited(Err(err)) => {
                on_line(&format!("task runner wait failed: {err}"));
                ExecOutcome {
                    status: JobStatus::Error,
                    exit_code: None,
                }
            }
            Finish::Timeout => {
                let _ = child.start_kill();
                on_line(&format!(
                    "task timed out after {}s",
                    self.config.timeout.as_secs()
                ));
                ExecOutcome {
                    status: JobStatus::Timeout,
                    exit_code: None,
                }
            }
            Finish::Cancelled => {
                let _ = child.start_kill();
                ExecOutcome {
                    status: JobStatus::Cancelled,
                    exit_code: None,
                }
            }
        }
    }
}

#[async_trait]
impl StepExec for LocalExecutor {
    async fn run_step(
        &self,
        task: &str,
        vars: &HashMap<String, String>,
        logs: &mut String,
    ) -> ExecOutcome {
        let cancel = CancellationToken::new();
        self.run_task(task, vars, &cancel, |line| {
            logs.push_str(line);
            logs.push('\n');
        })
        .await
    }
}

fn spawn_line_reader<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
