// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and status state machine.
//!
//! A job is a single task invocation, executed either by the local
//! executor (`node_id = None`) or by a remote agent. Status moves
//! `pending → running → terminal`; the terminal set distinguishes how
//! the invocation ended.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet picked up (remote jobs wait here for their agent).
    Pending,
    /// The task subprocess is executing.
    Running,
    /// Exit code 0.
    Success,
    /// Nonzero exit code.
    Failed,
    /// The task could not be spawned or died outside its own control.
    Error,
    /// Wall-clock limit exceeded.
    Timeout,
    /// Cancelled by operator request.
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses can never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

crate::status_strings! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        Error => "error",
        Timeout => "timeout",
        Cancelled => "cancelled",
    }
}

/// A single task invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Task name, resolved by the task runner against the taskfile.
    pub task: String,
    /// Target agent; `None` means local execution.
    #[serde(default)]
    pub node_id: Option<String>,
    /// Variables exported to the task subprocess environment.
    #[serde(default)]
    pub vars: HashMap<String, String>,
    pub status: JobStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Merged stdout/stderr. Accumulates in the runtime buffer while the
    /// job is live; the full snapshot lands here at finalization.
    #[serde(default)]
    pub logs: String,
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

impl Job {
    /// Create a new pending job with a fresh id.
    pub fn new(
        task: impl Into<String>,
        node_id: Option<String>,
        vars: HashMap<String, String>,
        created_at: String,
    ) -> Self {
        Self {
            id: crate::id::short_id(),
            task: task.into(),
            node_id,
            vars,
            status: JobStatus::Pending,
            exit_code: None,
            logs: String::new(),
            created_at,
            started_at: None,
            finished_at: None,
        }
    }

    /// True when the job runs on a remote agent.
    pub fn is_remote(&self) -> bool {
        self.node_id.is_some()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
