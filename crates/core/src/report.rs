// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-hoc execution reports and chart metadata.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A task invocation reported after the fact by the CLI.
///
/// Informational history only — never scheduled by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliExecution {
    /// Monotonic integer id, assigned by the store.
    #[serde(default)]
    pub id: i64,
    pub task: String,
    pub exit_code: i32,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub workspace: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Dashboard chart definition. Presentation-only metadata; persisted in
/// the same store, never interpreted by the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub chart_type: String,
    #[serde(default)]
    pub formula: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Source of a unified execution-history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    Task,
    Plan,
    Cli,
}

crate::status_strings! {
    ExecutionKind {
        Task => "task",
        Plan => "plan",
        Cli => "cli",
    }
}

/// One row of the unified `/executions` view, merging jobs, plan runs,
/// and CLI reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    #[serde(rename = "type")]
    pub kind: ExecutionKind,
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
