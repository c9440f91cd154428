// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan run and step records.
//!
//! A plan is a DAG of named steps; a [`PlanRun`] is one execution of it.
//! The runner owns all status transitions; these types only capture the
//! persisted shape and the legal state machines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a run was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Webhook,
}

crate::status_strings! {
    TriggerType {
        Manual => "manual",
        Webhook => "webhook",
    }
}

/// Lifecycle status of a plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanRunStatus {
    Pending,
    Running,
    Success,
    Failed,
    /// The runner itself hit a fault (store failure etc.), as opposed to a
    /// step failing.
    Error,
}

impl PlanRunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlanRunStatus::Pending | PlanRunStatus::Running)
    }
}

crate::status_strings! {
    PlanRunStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        Error => "error",
    }
}

/// Status of a single step within a run.
///
/// Legal transitions: `pending → running | skipped`,
/// `running → success | failed`. A skipped step never ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StepState {
    /// Counts toward `completed_steps` once resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(self, StepState::Success | StepState::Failed | StepState::Skipped)
    }
}

crate::status_strings! {
    StepState {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// One execution of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRun {
    pub id: String,
    pub plan_name: String,
    pub status: PlanRunStatus,
    /// Run-level parameters; per-step vars override these.
    #[serde(default)]
    pub params: HashMap<String, String>,
    pub trigger_type: TriggerType,
    pub total_steps: u32,
    /// Monotonic count of resolved (success, failed, skipped) steps.
    pub completed_steps: u32,
    /// Wall-clock duration in seconds, set at finalization.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

impl PlanRun {
    pub fn new(
        plan_name: impl Into<String>,
        params: HashMap<String, String>,
        trigger_type: TriggerType,
        total_steps: u32,
    ) -> Self {
        Self {
            id: crate::id::short_id(),
            plan_name: plan_name.into(),
            status: PlanRunStatus::Pending,
            params,
            trigger_type,
            total_steps,
            completed_steps: 0,
            duration: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// One step within a plan run, identified by `(run_id, step_name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRunStep {
    pub run_id: String,
    pub step_name: String,
    pub task_name: String,
    pub status: StepState,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub logs: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl PlanRunStep {
    pub fn new(run_id: impl Into<String>, step_name: impl Into<String>, task_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            step_name: step_name.into(),
            task_name: task_name.into(),
            status: StepState::Pending,
            exit_code: None,
            logs: String::new(),
            started_at: None,
            finished_at: None,
            duration: None,
        }
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
