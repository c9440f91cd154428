// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsed task and plan definitions.
//!
//! The server loads these from YAML files; the core only consumes the
//! parsed structures. Task bodies are opaque — the external task runner
//! interprets them — so [`TaskDef`] keeps just the metadata the control
//! plane surfaces.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Definition-level validation failures, surfaced as invalid input.
#[derive(Debug, Error)]
pub enum DefError {
    #[error("plan {plan:?}: duplicate step name {step:?}")]
    DuplicateStep { plan: String, step: String },
    #[error("plan {plan:?}: step {step:?} needs unknown step {needed:?}")]
    UnknownDependency {
        plan: String,
        step: String,
        needed: String,
    },
    #[error("plan {plan:?} has no steps")]
    EmptyPlan { plan: String },
}

/// Metadata for a task known to the task runner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    #[serde(default)]
    pub description: Option<String>,
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
    pub name: String,
    /// Task to invoke.
    pub task: String,
    /// Per-step variables; override run-level params on key collision.
    #[serde(default)]
    pub vars: HashMap<String, String>,
    /// Steps that must succeed before this one becomes ready.
    #[serde(default)]
    pub needs: Vec<String>,
    /// Opaque pass-through, not interpreted by the control plane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<serde_json::Value>,
}

/// A directed acyclic specification of named steps.
///
/// Acyclicity is not checked here: the runner's no-progress defense covers
/// cyclic `needs`, so a cyclic plan loads fine and fails at run time with
/// every involved step skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDef {
    pub name: String,
    /// Plan-level defaults, overridable at submission and per step.
    #[serde(default)]
    pub params: HashMap<String, String>,
    pub steps: Vec<StepDef>,
}

impl PlanDef {
    /// Validate step-name uniqueness and `needs` references.
    pub fn validate(&self) -> Result<(), DefError> {
        if self.steps.is_empty() {
            return Err(DefError::EmptyPlan {
                plan: self.name.clone(),
            });
        }
        let mut names: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if !names.insert(step.name.as_str()) {
                return Err(DefError::DuplicateStep {
                    plan: self.name.clone(),
                    step: step.name.clone(),
                });
            }
        }
        for step in &self.steps {
            for needed in &step.needs {
                if !names.contains(needed.as_str()) {
                    return Err(DefError::UnknownDependency {
                        plan: self.name.clone(),
                        step: step.name.clone(),
                        needed: needed.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn step(&self, name: &str) -> Option<&StepDef> {
        self.steps.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
#[path = "def_tests.rs"]
mod tests;
