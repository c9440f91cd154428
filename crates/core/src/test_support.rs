// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures shared across the workspace's test suites.

use crate::def::{PlanDef, StepDef};
use crate::job::Job;
use crate::node::Node;
use std::collections::HashMap;

/// A local job with fixed timestamps, suitable for store tests.
pub fn sample_job(task: &str) -> Job {
    Job::new(task, None, HashMap::new(), "2026-01-01T00:00:00Z".into())
}

/// A node with deterministic fields.
pub fn sample_node(id: &str, name: &str) -> Node {
    Node::new(
        id.into(),
        name,
        vec!["os:linux".into()],
        "2026-01-01T00:00:00Z".into(),
    )
}

/// Build a step definition with the given dependencies.
pub fn step_def(name: &str, task: &str, needs: &[&str]) -> StepDef {
    StepDef {
        name: name.into(),
        task: task.into(),
        vars: HashMap::new(),
        needs: needs.iter().map(|s| s.to_string()).collect(),
        artifacts: None,
        inputs: None,
    }
}

/// Build a plan definition from `(name, task, needs)` triples.
pub fn plan_def(name: &str, steps: &[(&str, &str, &[&str])]) -> PlanDef {
    PlanDef {
        name: name.into(),
        params: HashMap::new(),
        steps: steps
            .iter()
            .map(|(step, task, needs)| step_def(step, task, needs))
            .collect(),
    }
}
