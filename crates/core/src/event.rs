// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events published on the in-process bus.
//!
//! Serializes with `{"type": "topic.name", ...fields}` so WebSocket and
//! SSE subscribers can route on the tag directly. Delivery is best-effort;
//! clients reconcile against the store on reconnect.

use crate::job::Job;
use crate::node::Node;
use crate::plan::{PlanRunStatus, StepState};
use serde::{Deserialize, Serialize};

/// An event on one of the bus topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusEvent {
    /// A job changed status.
    #[serde(rename = "job.update")]
    JobUpdate { job: Job },

    /// A line was appended to a live job's logs.
    #[serde(rename = "job.log")]
    JobLog { job_id: String, line: String },

    /// A plan run started or finished.
    #[serde(rename = "plan.update")]
    PlanUpdate {
        run_id: String,
        plan_name: String,
        status: PlanRunStatus,
    },

    /// A step within a plan run changed state.
    #[serde(rename = "plan.step.update")]
    PlanStepUpdate {
        run_id: String,
        step_name: String,
        status: StepState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },

    /// A node registered, changed liveness, or was removed.
    #[serde(rename = "node.update")]
    NodeUpdate { node: Node },
}

impl BusEvent {
    /// Topic name, matching the serialized `type` tag.
    pub fn topic(&self) -> &'static str {
        match self {
            BusEvent::JobUpdate { .. } => "job.update",
            BusEvent::JobLog { .. } => "job.log",
            BusEvent::PlanUpdate { .. } => "plan.update",
            BusEvent::PlanStepUpdate { .. } => "plan.step.update",
            BusEvent::NodeUpdate { .. } => "node.update",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
