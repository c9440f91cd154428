// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent channel protocol.
//!
//! Messages exchanged over the per-agent WebSocket, JSON-encoded with a
//! `type` tag. The final job outcome deliberately travels over plain HTTP
//! (`POST /api/v1/jobs/{id}/result`) instead of the channel so a brief
//! disconnect across the result moment loses nothing.

use crate::job::{Job, JobStatus};
use serde::{Deserialize, Serialize};

/// Messages sent by an agent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Join the fleet. The server answers with [`ServerMessage::Registered`].
    NodeRegister {
        /// Previously assigned id, if reconnecting.
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    /// Heartbeat, sent every 5 s.
    NodePing { id: String },
    /// One log line from the currently running job.
    JobLog { job_id: String, log: String },
}

/// Messages pushed by the server to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Registration acknowledged; `id` is authoritative.
    Registered { id: String },
    /// Run this job now. At most one in flight per node; delivery is
    /// at-least-once, so agents dedupe by `job.id`.
    JobAssigned { job: Job },
}

/// Final job outcome, reported via HTTP by agents and accepted even when
/// the reporting node has since gone offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub status: JobStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub logs: String,
}

#[cfg(test)]
#[path = "proto_tests.rs"]
mod tests;
