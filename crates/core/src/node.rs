// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent node record.

use serde::{Deserialize, Serialize};

/// Liveness status of a node, derived from heartbeat age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Online,
    Offline,
}

crate::status_strings! {
    NodeStatus {
        Online => "online",
        Offline => "offline",
    }
}

/// A remote worker participating in the fleet.
///
/// The push channel to a connected node lives in the registry only; it is
/// never part of the persisted or serialized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    /// Unordered labels, either `key:value` or free-form.
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: NodeStatus,
    pub last_seen: String,
    /// Job currently assigned to this node, if any. Invariant: the named
    /// job has `node_id = this.id` and a non-terminal status.
    #[serde(default)]
    pub current_job_id: Option<String>,
}

impl Node {
    pub fn new(id: String, name: impl Into<String>, tags: Vec<String>, last_seen: String) -> Self {
        Self {
            id,
            name: name.into(),
            tags,
            status: NodeStatus::Online,
            last_seen,
            current_job_id: None,
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
