// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node registry: the in-memory directory of agents.
//!
//! Owns liveness tracking and the outbound push channel of every
//! connected agent. All mutations write through the store, so a restart
//! reloads the fleet (everyone offline until the next heartbeat).

use crate::bus::EventBus;
use crate::EngineError;
use foreman_core::{short_id, BusEvent, Clock, Node, NodeStatus, ServerMessage};
use foreman_store::Store;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A node is flipped offline when its last heartbeat is older than this
/// (three missed 30-second heartbeats). Tests depend on the exact value.
pub const LIVENESS_WINDOW_MS: u64 = 90_000;

/// Outbound push-channel buffer per agent.
const CHANNEL_CAPACITY: usize = 32;

struct NodeEntry {
    node: Node,
    last_seen_ms: u64,
    channel: Option<mpsc::Sender<ServerMessage>>,
}

pub struct NodeRegistry<C: Clock> {
    store: Arc<Store>,
    bus: EventBus,
    clock: C,
    inner: Mutex<HashMap<String, NodeEntry>>,
}

impl<C: Clock> NodeRegistry<C> {
    /// Load persisted nodes. Everyone starts offline: channels do not
    /// survive a restart, so liveness has to be re-proven.
    pub fn new(store: Arc<Store>, bus: EventBus, clock: C) -> Result<Self, EngineError> {
        let mut map = HashMap::new();
        for mut node in store.list_nodes()? {
            if node.status == NodeStatus::Online {
                node.status = NodeStatus::Offline;
                store.upsert_node(&node)?;
            }
            let last_seen_ms = foreman_core::epoch_ms_from_iso(&node.last_seen).unwrap_or(0);
            map.insert(
                node.id.clone(),
                NodeEntry {
                    node,
                    last_seen_ms,
                    channel: None,
                },
            );
        }
        Ok(Self {
            store,
            bus,
            clock,
            inner: Mutex::new(map),
        })
    }

    /// Register a node, assigning a fresh id when none is supplied.
    /// Re-registering an existing id updates name/tags and refreshes
    /// liveness; it never duplicates the record.
    pub fn register(
        &self,
        id: Option<String>,
        name: &str,
        tags: Vec<String>,
    ) -> Result<Node, EngineError> {
        let now_ms = self.clock.epoch_ms();
        let now_iso = self.clock.now_iso();
        let node = {
            let mut inner = self.inner.lock();
            let id = match id {
                Some(id) if !id.is_empty() => id,
                _ => short_id(),
            };
            let entry = inner.entry(id.clone()).or_insert_with(|| NodeEntry {
                node: Node::new(id.clone(), name, Vec::new(), now_iso.clone()),
                last_seen_ms: now_ms,
                channel: None,
            });
            entry.node.name = name.to_string();
            entry.node.tags = tags;
            entry.node.status = NodeStatus::Online;
            entry.node.last_seen = now_iso;
            entry.last_seen_ms = now_ms;
            self.store.upsert_node(&entry.node)?;
            entry.node.clone()
        };
        tracing::info!(node_id = %node.id, name = %node.name, "node registered");
        self.bus.publish(BusEvent::NodeUpdate { node: node.clone() });
        Ok(node)
    }

    /// Refresh a node's liveness. Returns false for unknown ids.
    pub fn heartbeat(&self, id: &str) -> Result<bool, EngineError> {
        let now_ms = self.clock.epoch_ms();
        let now_iso = self.clock.now_iso();
        let revived = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.get_mut(id) else {
                return Ok(false);
            };
            entry.last_seen_ms = now_ms;
            entry.node.last_seen = now_iso;
            let came_back = entry.node.status == NodeStatus::Offline;
            if came_back {
                entry.node.status = NodeStatus::Online;
            }
            self.store.upsert_node(&entry.node)?;
            came_back.then(|| entry.node.clone())
        };
        if let Some(node) = revived {
            self.bus.publish(BusEvent::NodeUpdate { node });
        }
        Ok(true)
    }

    /// Bind the push channel of a freshly connected agent.
    pub fn attach_channel(
        &self,
        id: &str,
        tx: mpsc::Sender<ServerMessage>,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .get_mut(id)
            .ok_or_else(|| EngineError::NodeUnknown(id.to_string()))?;
        entry.channel = Some(tx);
        Ok(())
    }

    /// Drop the push channel on disconnect and flip the node offline.
    pub fn detach_channel(&self, id: &str) -> Result<(), EngineError> {
        let flipped = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.get_mut(id) else {
                return Ok(());
            };
            entry.channel = None;
            if entry.node.status == NodeStatus::Online {
                entry.node.status = NodeStatus::Offline;
                self.store.upsert_node(&entry.node)?;
                Some(entry.node.clone())
            } else {
                None
            }
        };
        if let Some(node) = flipped {
            tracing::info!(node_id = %node.id, "node disconnected");
            self.bus.publish(BusEvent::NodeUpdate { node });
        }
        Ok(())
    }

    /// Clone of the node's push channel, if one is attached.
    pub fn channel(&self, id: &str) -> Option<mpsc::Sender<ServerMessage>> {
        self.inner.lock().get(id).and_then(|e| e.channel.clone())
    }

    /// Resolve an id or (unique) name to a node id.
    pub fn resolve(&self, key: &str) -> Option<String> {
        let inner = self.inner.lock();
        if inner.contains_key(key) {
            return Some(key.to_string());
        }
        let mut matches = inner.values().filter(|e| e.node.name == key);
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Some(entry.node.id.clone()),
            _ => None,
        }
    }

    pub fn get(&self, id: &str) -> Option<Node> {
        self.inner.lock().get(id).map(|e| e.node.clone())
    }

    pub fn list(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.inner.lock().values().map(|e| e.node.clone()).collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        nodes
    }

    /// Explicitly remove a node from the fleet.
    pub fn remove(&self, id: &str) -> Result<bool, EngineError> {
        let existed = self.inner.lock().remove(id).is_some();
        let deleted = self.store.delete_node(id)?;
        Ok(existed || deleted)
    }

    /// Record (or clear) the job currently assigned to a node.
    pub fn set_current_job(&self, id: &str, job_id: Option<&str>) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .get_mut(id)
            .ok_or_else(|| EngineError::NodeUnknown(id.to_string()))?;
        entry.node.current_job_id = job_id.map(str::to_string);
        self.store.upsert_node(&entry.node)?;
        Ok(())
    }

    /// Flip nodes whose heartbeat aged out. Returns the newly offline
    /// nodes. Runs periodically from the server's sweeper task.
    pub fn sweep(&self) -> Result<Vec<Node>, EngineError> {
        let now_ms = self.clock.epoch_ms();
        let flipped = {
            let mut inner = self.inner.lock();
            let mut flipped = Vec::new();
            for entry in inner.values_mut() {
                if entry.node.status == NodeStatus::Online
                    && now_ms.saturating_sub(entry.last_seen_ms) > LIVENESS_WINDOW_MS
                {
                    entry.node.status = NodeStatus::Offline;
                    self.store.upsert_node(&entry.node)?;
                    flipped.push(entry.node.clone());
                }
            }
            flipped
        };
        for node in &flipped {
            tracing::warn!(node_id = %node.id, "heartbeat lapsed, node offline");
            self.bus.publish(BusEvent::NodeUpdate { node: node.clone() });
        }
        Ok(flipped)
    }

    /// Capacity used when building per-agent push channels.
    pub fn channel_capacity() -> usize {
        CHANNEL_CAPACITY
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
