// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node table operations.

use crate::{Store, StoreError};
use foreman_core::{Node, NodeStatus};
use rusqlite::Row;

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    let tags_json: String = row.get("tags")?;
    let status: String = row.get("status")?;
    Ok(Node {
        id: row.get("id")?,
        name: row.get("name")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        status: status.parse().unwrap_or(NodeStatus::Offline),
        last_seen: row.get("last_seen")?,
        current_job_id: row.get("current_job_id")?,
    })
}

impl Store {
    /// Insert or fully replace a node record.
    pub fn upsert_node(&self, node: &Node) -> Result<(), StoreError> {
        let tags = serde_json::to_string(&node.tags)?;
        self.with(|conn| {
            conn.execute(
                "INSERT INTO nodes (id, name, tags, status, last_seen, current_job_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   tags = excluded.tags,
                   status = excluded.status,
                   last_seen = excluded.last_seen,
                   current_job_id = excluded.current_job_id",
                rusqlite::params![
                    node.id,
                    node.name,
                    tags,
                    node.status.to_string(),
                    node.last_seen,
                    node.current_job_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_node(&self, id: &str) -> Result<Option<Node>, StoreError> {
        self.with(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM nodes WHERE id = ?1")?;
            let mut rows = stmt.query_map([id], node_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
    }

    pub fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        self.with(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM nodes ORDER BY name, id")?;
            let rows = stmt.query_map([], node_from_row)?;
            let mut nodes = Vec::new();
            for row in rows {
                nodes.push(row?);
            }
            Ok(nodes)
        })
    }

    pub fn delete_node(&self, id: &str) -> Result<bool, StoreError> {
        self.with(|conn| {
            let changed = conn.execute("DELETE FROM nodes WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
#[path = "nodes_tests.rs"]
mod tests;
