// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI execution report table operations. Append-only.

use crate::{Store, StoreError};
use foreman_core::CliExecution;
use rusqlite::Row;

fn execution_from_row(row: &Row<'_>) -> rusqlite::Result<CliExecution> {
    let params_json: String = row.get("params")?;
    Ok(CliExecution {
        id: row.get("id")?,
        task: row.get("task")?,
        exit_code: row.get("exit_code")?,
        duration: row.get("duration")?,
        host: row.get("host")?,
        workspace: row.get("workspace")?,
        params: serde_json::from_str(&params_json).unwrap_or_default(),
        timestamp: row.get("timestamp")?,
    })
}

impl Store {
    /// Append a report; returns the assigned monotonic id.
    pub fn insert_cli_execution(&self, report: &CliExecution) -> Result<i64, StoreError> {
        let params = serde_json::to_string(&report.params)?;
        self.with(|conn| {
            conn.execute(
                "INSERT INTO executions (task, exit_code, duration, host, workspace, params, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    report.task,
                    report.exit_code,
                    report.duration,
                    report.host,
                    report.workspace,
                    params,
                    report.timestamp,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// List reports, newest first.
    pub fn list_cli_executions(&self, limit: usize) -> Result<Vec<CliExecution>, StoreError> {
        let limit = limit as i64;
        self.with(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM executions ORDER BY id DESC LIMIT ?1")?;
            let rows = stmt.query_map([limit], execution_from_row)?;
            let mut reports = Vec::new();
            for row in rows {
                reports.push(row?);
            }
            Ok(reports)
        })
    }
}

#[cfg(test)]
#[path = "executions_tests.rs"]
mod tests;
