// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job table operations.

use crate::{Store, StoreError};
use foreman_core::{Job, JobStatus};
use rusqlite::{Row, ToSql};

/// Partial update applied to a job row. `None` fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub exit_code: Option<i32>,
    pub logs: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Row filter for [`Store::list_jobs`].
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub node_id: Option<String>,
    /// Substring match on the task name.
    pub search: Option<String>,
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let vars_json: String = row.get("vars")?;
    let status: String = row.get("status")?;
    Ok(Job {
        id: row.get("id")?,
        task: row.get("task")?,
        node_id: row.get("node_id")?,
        vars: serde_json::from_str(&vars_json).unwrap_or_default(),
        // An unparseable status means the row was written by a newer
        // version; surface it as error rather than guessing.
        status: status.parse().unwrap_or(JobStatus::Error),
        exit_code: row.get("exit_code")?,
        logs: row.get("logs")?,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
    })
}

impl Store {
    pub fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        let vars = serde_json::to_string(&job.vars)?;
        self.with(|conn| {
            conn.execute(
                "INSERT INTO jobs (id, task, node_id, vars, status, exit_code, logs, created_at, started_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    job.id,
                    job.task,
                    job.node_id,
                    vars,
                    job.status.to_string(),
                    job.exit_code,
                    job.logs,
                    job.created_at,
                    job.started_at,
                    job.finished_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_job(&self, id: &str, patch: &JobPatch) -> Result<(), StoreError> {
        let status = patch.status.map(|s| s.to_string());
        let mut sets: Vec<&str> = Vec::new();
        let mut vals: Vec<&dyn ToSql> = Vec::new();
        if let Some(s) = &status {
            sets.push("status = ?");
            vals.push(s);
        }
        if let Some(code) = &patch.exit_code {
            sets.push("exit_code = ?");
            vals.push(code);
        }
        if let Some(logs) = &patch.logs {
            sets.push("logs = ?");
            vals.push(logs);
        }
        if let Some(ts) = &patch.started_at {
            sets.push("started_at = ?");
            vals.push(ts);
        }
        if let Some(ts) = &patch.finished_at {
            sets.push("finished_at = ?");
            vals.push(ts);
        }
        if sets.is_empty() {
            return Ok(());
        }
        let id = id.to_string();
        vals.push(&id);
        let sql = format!("UPDATE jobs SET {} WHERE id = ?", sets.join(", "));
        self.with(|conn| {
            conn.execute(&sql, &vals[..])?;
            Ok(())
        })
    }

    pub fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        self.with(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
            let mut rows = stmt.query_map([id], job_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
    }

    /// List jobs, newest first.
    pub fn list_jobs(&self, filter: &JobFilter, limit: usize) -> Result<Vec<Job>, StoreError> {
        let status = filter.status.map(|s| s.to_string());
        let search = filter.search.as_ref().map(|s| format!("%{s}%"));
        let limit = limit as i64;

        let mut clauses: Vec<&str> = Vec::new();
        let mut vals: Vec<&dyn ToSql> = Vec::new();
        if let Some(s) = &status {
            clauses.push("status = ?");
            vals.push(s);
        }
        if let Some(node) = &filter.node_id {
            clauses.push("node_id = ?");
            vals.push(node);
        }
        if let Some(pat) = &search {
            clauses.push("task LIKE ?");
            vals.push(pat);
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        vals.push(&limit);
        let sql = format!(
            "SELECT * FROM jobs {where_sql} ORDER BY created_at DESC, rowid DESC LIMIT ?"
        );
        self.with(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(&vals[..], job_from_row)?;
            let mut jobs = Vec::new();
            for row in rows {
                jobs.push(row?);
            }
            Ok(jobs)
        })
    }

    /// Count jobs in any of `statuses`, optionally restricted to rows
    /// created at or after `since` (ISO-8601).
    pub fn count_jobs(
        &self,
        statuses: &[JobStatus],
        since: Option<&str>,
    ) -> Result<u32, StoreError> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let names: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let mut vals: Vec<&dyn ToSql> = names.iter().map(|n| n as &dyn ToSql).collect();
        let mut sql = format!("SELECT COUNT(*) FROM jobs WHERE status IN ({placeholders})");
        if let Some(cutoff) = &since {
            sql.push_str(" AND created_at >= ?");
            vals.push(cutoff);
        }
        self.with(|conn| {
            let count: u32 = conn.query_row(&sql, &vals[..], |row| row.get(0))?;
            Ok(count)
        })
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
