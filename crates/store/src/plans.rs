// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan run and plan step table operations.

use crate::{Store, StoreError};
use foreman_core::{PlanRun, PlanRunStatus, PlanRunStep, StepState, TriggerType};
use rusqlite::{Row, ToSql};

/// Partial update applied to a plan run row.
#[derive(Debug, Default, Clone)]
pub struct PlanRunPatch {
    pub status: Option<PlanRunStatus>,
    pub completed_steps: Option<u32>,
    pub duration: Option<f64>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Partial update applied to a plan step row.
#[derive(Debug, Default, Clone)]
pub struct StepPatch {
    pub status: Option<StepState>,
    pub exit_code: Option<i32>,
    pub logs: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub duration: Option<f64>,
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<PlanRun> {
    let params_json: String = row.get("params")?;
    let status: String = row.get("status")?;
    let trigger: String = row.get("trigger_type")?;
    Ok(PlanRun {
        id: row.get("id")?,
        plan_name: row.get("plan_name")?,
        status: status.parse().unwrap_or(PlanRunStatus::Error),
        params: serde_json::from_str(&params_json).unwrap_or_default(),
        trigger_type: trigger.parse().unwrap_or(TriggerType::Manual),
        total_steps: row.get("total_steps")?,
        completed_steps: row.get("completed_steps")?,
        duration: row.get("duration")?,
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
    })
}

fn step_from_row(row: &Row<'_>) -> rusqlite::Result<PlanRunStep> {
    let status: String = row.get("status")?;
    Ok(PlanRunStep {
        run_id: row.get("run_id")?,
        step_name: row.get("step_name")?,
        task_name: row.get("task_name")?,
        status: status.parse().unwrap_or(StepState::Failed),
        exit_code: row.get("exit_code")?,
        logs: row.get("logs")?,
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
        duration: row.get("duration")?,
    })
}

impl Store {
    pub fn insert_plan_run(&self, run: &PlanRun) -> Result<(), StoreError> {
        let params = serde_json::to_string(&run.params)?;
        self.with(|conn| {
            conn.execute(
                "INSERT INTO plan_runs
                   (id, plan_name, status, params, trigger_type, total_steps,
                    completed_steps, duration, started_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    run.id,
                    run.plan_name,
                    run.status.to_string(),
                    params,
                    run.trigger_type.to_string(),
                    run.total_steps,
                    run.completed_steps,
                    run.duration,
                    run.started_at,
                    run.finished_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_plan_run(&self, id: &str, patch: &PlanRunPatch) -> Result<(), StoreError> {
        let status = patch.status.map(|s| s.to_string());
        let mut sets: Vec<&str> = Vec::new();
        let mut vals: Vec<&dyn ToSql> = Vec::new();
        if let Some(s) = &status {
            sets.push("status = ?");
            vals.push(s);
        }
        if let Some(done) = &patch.completed_steps {
            sets.push("completed_steps = ?");
            vals.push(done);
        }
        if let Some(duration) = &patch.duration {
            sets.push("duration = ?");
            vals.push(duration);
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
        let sql = format!("UPDATE plan_runs SET {} WHERE id = ?", sets.join(", "));
        self.with(|conn| {
            conn.execute(&sql, &vals[..])?;
            Ok(())
        })
    }

    pub fn get_plan_run(&self, id: &str) -> Result<Option<PlanRun>, StoreError> {
        self.with(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM plan_runs WHERE id = ?1")?;
            let mut rows = stmt.query_map([id], run_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
    }

    /// List runs, newest first, optionally for a single plan.
    pub fn list_plan_runs(
        &self,
        plan: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PlanRun>, StoreError> {
        let limit = limit as i64;
        self.with(|conn| {
            let mut runs = Vec::new();
            match plan {
                Some(name) => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM plan_runs WHERE plan_name = ?1
                         ORDER BY started_at DESC, rowid DESC LIMIT ?2",
                    )?;
                    let rows = stmt.query_map(rusqlite::params![name, limit], run_from_row)?;
                    for row in rows {
                        runs.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM plan_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
                    )?;
                    let rows = stmt.query_map([limit], run_from_row)?;
                    for row in rows {
                        runs.push(row?);
                    }
                }
            }
            Ok(runs)
        })
    }

    /// A run plus its steps in insertion order.
    pub fn get_plan_run_with_steps(
        &self,
        id: &str,
    ) -> Result<Option<(PlanRun, Vec<PlanRunStep>)>, StoreError> {
        let Some(run) = self.get_plan_run(id)? else {
            return Ok(None);
        };
        let steps = self.list_steps(id)?;
        Ok(Some((run, steps)))
    }

    pub fn insert_step(&self, step: &PlanRunStep) -> Result<(), StoreError> {
        self.with(|conn| {
            conn.execute(
                "INSERT INTO plan_run_steps
                   (run_id, step_name, task_name, status, exit_code, logs,
                    started_at, finished_at, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    step.run_id,
                    step.step_name,
                    step.task_name,
                    step.status.to_string(),
                    step.exit_code,
                    step.logs,
                    step.started_at,
                    step.finished_at,
                    step.duration,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_step(
        &self,
        run_id: &str,
        step_name: &str,
        patch: &StepPatch,
    ) -> Result<(), StoreError> {
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
        if let Some(duration) = &patch.duration {
            sets.push("duration = ?");
            vals.push(duration);
        }
        if sets.is_empty() {
            return Ok(());
        }
        let run_id = run_id.to_string();
        let step_name = step_name.to_string();
        vals.push(&run_id);
        vals.push(&step_name);
        let sql = format!(
            "UPDATE plan_run_steps SET {} WHERE run_id = ? AND step_name = ?",
            sets.join(", ")
        );
        self.with(|conn| {
            conn.execute(&sql, &vals[..])?;
            Ok(())
        })
    }

    pub fn get_step(
        &self,
        run_id: &str,
        step_name: &str,
    ) -> Result<Option<PlanRunStep>, StoreError> {
        self.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM plan_run_steps WHERE run_id = ?1 AND step_name = ?2",
            )?;
            let mut rows = stmt.query_map([run_id, step_name], step_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
    }

    fn list_steps(&self, run_id: &str) -> Result<Vec<PlanRunStep>, StoreError> {
        self.with(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM plan_run_steps WHERE run_id = ?1 ORDER BY rowid")?;
            let rows = stmt.query_map([run_id], step_from_row)?;
            let mut steps = Vec::new();
            for row in rows {
                steps.push(row?);
            }
            Ok(steps)
        })
    }

    /// Count plan runs in any of `statuses`, optionally only those started
    /// at or after `since`.
    pub fn count_plan_runs(
        &self,
        statuses: &[PlanRunStatus],
        since: Option<&str>,
    ) -> Result<u32, StoreError> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let names: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let mut vals: Vec<&dyn ToSql> = names.iter().map(|n| n as &dyn ToSql).collect();
        let mut sql =
            format!("SELECT COUNT(*) FROM plan_runs WHERE status IN ({placeholders})");
        if let Some(cutoff) = &since {
            sql.push_str(" AND started_at >= ?");
            vals.push(cutoff);
        }
        self.with(|conn| {
            let count: u32 = conn.query_row(&sql, &vals[..], |row| row.get(0))?;
            Ok(count)
        })
    }
}

#[cfg(test)]
#[path = "plans_tests.rs"]
mod tests;
