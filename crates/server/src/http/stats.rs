// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution history, CLI reports, and the dashboard summary.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use foreman_core::{
    iso_from_epoch_ms, seconds_between, CliExecution, Clock, ExecutionEntry, ExecutionKind,
    JobStatus, NodeStatus, PlanRunStatus, SystemClock,
};
use foreman_store::JobFilter;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_LIMIT: usize = 50;
const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Post-hoc report from the CLI. Append-only history.
pub async fn report(
    State(state): State<AppState>,
    Json(body): Json<CliExecution>,
) -> Result<Json<Value>, ApiError> {
    if body.task.is_empty() {
        return Err(ApiError::InputInvalid("task must not be empty".into()));
    }
    state.store.insert_cli_execution(&body)?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecutionsQuery {
    /// task | plan | cli
    #[serde(rename = "type", default)]
    pub kind: Option<ExecutionKind>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Unified history across jobs, plan runs, and CLI reports.
pub async fn executions(
    State(state): State<AppState>,
    Query(query): Query<ExecutionsQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let mut entries: Vec<ExecutionEntry> = Vec::new();

    if query.kind.is_none() || query.kind == Some(ExecutionKind::Task) {
        for job in state.store.list_jobs(&JobFilter::default(), limit)? {
            let duration = match (&job.started_at, &job.finished_at) {
                (Some(start), Some(end)) => seconds_between(start, end),
                _ => None,
            };
            entries.push(ExecutionEntry {
                kind: ExecutionKind::Task,
                id: job.id,
                name: job.task,
                status: job.status.to_string(),
                exit_code: job.exit_code,
                duration,
                timestamp: Some(job.created_at),
            });
        }
    }
    if query.kind.is_none() || query.kind == Some(ExecutionKind::Plan) {
        for run in state.store.list_plan_runs(None, limit)? {
            entries.push(ExecutionEntry {
                kind: ExecutionKind::Plan,
                id: run.id,
                name: run.plan_name,
                status: run.status.to_string(),
                exit_code: None,
                duration: run.duration,
                timestamp: run.started_at,
            });
        }
    }
    if query.kind.is_none() || query.kind == Some(ExecutionKind::Cli) {
        for report in state.store.list_cli_executions(limit)? {
            let status = if report.exit_code == 0 { "success" } else { "failed" };
            entries.push(ExecutionEntry {
                kind: ExecutionKind::Cli,
                id: report.id.to_string(),
                name: report.task,
                status: status.to_string(),
                exit_code: Some(report.exit_code),
                duration: report.duration,
                timestamp: report.timestamp,
            });
        }
    }

    if let Some(status) = &query.status {
        entries.retain(|entry| &entry.status == status);
    }
    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        entries.retain(|entry| entry.name.to_lowercase().contains(&needle));
    }
    // Newest first; entries without a timestamp sink to the end.
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries.truncate(limit);

    Ok(Json(json!({ "executions": entries })))
}

/// Headline numbers for the landing view.
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let now_ms = SystemClock.epoch_ms();
    let cutoff = iso_from_epoch_ms(now_ms.saturating_sub(DAY_MS));

    let active_jobs = state
        .store
        .count_jobs(&[JobStatus::Pending, JobStatus::Running], None)?;
    let active_runs = state
        .store
        .count_plan_runs(&[PlanRunStatus::Pending, PlanRunStatus::Running], None)?;

    let failed_jobs = state.store.count_jobs(
        &[JobStatus::Failed, JobStatus::Error, JobStatus::Timeout],
        Some(&cutoff),
    )?;
    let failed_runs = state.store.count_plan_runs(
        &[PlanRunStatus::Failed, PlanRunStatus::Error],
        Some(&cutoff),
    )?;

    let all_job_statuses = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Success,
        JobStatus::Failed,
        JobStatus::Error,
        JobStatus::Timeout,
        JobStatus::Cancelled,
    ];
    let jobs_24h = state.store.count_jobs(&all_job_statuses, Some(&cutoff))?;
    let cli_24h = state
        .store
        .list_cli_executions(10_000)?
        .into_iter()
        .filter(|r| r.timestamp.as_deref() >= Some(cutoff.as_str()))
        .count() as u32;

    let nodes = state.registry.list();
    let online = nodes
        .iter()
        .filter(|n| n.status == NodeStatus::Online)
        .count();

    Ok(Json(json!({
        "active_runs": active_jobs + active_runs,
        "failed_24h": failed_jobs + failed_runs,
        "stats_24h": jobs_24h + cli_24h,
        "nodes_summary": { "total": nodes.len(), "online": online },
    })))
}
