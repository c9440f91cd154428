// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job submission and lifecycle endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use foreman_core::{Job, JobResult};
use foreman_engine::Dispatcher;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct RunBody {
    pub task: String,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub vars: HashMap<String, String>,
}

/// Submit a single task invocation, local or remote.
pub async fn run_task(
    State(state): State<AppState>,
    Json(body): Json<RunBody>,
) -> Result<Json<Value>, ApiError> {
    if body.task.is_empty() {
        return Err(ApiError::InputInvalid("task must not be empty".into()));
    }
    // Resolve the target before creating the job so a bad node name never
    // leaves an orphaned record behind.
    let node_id = match &body.node {
        Some(key) => Some(
            state
                .registry
                .resolve(key)
                .ok_or_else(|| ApiError::NodeUnknown(key.clone()))?,
        ),
        None => None,
    };
    let remote = node_id.is_some();
    let job = state.runtime.create_job(&body.task, node_id, body.vars)?;
    state.router.dispatch(&job).await?;
    // Remote jobs wait in pending for their agent; local ones are already
    // on the worker pool.
    let status = if remote { "pending" } else { "running" };
    Ok(Json(json!({ "job_id": job.id, "status": status })))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    state
        .runtime
        .get_job(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {id}")))
}

/// Operator cancellation. Idempotent: cancelling an already-terminal job
/// acknowledges without changing anything.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.runtime.cancel(&id)?;
    release_node(&state, &id);
    Ok(Json(json!({ "status": "cancelled" })))
}

/// Final (or progress) result reported by an agent. Accepted even when
/// the node has since gone offline.
pub async fn result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<JobResult>,
) -> Result<Json<Value>, ApiError> {
    let job = state.runtime.apply_result(&id, &body)?;
    if job.status.is_terminal() {
        release_node(&state, &id);
    }
    Ok(Json(json!({ "status": "ok" })))
}

/// Clear `current_job_id` on the node that was running this job.
fn release_node(state: &AppState, job_id: &str) {
    let node = state
        .registry
        .list()
        .into_iter()
        .find(|node| node.current_job_id.as_deref() == Some(job_id));
    if let Some(node) = node {
        if let Err(err) = state.registry.set_current_job(&node.id, None) {
            tracing::warn!(node_id = %node.id, error = %err, "failed to release node");
        }
    }
}
