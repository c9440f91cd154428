// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node fleet endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use foreman_core::JobStatus;
use foreman_store::JobFilter;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "nodes": state.registry.list() }))
}

/// Register (or re-register) over plain HTTP. Channel-less nodes still
/// receive work through the ping pull path.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<Value>, ApiError> {
    if body.name.is_empty() {
        return Err(ApiError::InputInvalid("name must not be empty".into()));
    }
    let node = state.registry.register(body.id, &body.name, body.tags)?;
    Ok(Json(json!({ "id": node.id, "status": "registered" })))
}

/// Heartbeat. Also reports the oldest pending job assigned to this node
/// so an agent that missed the push can pull it; delivery is therefore
/// at-least-once and agents dedupe by job id.
pub async fn ping(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.registry.heartbeat(&id)? {
        return Err(ApiError::NodeUnknown(id));
    }
    let node = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::NodeUnknown(id.clone()))?;

    // Offer work: re-offer the in-flight assignment while it is still
    // pending (push delivery may have been missed), otherwise hand out
    // the oldest queued job and mark the node busy.
    let offer = match &node.current_job_id {
        Some(current) => state
            .store
            .get_job(current)?
            .filter(|job| job.status == JobStatus::Pending),
        None => {
            let oldest = state
                .store
                .list_jobs(
                    &JobFilter {
                        status: Some(JobStatus::Pending),
                        node_id: Some(id.clone()),
                        ..JobFilter::default()
                    },
                    50,
                )?
                .into_iter()
                .last();
            if let Some(job) = &oldest {
                state.registry.set_current_job(&id, Some(&job.id))?;
            }
            oldest
        }
    };

    let mut body = json!({ "status": "ok" });
    if let Some(job) = offer {
        body["pending_job"] = serde_json::to_value(&job).unwrap_or(Value::Null);
    }
    Ok(Json(body))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.registry.remove(&id)? {
        return Err(ApiError::NodeUnknown(id));
    }
    Ok(Json(json!({ "status": "removed" })))
}
