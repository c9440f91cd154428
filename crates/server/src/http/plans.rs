// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan run endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use foreman_core::TriggerType;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Default, Deserialize)]
pub struct RunPlanBody {
    #[serde(default)]
    pub vars: HashMap<String, String>,
    #[serde(default)]
    pub trigger_type: Option<TriggerType>,
}

pub async fn run(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<RunPlanBody>>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    start_run(
        &state,
        &name,
        body.vars,
        body.trigger_type.unwrap_or(TriggerType::Manual),
    )
}

/// Webhook trigger: any JSON object; top-level scalars become vars.
pub async fn hook(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let mut vars = HashMap::new();
    if let Some(Json(Value::Object(fields))) = payload {
        for (key, value) in fields {
            let rendered = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            vars.insert(key, rendered);
        }
    }
    start_run(&state, &name, vars, TriggerType::Webhook)
}

fn start_run(
    state: &AppState,
    name: &str,
    vars: HashMap<String, String>,
    trigger: TriggerType,
) -> Result<Json<Value>, ApiError> {
    let def = state
        .library
        .plan(name)
        .ok_or_else(|| ApiError::NotFound(format!("plan {name}")))?
        .clone();
    let run = state.planner.start(def, vars, trigger)?;
    Ok(Json(json!({ "run_id": run.id, "status": "running" })))
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let (run, steps) = state
        .store
        .get_plan_run_with_steps(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("plan run {id}")))?;
    let mut body = serde_json::to_value(&run)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    body["steps"] = serde_json::to_value(&steps)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(body))
}

pub async fn step_logs(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let step = state
        .store
        .get_step(&id, &name)?
        .ok_or_else(|| ApiError::NotFound(format!("step {name} of run {id}")))?;
    Ok(Json(json!({ "logs": step.logs, "status": step.status })))
}
