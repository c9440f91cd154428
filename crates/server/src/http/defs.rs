// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only views over the loaded definitions.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

pub async fn list_tasks(State(state): State<AppState>) -> Json<Value> {
    let tasks: Vec<Value> = state
        .library
        .task_names()
        .map(|(name, def)| {
            json!({
                "name": name,
                "description": def.description,
            })
        })
        .collect();
    Json(json!({ "tasks": tasks }))
}

pub async fn list_plans(State(state): State<AppState>) -> Json<Value> {
    let plans: Vec<Value> = state
        .library
        .plans()
        .map(|plan| {
            let steps: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
            json!({
                "name": plan.name,
                "steps": steps,
            })
        })
        .collect();
    Json(json!({ "plans": plans }))
}
