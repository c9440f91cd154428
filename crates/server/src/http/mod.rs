// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP/REST surface.
//!
//! A thin adapter: parse the request, call one core operation, serialize
//! the result. Everything under `/api/v1` except `/health` sits behind
//! the bearer check (which is a no-op when no token is configured).

mod defs;
mod jobs;
mod logs;
mod nodes;
mod plans;
mod stats;

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/nodes", get(nodes::list))
        .route("/nodes/register", post(nodes::register))
        .route("/nodes/{id}/ping", post(nodes::ping))
        .route("/nodes/{id}", delete(nodes::remove))
        .route("/tasks", get(defs::list_tasks))
        .route("/tasks/run", post(jobs::run_task))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/logs", get(logs::tail))
        .route("/jobs/{id}/cancel", post(jobs::cancel))
        .route("/jobs/{id}/result", post(jobs::result))
        .route("/plans", get(defs::list_plans))
        .route("/plans/{name}/run", post(plans::run))
        .route("/plans/{name}/hook", post(plans::hook))
        .route("/plans/runs/{id}", get(plans::get_run))
        .route("/plans/runs/{id}/steps/{name}/logs", get(plans::step_logs))
        .route("/stats/report", post(stats::report))
        .route("/executions", get(stats::executions))
        .route("/dashboard", get(stats::dashboard))
        .route("/agents/channel", get(crate::channel::upgrade))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ))
        .with_state(state)
        // Health stays outside the bearer check so probes work unauthenticated.
        .merge(Router::new().route("/health", get(health)));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Reject requests without the configured bearer token. With no token
/// configured the API is open by design.
async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.token {
        let presented = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            return ApiError::Unauthorized.into_response();
        }
    }
    next.run(request).await
}

#[cfg(test)]
#[path = "../http_tests.rs"]
mod tests;
