// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-server: the `foremand` binary.
//!
//! Hosts the HTTP/REST surface, the SSE log tail, and the agent
//! WebSocket channel, and wires the engine together: store, bus,
//! registry, dispatcher, plan runner, plus the background heartbeat
//! sweeper.

pub mod channel;
pub mod env;
pub mod error;
pub mod http;
pub mod library;
pub mod state;

use anyhow::Context;
use foreman_core::SystemClock;
use foreman_engine::{
    default_pool_size, EventBus, ExecConfig, JobRouter, JobRuntime, LocalExecutor, NodeRegistry,
    PlanRunner,
};
use foreman_store::Store;
use state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// How often the heartbeat sweeper wakes.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Build the full application state from the environment.
pub fn bootstrap() -> anyhow::Result<AppState> {
    let root = env::install_root();
    let state_dir = env::state_dir()?;
    let store = Arc::new(
        Store::open(&state_dir.join("foreman.db")).context("opening state database")?,
    );
    let library = Arc::new(library::Library::load(&root).context("loading definitions")?);

    let clock = SystemClock;
    let bus = EventBus::new();
    let registry = Arc::new(NodeRegistry::new(store.clone(), bus.clone(), clock.clone())?);
    let runtime = Arc::new(JobRuntime::new(store.clone(), bus.clone(), clock.clone()));
    let exec_config = ExecConfig::new(env::runner_bin(&root), env::taskfile(&root));
    let executor = Arc::new(LocalExecutor::new(exec_config));
    let pool_size = env::max_local_jobs().unwrap_or_else(default_pool_size);
    let router = Arc::new(JobRouter::new(
        registry.clone(),
        runtime.clone(),
        executor.clone(),
        pool_size,
    ));
    let planner = Arc::new(PlanRunner::new(
        store.clone(),
        bus.clone(),
        executor,
        clock,
    ));

    Ok(AppState {
        store,
        bus,
        registry,
        runtime,
        router,
        planner,
        library,
        token: env::token(),
    })
}

/// Run the daemon until the process is killed.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    spawn_sweeper(state.registry.clone());

    let port = env::http_port();
    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    tracing::info!(port, "foremand listening");
    axum::serve(listener, app).await.context("http server")
}


fn spawn_sweeper(registry: Arc<NodeRegistry<SystemClock>>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // The immediate first tick is harmless: nothing is stale yet.
        loop {
            ticker.tick().await;
            if let Err(err) = registry.sweep() {
                tracing::error!(error = %err, "heartbeat sweep failed");
            }
        }
    });
}
