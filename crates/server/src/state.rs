// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state handed to every handler.

use crate::library::Library;
use foreman_core::SystemClock;
use foreman_engine::{EventBus, JobRouter, JobRuntime, NodeRegistry, PlanRunner};
use foreman_store::Store;
use std::sync::Arc;

pub type Registry = NodeRegistry<SystemClock>;
pub type Runtime = JobRuntime<SystemClock>;
pub type Router = JobRouter<SystemClock>;
pub type Planner = PlanRunner<SystemClock>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub bus: EventBus,
    pub registry: Arc<Registry>,
    pub runtime: Arc<Runtime>,
    pub router: Arc<Router>,
    pub planner: Arc<Planner>,
    pub library: Arc<Library>,
    /// Bearer token; `None` leaves the API open.
    pub token: Option<String>,
}
