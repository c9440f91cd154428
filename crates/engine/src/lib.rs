// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-engine: the execution engine of the control plane.
//!
//! Owns the live side of the system — the event bus, the node registry,
//! the job runtime with its log buffers, the local executor, the
//! dispatcher, and the plan runner. Every state transition writes through
//! [`foreman_store::Store`] and broadcasts on the bus; the in-memory maps
//! here are caches over that authority, never a second source of truth.

pub mod bus;
pub mod dispatch;
pub mod executor;
pub mod plan;
pub mod registry;
pub mod runtime;

pub use bus::EventBus;
pub use dispatch::{default_pool_size, Dispatcher, JobRouter};
pub use executor::{ExecConfig, ExecOutcome, LocalExecutor, StepExec, LOCAL_TIMEOUT};
pub use plan::PlanRunner;
pub use registry::{NodeRegistry, LIVENESS_WINDOW_MS};
pub use runtime::JobRuntime;

use thiserror::Error;

/// Engine-level faults. Execution outcomes (failed, timeout, …) are job
/// and step statuses, not errors; these are the cases where the engine
/// itself cannot proceed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown node: {0}")]
    NodeUnknown(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error(transparent)]
    Store(#[from] foreman_store::StoreError),
}
