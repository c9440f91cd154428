// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-store: durable state behind a single-writer SQLite connection.
//!
//! One embedded database file holds nodes, jobs, plan runs, plan steps,
//! CLI execution reports, and chart definitions. Every operation is
//! serialized through one mutex-guarded connection; readers observe
//! read-committed state. Timestamps are ISO-8601 strings throughout so
//! the file stays portable across languages.

mod charts;
mod executions;
mod jobs;
mod migrate;
mod nodes;
mod plans;

pub use jobs::{JobFilter, JobPatch};
pub use plans::{PlanRunPatch, StepPatch};

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Persistence faults. Execution outcomes never travel through here; a
/// store error always means the database itself misbehaved.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("corrupt json column: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle to the embedded database.
///
/// Cheap to share behind an `Arc`; all access funnels through the inner
/// mutex, which is the single-writer discipline the rest of the system
/// relies on.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and apply migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent() {
            // Ignore failure here; Connection::open reports the real error.
            let _ = std::fs::create_dir_all(dir);
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrate::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` with the connection lock held.
    fn with<T>(&self, f: impl FnOnce(&Connection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        f(&conn)
    }
}
