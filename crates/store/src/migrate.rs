// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema creation and additive column migrations.
//!
//! Migrations are introspection-driven: probe each late-added column with
//! a trivial `SELECT`, and `ALTER TABLE … ADD COLUMN` when the probe
//! fails. Columns are only ever added, never dropped or rewritten.

use crate::StoreError;
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    tags            TEXT NOT NULL DEFAULT '[]',
    status          TEXT NOT NULL DEFAULT 'online',
    last_seen       TEXT NOT NULL DEFAULT '',
    current_job_id  TEXT
);

CREATE TABLE IF NOT EXISTS jobs (
    id          TEXT PRIMARY KEY,
    task        TEXT NOT NULL,
    node_id     TEXT,
    vars        TEXT NOT NULL DEFAULT '{}',
    status      TEXT NOT NULL DEFAULT 'pending',
    exit_code   INTEGER,
    logs        TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL DEFAULT '',
    started_at  TEXT,
    finished_at TEXT
);

CREATE TABLE IF NOT EXISTS charts (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    type        TEXT NOT NULL,
    formula     TEXT NOT NULL DEFAULT '',
    config      TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT
);

CREATE TABLE IF NOT EXISTS executions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    task        TEXT NOT NULL,
    exit_code   INTEGER NOT NULL,
    duration    REAL,
    host        TEXT NOT NULL DEFAULT '',
    workspace   TEXT NOT NULL DEFAULT '',
    params      TEXT NOT NULL DEFAULT '{}',
    timestamp   TEXT
);

CREATE TABLE IF NOT EXISTS plan_runs (
    id              TEXT PRIMARY KEY,
    plan_name       TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending',
    params          TEXT NOT NULL DEFAULT '{}',
    trigger_type    TEXT NOT NULL DEFAULT 'manual',
    total_steps     INTEGER NOT NULL DEFAULT 0,
    completed_steps INTEGER NOT NULL DEFAULT 0,
    duration        REAL,
    started_at      TEXT,
    finished_at     TEXT
);

CREATE TABLE IF NOT EXISTS plan_run_steps (
    run_id      TEXT NOT NULL,
    step_name   TEXT NOT NULL,
    task_name   TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'pending',
    exit_code   INTEGER,
    logs        TEXT NOT NULL DEFAULT '',
    started_at  TEXT,
    finished_at TEXT,
    duration    REAL,
    PRIMARY KEY (run_id, step_name)
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status);
CREATE INDEX IF NOT EXISTS idx_plan_runs_plan ON plan_runs (plan_name);
CREATE INDEX IF NOT EXISTS idx_steps_run ON plan_run_steps (run_id);
";

/// Columns added after the first shipped schema. Old databases gain them
/// on the next startup; fresh databases already have them from `SCHEMA`.
const ADDITIVE: &[(&str, &str, &str)] = &[
    ("nodes", "current_job_id", "current_job_id TEXT"),
    ("jobs", "node_id", "node_id TEXT"),
    (
        "plan_runs",
        "trigger_type",
        "trigger_type TEXT NOT NULL DEFAULT 'manual'",
    ),
    ("plan_runs", "duration", "duration REAL"),
    ("plan_run_steps", "duration", "duration REAL"),
    ("executions", "workspace", "workspace TEXT NOT NULL DEFAULT ''"),
];

pub(crate) fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    for (table, column, ddl) in ADDITIVE {
        ensure_column(conn, table, column, ddl)?;
    }
    Ok(())
}

fn ensure_column(
    conn: &Connection,
    table: &str,
    column: &str,
    ddl: &str,
) -> Result<(), StoreError> {
    let probe = format!("SELECT {column} FROM {table} LIMIT 0");
    if conn.prepare(&probe).is_err() {
        tracing::info!(table, column, "adding missing column");
        conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {ddl}"))?;
    }
    Ok(())
}
