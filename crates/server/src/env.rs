// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use std::path::PathBuf;

/// Installation root: `FOREMAN_ROOT`, else the directory above the
/// executable, else the current directory.
pub fn install_root() -> PathBuf {
    if let Ok(dir) = std::env::var("FOREMAN_ROOT") {
        return PathBuf::from(dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(|p| p.parent()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// State directory: `FOREMAN_STATE_DIR` > `XDG_STATE_HOME/foreman` >
/// `~/.local/state/foreman`.
pub fn state_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("FOREMAN_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("foreman"));
    }
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("cannot resolve a state directory: HOME is unset"))?;
    Ok(PathBuf::from(home).join(".local/state/foreman"))
}

/// Bearer token. Unset or empty means the API is open.
pub fn token() -> Option<String> {
    std::env::var("FOREMAN_TOKEN").ok().filter(|t| !t.is_empty())
}

/// HTTP bind port (default 8080).
pub fn http_port() -> u16 {
    std::env::var("FOREMAN_HTTP_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080)
}

/// Task-runner binary: `FOREMAN_RUNNER` or `<root>/bin/task-runner`.
pub fn runner_bin(root: &std::path::Path) -> PathBuf {
    std::env::var("FOREMAN_RUNNER")
        .map(PathBuf::from)
        .unwrap_or_else(|_| root.join("bin").join("task-runner"))
}

/// Task definition file: `FOREMAN_TASKFILE` or `<root>/tasks.yml`.
pub fn taskfile(root: &std::path::Path) -> PathBuf {
    std::env::var("FOREMAN_TASKFILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| root.join("tasks.yml"))
}

/// Local worker pool override.
pub fn max_local_jobs() -> Option<usize> {
    std::env::var("FOREMAN_MAX_LOCAL_JOBS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
