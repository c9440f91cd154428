// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-agent: remote worker for the foreman control plane.
//!
//! Connects to the server's agent channel, registers, heartbeats every
//! 5 s, and executes assigned jobs one at a time through the local task
//! runner, streaming log lines back over the channel. The final result
//! goes out over HTTP so a channel hiccup at the finish line cannot
//! lose it. Assignments are deduped by job id — delivery is
//! at-least-once by design.

mod session;

use clap::Parser;
use session::Agent;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Delay between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "foreman-agent", about = "Remote worker agent")]
struct Args {
    /// Server URL
    #[arg(short, long, default_value = "http://localhost:8080", env = "FOREMAN_SERVER_URL")]
    server: String,

    /// Node name (also the preferred node id on reconnect)
    #[arg(short, long, env = "FOREMAN_NODE_NAME")]
    name: Option<String>,

    /// Bearer token
    #[arg(short, long, env = "FOREMAN_TOKEN")]
    token: Option<String>,

    /// Task-runner binary (default: <root>/bin/task-runner)
    #[arg(long, env = "FOREMAN_RUNNER")]
    runner: Option<PathBuf>,

    /// Task definition file (default: <root>/tasks.yml)
    #[arg(long, env = "FOREMAN_TASKFILE")]
    taskfile: Option<PathBuf>,
}

fn install_root() -> PathBuf {
    if let Ok(dir) = std::env::var("FOREMAN_ROOT") {
        return PathBuf::from(dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(|p| p.parent()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Self-describing tags: architecture, OS, plus anything the operator
/// set in FOREMAN_NODE_TAGS (comma-separated).
fn node_tags() -> Vec<String> {
    let mut tags = vec![
        format!("arch:{}", std::env::consts::ARCH),
        format!("os:{}", std::env::consts::OS),
    ];
    if let Ok(extra) = std::env::var("FOREMAN_NODE_TAGS") {
        tags.extend(
            extra
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
    }
    tags
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FOREMAN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let root = install_root();
    let name = args
        .name
        .unwrap_or_else(|| format!("node-{}", std::process::id()));
    let agent = Agent::new(
        args.server,
        args.token,
        name,
        node_tags(),
        args.runner.unwrap_or_else(|| root.join("bin").join("task-runner")),
        args.taskfile.unwrap_or_else(|| root.join("tasks.yml")),
    )?;

    loop {
        match agent.session().await {
            Ok(()) => tracing::info!("disconnected from server"),
            Err(err) => tracing::warn!(error = %err, "connection failed"),
        }
        tracing::info!(delay_s = RECONNECT_DELAY.as_secs(), "reconnecting");
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
