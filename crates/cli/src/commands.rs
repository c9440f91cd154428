// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand implementations.

use anyhow::Context;
use foreman_core::{iso_from_epoch_ms, CliExecution, Clock, SystemClock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

/// Thin authenticated HTTP client around the server API.
pub struct Client {
    server: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl Client {
    pub fn new(server: String, token: Option<String>) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> anyhow::Result<serde_json::Value> {
        let mut request = self.http.get(format!("{}{path}", self.server));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.context("requesting server")?;
        anyhow::ensure!(
            response.status().is_success(),
            "server returned {}",
            response.status()
        );
        response.json().await.context("decoding response")
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> anyhow::Result<()> {
        let mut request = self.http.post(format!("{}{path}", self.server)).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.context("requesting server")?;
        anyhow::ensure!(
            response.status().is_success(),
            "server returned {}",
            response.status()
        );
        Ok(())
    }
}

/// clap value parser for `key=value` arguments.
pub fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

fn runner_paths() -> (PathBuf, PathBuf) {
    let root = std::env::var("FOREMAN_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let runner = std::env::var("FOREMAN_RUNNER")
        .map(PathBuf::from)
        .unwrap_or_else(|_| root.join("bin").join("task-runner"));
    let taskfile = std::env::var("FOREMAN_TASKFILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| root.join("tasks.yml"));
    (runner, taskfile)
}

/// Run a task through the local task runner with inherited stdio, then
/// report the execution. Returns the task's exit code.
pub async fn run(
    client: &Client,
    task: &str,
    vars: Vec<(String, String)>,
    no_report: bool,
) -> anyhow::Result<i32> {
    let (runner, taskfile) = runner_paths();
    let params: HashMap<String, String> = vars.into_iter().collect();

    let started = std::time::Instant::now();
    let status = tokio::process::Command::new(&runner)
        .arg("-t")
        .arg(&taskfile)
        .arg(task)
        .envs(&params)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("spawning {}", runner.display()))?;
    let exit_code = status.code().unwrap_or(-1);
    let duration = started.elapsed().as_secs_f64();

    if !no_report {
        let report = CliExecution {
            id: 0,
            task: task.to_string(),
            exit_code,
            duration: Some(duration),
            host: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".into()),
            workspace: std::env::current_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
            params,
            timestamp: Some(iso_from_epoch_ms(SystemClock.epoch_ms())),
        };
        let body = serde_json::to_value(&report).context("encoding report")?;
        if let Err(err) = client.post("/api/v1/stats/report", &body).await {
            // Reporting is best-effort; the task result matters more.
            eprintln!("warning: failed to report execution: {err}");
        }
    }
    Ok(exit_code)
}

/// Print the unified execution history for one kind.
pub async fn list_executions(client: &Client, kind: &str, limit: usize) -> anyhow::Result<()> {
    let body = client
        .get(&format!("/api/v1/executions?type={kind}&limit={limit}"))
        .await?;
    let entries = body["executions"].as_array().cloned().unwrap_or_default();
    if entries.is_empty() {
        println!("no executions");
        return Ok(());
    }
    println!("{:<10} {:<24} {:<10} {:>6}  {}", "ID", "NAME", "STATUS", "EXIT", "WHEN");
    for entry in entries {
        println!(
            "{:<10} {:<24} {:<10} {:>6}  {}",
            entry["id"].as_str().unwrap_or("-"),
            entry["name"].as_str().unwrap_or("-"),
            entry["status"].as_str().unwrap_or("-"),
            entry["exit_code"]
                .as_i64()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".into()),
            entry["timestamp"].as_str().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Print the node fleet.
pub async fn list_nodes(client: &Client) -> anyhow::Result<()> {
    let body = client.get("/api/v1/nodes").await?;
    let nodes = body["nodes"].as_array().cloned().unwrap_or_default();
    if nodes.is_empty() {
        println!("no nodes registered");
        return Ok(());
    }
    println!("{:<10} {:<20} {:<8} {:<22} {}", "ID", "NAME", "STATUS", "LAST SEEN", "TAGS");
    for node in nodes {
        let tags: Vec<&str> = node["tags"]
            .as_array()
            .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect())
            .unwrap_or_default();
        println!(
            "{:<10} {:<20} {:<8} {:<22} {}",
            node["id"].as_str().unwrap_or("-"),
            node["name"].as_str().unwrap_or("-"),
            node["status"].as_str().unwrap_or("-"),
            node["last_seen"].as_str().unwrap_or("-"),
            tags.join(","),
        );
    }
    Ok(())
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
