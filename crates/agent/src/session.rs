// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One WebSocket session against the server.

use anyhow::Context;
use foreman_core::{AgentMessage, Job, JobResult, ServerMessage};
use foreman_engine::{ExecConfig, LocalExecutor};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Heartbeat cadence. Well inside the server's 90 s liveness window.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

pub struct Agent {
    server: String,
    ws_url: String,
    token: Option<String>,
    name: String,
    tags: Vec<String>,
    executor: Arc<LocalExecutor>,
    http: reqwest::Client,
    /// Server-assigned id, remembered across reconnects.
    node_id: Arc<Mutex<Option<String>>>,
    /// Job ids already accepted; assignments are at-least-once.
    seen: Arc<Mutex<HashSet<String>>>,
    /// Serializes job execution: one at a time.
    run_gate: Arc<tokio::sync::Mutex<()>>,
}

impl Agent {
    pub fn new(
        server: String,
        token: Option<String>,
        name: String,
        tags: Vec<String>,
        runner: PathBuf,
        taskfile: PathBuf,
    ) -> anyhow::Result<Self> {
        let server = server.trim_end_matches('/').to_string();
        let ws_url = ws_url(&server)?;
        Ok(Self {
            server,
            ws_url,
            token,
            name,
            tags,
            executor: Arc::new(LocalExecutor::new(ExecConfig::new(runner, taskfile))),
            http: reqwest::Client::new(),
            node_id: Arc::new(Mutex::new(None)),
            seen: Arc::new(Mutex::new(HashSet::new())),
            run_gate: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Connect, register, and serve until the connection drops.
    pub async fn session(&self) -> anyhow::Result<()> {
        let mut request = self
            .ws_url
            .clone()
            .into_client_request()
            .context("building websocket request")?;
        if let Some(token) = &self.token {
            request.headers_mut().insert(
                AUTHORIZATION,
                format!("Bearer {token}").parse().context("token header")?,
            );
        }
        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .context("connecting to server")?;
        tracing::info!(server = %self.server, "connected");
        let (mut sink, mut stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::channel::<AgentMessage>(64);
        let writer = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let Ok(text) = serde_json::to_string(&message) else {
                    continue;
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        // Register, preferring the id from a previous session so the
        // server keeps a single record for this worker.
        let register = AgentMessage::NodeRegister {
            id: self.node_id.lock().clone().or_else(|| Some(self.name.clone())),
            name: self.name.clone(),
            tags: self.tags.clone(),
        };
        out_tx.send(register).await.ok();

        let heartbeat = {
            let out_tx = out_tx.clone();
            let node_id = self.node_id.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
                loop {
                    ticker.tick().await;
                    let id = node_id.lock().clone();
                    if let Some(id) = id {
                        if out_tx.send(AgentMessage::NodePing { id }).await.is_err() {
                            break;
                        }
                    }
                }
            })
        };

        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(error = %err, "websocket error");
                    break;
                }
            };
            let Message::Text(text) = message else {
                continue;
            };
            match serde_json::from_str::<ServerMessage>(text.as_str()) {
                Ok(ServerMessage::Registered { id }) => {
                    tracing::info!(node_id = %id, "registered");
                    *self.node_id.lock() = Some(id);
                }
                Ok(ServerMessage::JobAssigned { job }) => {
                    self.accept(job, out_tx.clone());
                }
                Err(err) => tracing::warn!(error = %err, "unparseable server message"),
            }
        }

        heartbeat.abort();
        writer.abort();
        Ok(())
    }

    /// Take an assignment unless it is a replay.
    fn accept(&self, job: Job, out_tx: mpsc::Sender<AgentMessage>) {
        if !self.seen.lock().insert(job.id.clone()) {
            tracing::debug!(job_id = %job.id, "duplicate assignment ignored");
            return;
        }
        tracing::info!(job_id = %job.id, task = %job.task, "job assigned");
        let executor = self.executor.clone();
        let run_gate = self.run_gate.clone();
        let http = self.http.clone();
        let server = self.server.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            let _serial = run_gate.lock().await;
            let result = execute(&executor, &job, &out_tx).await;
            report(&http, &server, token.as_deref(), &job.id, &result).await;
            tracing::info!(job_id = %job.id, status = %result.status, "job finished");
        });
    }
}

/// Run the task locally, streaming each line over the channel.
async fn execute(
    executor: &LocalExecutor,
    job: &Job,
    out_tx: &mpsc::Sender<AgentMessage>,
) -> JobResult {
    let collected = Arc::new(Mutex::new(String::new()));
    let sink = collected.clone();
    let out = out_tx.clone();
    let job_id = job.id.clone();
    let outcome = executor
        .run_task(&job.task, &job.vars, &CancellationToken::new(), move |line| {
            let mut logs = sink.lock();
            logs.push_str(line);
            logs.push('\n');
            let _ = out.try_send(AgentMessage::JobLog {
                job_id: job_id.clone(),
                log: line.to_string(),
            });
        })
        .await;
    let logs = collected.lock().clone();
    JobResult {
        status: outcome.status,
        exit_code: outcome.exit_code,
        logs,
    }
}

/// Report the final result over HTTP; the server accepts it even if the
/// channel died in the meantime.
async fn report(
    http: &reqwest::Client,
    server: &str,
    token: Option<&str>,
    job_id: &str,
    result: &JobResult,
) {
    let url = format!("{server}/api/v1/jobs/{job_id}/result");
    let mut request = http.post(&url).json(result).timeout(Duration::from_secs(10));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    match request.send().await {
        Ok(response) if response.status().is_success() => {}
        Ok(response) => {
            tracing::warn!(job_id, status = %response.status(), "result rejected")
        }
        Err(err) => tracing::warn!(job_id, error = %err, "failed to report result"),
    }
}

/// Map the HTTP base URL onto the websocket endpoint.
fn ws_url(server: &str) -> anyhow::Result<String> {
    let base = if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        anyhow::bail!("server URL must start with http:// or https://: {server}");
    };
    Ok(format!("{base}/api/v1/agents/channel"))
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
