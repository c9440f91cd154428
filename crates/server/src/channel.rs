// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server side of the agent channel.
//!
//! One WebSocket per agent. Inbound messages are registration,
//! heartbeats, and log lines; the only outbound traffic is the
//! registration ack and job assignments pushed through the registry's
//! per-node channel. Final results arrive over HTTP, not here, so a
//! disconnect across the result moment loses nothing.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use foreman_core::{AgentMessage, ServerMessage};
use foreman_engine::EngineError;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run(socket, state))
}

async fn run(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) =
        mpsc::channel::<ServerMessage>(crate::state::Registry::channel_capacity());

    // Writer half: everything queued for this agent goes out as JSON.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut node_id: Option<String> = None;
    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let parsed = match serde_json::from_str::<AgentMessage>(text.as_str()) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "unparseable agent message");
                continue;
            }
        };
        if let Err(err) = handle_message(&state, &tx, &mut node_id, parsed) {
            tracing::error!(error = %err, "agent message failed");
        }
    }

    if let Some(id) = node_id {
        if let Err(err) = state.registry.detach_channel(&id) {
            tracing::warn!(node_id = %id, error = %err, "detach failed");
        }
    }
    writer.abort();
}

/// Apply one inbound message. Split out from the socket loop so the
/// protocol is testable without a connection.
fn handle_message(
    state: &AppState,
    tx: &mpsc::Sender<ServerMessage>,
    node_id: &mut Option<String>,
    message: AgentMessage,
) -> Result<(), EngineError> {
    match message {
        AgentMessage::NodeRegister { id, name, tags } => {
            let node = state.registry.register(id, &name, tags)?;
            state.registry.attach_channel(&node.id, tx.clone())?;
            *node_id = Some(node.id.clone());
            let _ = tx.try_send(ServerMessage::Registered { id: node.id });
        }
        AgentMessage::NodePing { id } => {
            if !state.registry.heartbeat(&id)? {
                tracing::warn!(node_id = %id, "ping from unregistered node");
            }
        }
        AgentMessage::JobLog { job_id, log } => {
            state.runtime.append_log(&job_id, &log);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
