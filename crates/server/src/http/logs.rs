// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live log tail over server-sent events.
//!
//! Polls the runtime buffer and yields the unsent slice as a `{logs}`
//! frame, then a final `{status, done: true}` frame once the job goes
//! terminal. Disconnecting clients just drop the stream.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;

/// Interval between polls of the log buffer.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn tail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if state.runtime.get_job(&id)?.is_none() {
        return Err(ApiError::NotFound(format!("job {id}")));
    }

    let stream = futures_util::stream::unfold((state, id, 0usize, false), |cursor| async move {
        let (state, id, mut sent, done) = cursor;
        if done {
            return None;
        }
        loop {
            let job = match state.runtime.get_job(&id) {
                Ok(Some(job)) => job,
                // Deleted mid-stream or store fault: end the stream.
                _ => return None,
            };
            if job.logs.len() > sent {
                let chunk = job.logs[sent..].to_string();
                sent = job.logs.len();
                let frame = sse_json(&serde_json::json!({ "logs": chunk }));
                return Some((Ok(frame), (state, id, sent, false)));
            }
            if job.status.is_terminal() {
                let frame = sse_json(&serde_json::json!({
                    "status": job.status,
                    "done": true,
                }));
                return Some((Ok(frame), (state, id, sent, true)));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_json(value: &serde_json::Value) -> Event {
    Event::default().data(value.to_string())
}
