// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live job state: the runtime counterpart of the jobs table.
//!
//! Holds the log buffer and cancellation token of every non-terminal
//! job. Status transitions write through the store and publish on the
//! bus; logs stay in memory until finalization persists the snapshot.

use crate::bus::EventBus;
use crate::EngineError;
use foreman_core::{BusEvent, Clock, Job, JobResult, JobStatus};
use foreman_store::{JobPatch, Store};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct LiveJob {
    logs: String,
    cancel: CancellationToken,
}

pub struct JobRuntime<C: Clock> {
    store: Arc<Store>,
    bus: EventBus,
    clock: C,
    live: Mutex<HashMap<String, LiveJob>>,
}

impl<C: Clock> JobRuntime<C> {
    pub fn new(store: Arc<Store>, bus: EventBus, clock: C) -> Self {
        Self {
            store,
            bus,
            clock,
            live: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Persist a new pending job and open its live buffer.
    pub fn create_job(
        &self,
        task: &str,
        node_id: Option<String>,
        vars: HashMap<String, String>,
    ) -> Result<Job, EngineError> {
        let job = Job::new(task, node_id, vars, self.clock.now_iso());
        self.store.insert_job(&job)?;
        self.live.lock().insert(
            job.id.clone(),
            LiveJob {
                logs: String::new(),
                cancel: CancellationToken::new(),
            },
        );
        self.bus.publish(BusEvent::JobUpdate { job: job.clone() });
        Ok(job)
    }

    /// Transition `pending → running`.
    pub fn mark_running(&self, id: &str) -> Result<(), EngineError> {
        self.store.update_job(
            id,
            &JobPatch {
                status: Some(JobStatus::Running),
                started_at: Some(self.clock.now_iso()),
                ..JobPatch::default()
            },
        )?;
        self.publish_update(id)?;
        Ok(())
    }

    /// Append one line to a live job's buffer and fan it out.
    pub fn append_log(&self, id: &str, line: &str) {
        {
            let mut live = self.live.lock();
            if let Some(entry) = live.get_mut(id) {
                entry.logs.push_str(line);
                if !line.ends_with('\n') {
                    entry.logs.push('\n');
                }
            }
        }
        self.bus.publish(BusEvent::JobLog {
            job_id: id.to_string(),
            line: line.trim_end_matches('\n').to_string(),
        });
    }

    /// Current live log buffer, if the job has one.
    pub fn live_logs(&self, id: &str) -> Option<String> {
        self.live.lock().get(id).map(|entry| entry.logs.clone())
    }

    /// Cancellation token for a live job.
    pub fn cancel_token(&self, id: &str) -> Option<CancellationToken> {
        self.live.lock().get(id).map(|entry| entry.cancel.clone())
    }

    /// Job as the API should see it: stored record with the live log
    /// buffer overlaid while the job is still in flight.
    pub fn get_job(&self, id: &str) -> Result<Option<Job>, EngineError> {
        let Some(mut job) = self.store.get_job(id)? else {
            return Ok(None);
        };
        if !job.status.is_terminal() {
            if let Some(logs) = self.live_logs(id) {
                job.logs = logs;
            }
        }
        Ok(Some(job))
    }

    /// Operator cancellation. Flips a non-terminal job to `cancelled`,
    /// signals its subprocess (if local and in flight), and publishes.
    /// Returns false when the job was already terminal.
    pub fn cancel(&self, id: &str) -> Result<bool, EngineError> {
        let Some(job) = self.store.get_job(id)? else {
            return Err(EngineError::JobNotFound(id.to_string()));
        };
        if job.status.is_terminal() {
            return Ok(false);
        }
        let (logs, cancel) = {
            let live = self.live.lock();
            match live.get(id) {
                Some(entry) => (Some(entry.logs.clone()), Some(entry.cancel.clone())),
                None => (None, None),
            }
        };
        self.store.update_job(
            id,
            &JobPatch {
                status: Some(JobStatus::Cancelled),
                logs,
                finished_at: Some(self.clock.now_iso()),
                ..JobPatch::default()
            },
        )?;
        if let Some(token) = cancel {
            token.cancel();
        }
        self.publish_update(id)?;
        Ok(true)
    }

    /// Terminal transition from the execution path. Idempotent against a
    /// racing operator cancel: once a job is terminal, only its log
    /// snapshot is topped up.
    pub fn finalize(
        &self,
        id: &str,
        status: JobStatus,
        exit_code: Option<i32>,
    ) -> Result<Job, EngineError> {
        let logs = self
            .live
            .lock()
            .remove(id)
            .map(|entry| entry.logs)
            .unwrap_or_default();
        let Some(stored) = self.store.get_job(id)? else {
            return Err(EngineError::JobNotFound(id.to_string()));
        };
        let patch = if stored.status.is_terminal() {
            JobPatch {
                logs: Some(logs),
                ..JobPatch::default()
            }
        } else {
            JobPatch {
                status: Some(status),
                exit_code,
                logs: Some(logs),
                finished_at: Some(self.clock.now_iso()),
                ..JobPatch::default()
            }
        };
        self.store.update_job(id, &patch)?;
        self.publish_update(id)
    }

    /// Apply a result reported over HTTP by an agent. Accepted
    /// regardless of the reporting node's liveness; a result for an
    /// already-terminal job is acknowledged without effect so at-least-
    /// once delivery stays harmless.
    pub fn apply_result(&self, id: &str, result: &JobResult) -> Result<Job, EngineError> {
        let Some(stored) = self.store.get_job(id)? else {
            return Err(EngineError::JobNotFound(id.to_string()));
        };
        if stored.status.is_terminal() {
            return Ok(stored);
        }
        if !result.status.is_terminal() {
            // Progress update (e.g. the agent marking the job running):
            // keep the live buffer open and don't stamp finished_at.
            self.store.update_job(
                id,
                &JobPatch {
                    status: Some(result.status),
                    started_at: stored
                        .started_at
                        .is_none()
                        .then(|| self.clock.now_iso()),
                    ..JobPatch::default()
                },
            )?;
            return self.publish_update(id);
        }
        let buffered = self
            .live
            .lock()
            .remove(id)
            .map(|entry| entry.logs)
            .unwrap_or_default();
        let logs = if result.logs.is_empty() {
            buffered
        } else {
            result.logs.clone()
        };
        let now = self.clock.now_iso();
        self.store.update_job(
            id,
            &JobPatch {
                status: Some(result.status),
                exit_code: result.exit_code,
                logs: Some(logs),
                started_at: stored.started_at.is_none().then(|| now.clone()),
                finished_at: Some(now),
            },
        )?;
        self.publish_update(id)
    }

    fn publish_update(&self, id: &str) -> Result<Job, EngineError> {
        let Some(job) = self.store.get_job(id)? else {
            return Err(EngineError::JobNotFound(id.to_string()));
        };
        self.bus.publish(BusEvent::JobUpdate { job: job.clone() });
        Ok(job)
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
