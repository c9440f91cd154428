// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job dispatch: one seam, two execution paths.
//!
//! A pending job either rides the push channel to its agent or lands on
//! the local worker pool. Both paths share the job lifecycle in
//! [`JobRuntime`]; nothing here retries — a failed assignment surfaces
//! immediately and liveness problems belong to the agent protocol.

use crate::executor::LocalExecutor;
use crate::registry::NodeRegistry;
use crate::runtime::JobRuntime;
use crate::EngineError;
use async_trait::async_trait;
use foreman_core::{Clock, Job, ServerMessage};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Route a freshly created job to its executor.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, job: &Job) -> Result<(), EngineError>;
}

/// Default dispatcher: remote jobs go through the registry's push
/// channels, local jobs onto a bounded tokio worker pool.
pub struct JobRouter<C: Clock> {
    registry: Arc<NodeRegistry<C>>,
    runtime: Arc<JobRuntime<C>>,
    executor: Arc<LocalExecutor>,
    permits: Arc<Semaphore>,
}

/// Local worker pool size: number of CPUs, minimum 4.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .max(4)
}

impl<C: Clock> JobRouter<C> {
    pub fn new(
        registry: Arc<NodeRegistry<C>>,
        runtime: Arc<JobRuntime<C>>,
        executor: Arc<LocalExecutor>,
        pool_size: usize,
    ) -> Self {
        Self {
            registry,
            runtime,
            executor,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    fn assign_remote(&self, node_key: &str, job: &Job) -> Result<(), EngineError> {
        let node_id = self
            .registry
            .resolve(node_key)
            .ok_or_else(|| EngineError::NodeUnknown(node_key.to_string()))?;
        let node = self
            .registry
            .get(&node_id)
            .ok_or_else(|| EngineError::NodeUnknown(node_key.to_string()))?;
        // At most one in-flight assignment per node. A busy node keeps
        // the job pending; the agent pulls it over ping once free.
        if node.current_job_id.is_some() {
            tracing::info!(job_id = %job.id, node_id = %node_id, "node busy, job queued");
            return Ok(());
        }
        self.registry.set_current_job(&node_id, Some(&job.id))?;
        if let Some(tx) = self.registry.channel(&node_id) {
            // Fire-and-forget: a full or closed channel leaves the job
            // pending, and the agent pulls it on its next ping.
            if let Err(err) = tx.try_send(ServerMessage::JobAssigned { job: job.clone() }) {
                tracing::warn!(node_id = %node_id, job_id = %job.id, error = %err,
                    "push channel unavailable, falling back to ping delivery");
            }
        }
        tracing::info!(job_id = %job.id, node_id = %node_id, "job assigned to agent");
        Ok(())
    }

    fn spawn_local(&self, job: Job) {
        let runtime = Arc::clone(&self.runtime);
        let executor = Arc::clone(&self.executor);
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                // Semaphore closed only at shutdown.
                return;
            };
            if let Err(err) = run_local(runtime, executor, job).await {
                tracing::error!(error = %err, "local execution failed to record");
            }
        });
        tracing::debug!("job queued on local worker pool");
    }
}

#[async_trait]
impl<C: Clock> Dispatcher for JobRouter<C> {
    async fn dispatch(&self, job: &Job) -> Result<(), EngineError> {
        match &job.node_id {
            Some(node) => self.assign_remote(node, job),
            None => {
                self.spawn_local(job.clone());
                Ok(())
            }
        }
    }
}

async fn run_local<C: Clock>(
    runtime: Arc<JobRuntime<C>>,
    executor: Arc<LocalExecutor>,
    job: Job,
) -> Result<(), EngineError> {
    runtime.mark_running(&job.id)?;
    let cancel = runtime
        .cancel_token(&job.id)
        .unwrap_or_else(CancellationToken::new);
    let sink = Arc::clone(&runtime);
    let job_id = job.id.clone();
    let outcome = executor
        .run_task(&job.task, &job.vars, &cancel, move |line| {
            sink.append_log(&job_id, line)
        })
        .await;
    runtime.finalize(&job.id, outcome.status, outcome.exit_code)?;
    Ok(())
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
