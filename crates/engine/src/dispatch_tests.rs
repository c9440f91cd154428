// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::EventBus;
use crate::executor::ExecConfig;
use crate::registry::NodeRegistry;
use foreman_core::{FakeClock, JobStatus, SystemClock};
use foreman_store::Store;
use std::collections::HashMap;
use std::time::Duration;

fn stub_runner(dir: &tempfile::TempDir) -> ExecConfig {
    use std::os::unix::fs::PermissionsExt;
    let runner = dir.path().join("task-runner");
    std::fs::write(
        &runner,
        "#!/bin/sh\ncase \"$3\" in hello) echo hi; exit 0 ;; *) exit 1 ;; esac\n",
    )
    .unwrap();
    std::fs::set_permissions(&runner, std::fs::Permissions::from_mode(0o755)).unwrap();
    ExecConfig::new(runner, dir.path().join("tasks.yml"))
}

struct Harness<C: foreman_core::Clock> {
    registry: Arc<NodeRegistry<C>>,
    runtime: Arc<JobRuntime<C>>,
    router: JobRouter<C>,
}

fn harness<C: foreman_core::Clock>(clock: C, config: ExecConfig) -> Harness<C> {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let bus = EventBus::new();
    let registry = Arc::new(NodeRegistry::new(store.clone(), bus.clone(), clock.clone()).unwrap());
    let runtime = Arc::new(JobRuntime::new(store, bus, clock));
    let router = JobRouter::new(
        registry.clone(),
        runtime.clone(),
        Arc::new(LocalExecutor::new(config)),
        4,
    );
    Harness {
        registry,
        runtime,
        router,
    }
}

#[tokio::test]
async fn local_job_runs_to_success() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(SystemClock, stub_runner(&dir));

    let job = h.runtime.create_job("hello", None, HashMap::new()).unwrap();
    h.router.dispatch(&job).await.unwrap();

    // Poll until the background worker finalizes the job.
    let done = wait_terminal(&h.runtime, &job.id).await;
    assert_eq!(done.status, JobStatus::Success);
    assert_eq!(done.exit_code, Some(0));
    assert_eq!(done.logs, "hi\n");
    assert!(done.finished_at.unwrap() >= done.started_at.unwrap());
}

#[tokio::test]
async fn local_failure_records_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(SystemClock, stub_runner(&dir));

    let job = h.runtime.create_job("boom", None, HashMap::new()).unwrap();
    h.router.dispatch(&job).await.unwrap();

    let done = wait_terminal(&h.runtime, &job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.exit_code, Some(1));
}

#[tokio::test]
async fn remote_dispatch_pushes_assignment_and_stays_pending() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(FakeClock::new(), stub_runner(&dir));
    let node = h.registry.register(Some("n1".into()), "n1", vec![]).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    h.registry.attach_channel(&node.id, tx).unwrap();

    let job = h
        .runtime
        .create_job("t", Some(node.id.clone()), HashMap::new())
        .unwrap();
    h.router.dispatch(&job).await.unwrap();

    match rx.recv().await {
        Some(foreman_core::ServerMessage::JobAssigned { job: assigned }) => {
            assert_eq!(assigned.id, job.id);
        }
        other => panic!("expected assignment, got {other:?}"),
    }
    // Still pending until the agent reports.
    let stored = h.runtime.get_job(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
    assert_eq!(
        h.registry.get(&node.id).unwrap().current_job_id.as_deref(),
        Some(job.id.as_str())
    );
}

#[tokio::test]
async fn remote_dispatch_to_unknown_node_fails() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(FakeClock::new(), stub_runner(&dir));
    let job = h
        .runtime
        .create_job("t", Some("ghost".into()), HashMap::new())
        .unwrap();
    assert!(matches!(
        h.router.dispatch(&job).await,
        Err(EngineError::NodeUnknown(_))
    ));
}

#[tokio::test]
async fn busy_node_queues_second_job_without_push() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(FakeClock::new(), stub_runner(&dir));
    let node = h.registry.register(Some("n1".into()), "n1", vec![]).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    h.registry.attach_channel(&node.id, tx).unwrap();

    let first = h
        .runtime
        .create_job("t", Some(node.id.clone()), HashMap::new())
        .unwrap();
    h.router.dispatch(&first).await.unwrap();
    let second = h
        .runtime
        .create_job("t", Some(node.id.clone()), HashMap::new())
        .unwrap();
    h.router.dispatch(&second).await.unwrap();

    // Only the first assignment went out; the node still points at it.
    assert!(rx.recv().await.is_some());
    assert!(rx.try_recv().is_err());
    assert_eq!(
        h.registry.get(&node.id).unwrap().current_job_id.as_deref(),
        Some(first.id.as_str())
    );
}

#[tokio::test]
async fn remote_dispatch_without_channel_leaves_job_pending() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(FakeClock::new(), stub_runner(&dir));
    let node = h.registry.register(Some("n1".into()), "n1", vec![]).unwrap();

    let job = h
        .runtime
        .create_job("t", Some(node.id), HashMap::new())
        .unwrap();
    h.router.dispatch(&job).await.unwrap();
    let stored = h.runtime.get_job(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
}

async fn wait_terminal<C: foreman_core::Clock>(
    runtime: &Arc<JobRuntime<C>>,
    id: &str,
) -> foreman_core::Job {
    for _ in 0..200 {
        if let Some(job) = runtime.get_job(id).unwrap() {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {id} never reached a terminal status");
}
