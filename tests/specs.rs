// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenarios: the engine wired exactly as the daemon
//! wires it, driven against stub task runners.

use foreman_core::test_support::plan_def;
use foreman_core::{FakeClock, JobStatus, PlanRunStatus, StepState, SystemClock, TriggerType};
use foreman_engine::{
    Dispatcher, EventBus, ExecConfig, JobRouter, JobRuntime, LocalExecutor, NodeRegistry,
    PlanRunner,
};
use foreman_store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn stub_runner(dir: &tempfile::TempDir) -> ExecConfig {
    use std::os::unix::fs::PermissionsExt;
    let runner = dir.path().join("task-runner");
    std::fs::write(
        &runner,
        "#!/bin/sh\ncase \"$3\" in ok|hello) echo hi; exit 0 ;; fail) echo nope >&2; exit 1 ;; *) exit 0 ;; esac\n",
    )
    .unwrap();
    std::fs::set_permissions(&runner, std::fs::Permissions::from_mode(0o755)).unwrap();
    ExecConfig::new(runner, dir.path().join("tasks.yml"))
}

#[tokio::test]
async fn local_task_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open_in_memory().unwrap());
    let bus = EventBus::new();
    let clock = SystemClock;
    let registry = Arc::new(NodeRegistry::new(store.clone(), bus.clone(), clock.clone()).unwrap());
    let runtime = Arc::new(JobRuntime::new(store.clone(), bus.clone(), clock));
    let router = JobRouter::new(
        registry,
        runtime.clone(),
        Arc::new(LocalExecutor::new(stub_runner(&dir))),
        4,
    );

    let job = runtime.create_job("hello", None, HashMap::new()).unwrap();
    router.dispatch(&job).await.unwrap();

    let mut finished = None;
    for _ in 0..200 {
        let current = runtime.get_job(&job.id).unwrap().unwrap();
        if current.status.is_terminal() {
            finished = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let job = finished.expect("job never finished");
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.exit_code, Some(0));
    assert!(job.logs.contains("hi"));
    assert!(job.finished_at.unwrap() >= job.started_at.unwrap());
}

async fn run_plan_to_completion(
    def: foreman_core::PlanDef,
) -> (foreman_core::PlanRun, Vec<foreman_core::PlanRunStep>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open_in_memory().unwrap());
    let runner = Arc::new(PlanRunner::new(
        store.clone(),
        EventBus::new(),
        Arc::new(LocalExecutor::new(stub_runner(&dir))),
        FakeClock::new(),
    ));

    let run = runner
        .start(def, HashMap::new(), TriggerType::Manual)
        .unwrap();
    for _ in 0..400 {
        let current = store.get_plan_run(&run.id).unwrap().unwrap();
        if current.status.is_terminal() {
            return store.get_plan_run_with_steps(&run.id).unwrap().unwrap();
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("plan run never finished");
}

#[tokio::test]
async fn plan_skips_downstream_of_failure() {
    let def = plan_def(
        "p",
        &[
            ("a", "ok", &[]),
            ("b", "fail", &["a"]),
            ("c", "ok", &["b"]),
            ("d", "ok", &["a"]),
        ],
    );
    let (run, steps) = run_plan_to_completion(def).await;

    let status = |name: &str| {
        steps
            .iter()
            .find(|s| s.step_name == name)
            .map(|s| s.status)
            .unwrap()
    };
    assert_eq!(status("a"), StepState::Success);
    assert_eq!(status("b"), StepState::Failed);
    assert_eq!(status("c"), StepState::Skipped);
    assert_eq!(status("d"), StepState::Success);
    assert_eq!(run.status, PlanRunStatus::Failed);
    assert_eq!(run.completed_steps, 4);

    // The failing step captured its stderr.
    let failed = steps.iter().find(|s| s.step_name == "b").unwrap();
    assert!(failed.logs.contains("nope"));
    assert_eq!(failed.exit_code, Some(1));
}

#[tokio::test]
async fn plan_cycle_defense() {
    let def = plan_def("p", &[("a", "ok", &["b"]), ("b", "ok", &["a"])]);
    let (run, steps) = run_plan_to_completion(def).await;

    assert!(steps.iter().all(|s| s.status == StepState::Skipped));
    assert_eq!(run.status, PlanRunStatus::Failed);
}

#[test]
fn plan_run_round_trip_preserves_insertion_order() {
    let store = Store::open_in_memory().unwrap();
    let mut run = foreman_core::PlanRun::new(
        "release",
        HashMap::from([("v".to_string(), "1".to_string())]),
        TriggerType::Webhook,
        3,
    );
    run.status = PlanRunStatus::Success;
    run.completed_steps = 3;
    run.duration = Some(4.2);
    store.insert_plan_run(&run).unwrap();
    for name in ["zeta", "alpha", "mid"] {
        store
            .insert_step(&foreman_core::PlanRunStep::new(&run.id, name, "t"))
            .unwrap();
    }

    let (loaded, steps) = store.get_plan_run_with_steps(&run.id).unwrap().unwrap();
    assert_eq!(loaded, run);
    let names: Vec<&str> = steps.iter().map(|s| s.step_name.as_str()).collect();
    assert_eq!(names, ["zeta", "alpha", "mid"]);
}
