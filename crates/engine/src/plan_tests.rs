// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::executor::ExecOutcome;
use foreman_core::test_support::plan_def;
use foreman_core::{FakeClock, StepDef};
use parking_lot::Mutex;
use proptest::prelude::*;

/// Fake step executor: tasks whose name starts with `fail` fail with
/// exit code 1, everything else succeeds. Records invocations in order.
#[derive(Default)]
struct FakeStepExec {
    calls: Mutex<Vec<(String, HashMap<String, String>)>>,
}

#[async_trait::async_trait]
impl StepExec for FakeStepExec {
    async fn run_step(
        &self,
        task: &str,
        vars: &HashMap<String, String>,
        logs: &mut String,
    ) -> ExecOutcome {
        self.calls.lock().push((task.to_string(), vars.clone()));
        logs.push_str(&format!("ran {task}\n"));
        if task.starts_with("fail") {
            ExecOutcome {
                status: JobStatus::Failed,
                exit_code: Some(1),
            }
        } else {
            ExecOutcome {
                status: JobStatus::Success,
                exit_code: Some(0),
            }
        }
    }
}

struct Harness {
    runner: Arc<PlanRunner<FakeClock>>,
    exec: Arc<FakeStepExec>,
    store: Arc<Store>,
    bus: EventBus,
}

fn harness() -> Harness {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let bus = EventBus::new();
    let exec = Arc::new(FakeStepExec::default());
    let runner = Arc::new(PlanRunner::new(
        store.clone(),
        bus.clone(),
        exec.clone(),
        FakeClock::new(),
    ));
    Harness {
        runner,
        exec,
        store,
        bus,
    }
}

/// Insert the run + steps and drive it to completion inline.
async fn run_inline(
    h: &Harness,
    def: &PlanDef,
    overrides: HashMap<String, String>,
) -> (PlanRun, Vec<PlanRunStep>) {
    let mut params = def.params.clone();
    params.extend(overrides);
    let mut run = PlanRun::new(&def.name, params.clone(), TriggerType::Manual, def.steps.len() as u32);
    run.status = PlanRunStatus::Running;
    h.store.insert_plan_run(&run).unwrap();
    for step in &def.steps {
        h.store
            .insert_step(&PlanRunStep::new(&run.id, &step.name, &step.task))
            .unwrap();
    }
    h.runner.drive(&run.id, def, &params).await.unwrap();
    h.store.get_plan_run_with_steps(&run.id).unwrap().unwrap()
}

fn status_of<'a>(steps: &'a [PlanRunStep], name: &str) -> &'a PlanRunStep {
    steps
        .iter()
        .find(|s| s.step_name == name)
        .unwrap_or_else(|| panic!("missing step {name}"))
}

#[tokio::test]
async fn dependency_failure_skips_transitive_dependents() {
    // a ok; b fails, needs a; c needs b; d needs a.
    let h = harness();
    let def = plan_def(
        "p",
        &[
            ("a", "ok", &[]),
            ("b", "fail", &["a"]),
            ("c", "ok", &["b"]),
            ("d", "ok", &["a"]),
        ],
    );
    let (run, steps) = run_inline(&h, &def, HashMap::new()).await;

    assert_eq!(status_of(&steps, "a").status, StepState::Success);
    assert_eq!(status_of(&steps, "b").status, StepState::Failed);
    assert_eq!(status_of(&steps, "b").exit_code, Some(1));
    assert_eq!(status_of(&steps, "c").status, StepState::Skipped);
    assert_eq!(status_of(&steps, "d").status, StepState::Success);
    assert_eq!(run.status, PlanRunStatus::Failed);
    assert_eq!(run.completed_steps, 4);
    assert_eq!(run.completed_steps, run.total_steps);
    assert!(run.duration.is_some());
    assert!(run.finished_at.is_some());

    // The skipped step never reached the executor.
    let calls: Vec<String> = h.exec.calls.lock().iter().map(|(t, _)| t.clone()).collect();
    assert_eq!(calls, ["ok", "fail", "ok"]);
}

#[tokio::test]
async fn cycle_defense_skips_remainder_and_fails_run() {
    let h = harness();
    let def = plan_def("p", &[("a", "ok", &["b"]), ("b", "ok", &["a"])]);
    let (run, steps) = run_inline(&h, &def, HashMap::new()).await;

    assert_eq!(status_of(&steps, "a").status, StepState::Skipped);
    assert_eq!(status_of(&steps, "b").status, StepState::Skipped);
    assert_eq!(run.status, PlanRunStatus::Failed);
    assert_eq!(run.completed_steps, 2);
    assert!(h.exec.calls.lock().is_empty());
}

#[tokio::test]
async fn ready_steps_execute_in_lexicographic_order() {
    let h = harness();
    let def = plan_def("p", &[("charlie", "t-c", &[]), ("alpha", "t-a", &[]), ("bravo", "t-b", &[])]);
    run_inline(&h, &def, HashMap::new()).await;

    let calls: Vec<String> = h.exec.calls.lock().iter().map(|(t, _)| t.clone()).collect();
    assert_eq!(calls, ["t-a", "t-b", "t-c"]);
}

#[tokio::test]
async fn step_vars_override_run_params() {
    let h = harness();
    let mut def = plan_def("p", &[("a", "ok", &[])]);
    def.params = HashMap::from([
        ("region".to_string(), "us".to_string()),
        ("tier".to_string(), "small".to_string()),
    ]);
    def.steps[0].vars = HashMap::from([("tier".to_string(), "large".to_string())]);

    run_inline(&h, &def, HashMap::from([("region".to_string(), "eu".to_string())])).await;

    let calls = h.exec.calls.lock();
    let (_, vars) = &calls[0];
    // Submission overrides plan params; step vars override both.
    assert_eq!(vars.get("region").map(String::as_str), Some("eu"));
    assert_eq!(vars.get("tier").map(String::as_str), Some("large"));
}

#[tokio::test]
async fn all_success_yields_success_run() {
    let h = harness();
    let def = plan_def("p", &[("a", "ok", &[]), ("b", "ok", &["a"])]);
    let (run, steps) = run_inline(&h, &def, HashMap::new()).await;

    assert_eq!(run.status, PlanRunStatus::Success);
    assert!(steps.iter().all(|s| s.status == StepState::Success));
    assert!(steps.iter().all(|s| s.logs.starts_with("ran ")));
    assert!(steps.iter().all(|s| s.duration.is_some()));
}

#[tokio::test]
async fn step_and_plan_events_are_published_in_order() {
    let h = harness();
    let mut rx = h.bus.subscribe();
    let def = plan_def("p", &[("a", "ok", &[]), ("b", "fail", &["a"]), ("c", "ok", &["b"])]);
    run_inline(&h, &def, HashMap::new()).await;

    let mut observed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            BusEvent::PlanStepUpdate { step_name, status, .. } => {
                observed.push(format!("{step_name}:{status}"));
            }
            BusEvent::PlanUpdate { status, .. } => observed.push(format!("plan:{status}")),
            _ => {}
        }
    }
    assert_eq!(
        observed,
        [
            "a:running",
            "a:success",
            "b:running",
            "b:failed",
            "c:skipped",
            "plan:failed"
        ]
    );
}

#[tokio::test]
async fn start_spawns_and_finishes_in_background() {
    let h = harness();
    let def = plan_def("p", &[("a", "ok", &[])]);
    let run = h
        .runner
        .start(def, HashMap::new(), TriggerType::Webhook)
        .unwrap();
    assert_eq!(run.status, PlanRunStatus::Running);
    assert_eq!(run.trigger_type, TriggerType::Webhook);

    let mut finished = None;
    for _ in 0..100 {
        let current = h.store.get_plan_run(&run.id).unwrap().unwrap();
        if current.status.is_terminal() {
            finished = Some(current);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(finished.unwrap().status, PlanRunStatus::Success);
}

// --- property: failed or skipped dependencies poison dependents ---

fn arb_plan() -> impl Strategy<Value = PlanDef> {
    proptest::collection::vec((any::<u64>(), any::<bool>()), 2..8).prop_map(|specs| {
        let steps = specs
            .iter()
            .enumerate()
            .map(|(i, (mask, fails))| StepDef {
                name: format!("s{i}"),
                task: if *fails { "fail".into() } else { "ok".into() },
                vars: HashMap::new(),
                needs: (0..i)
                    .filter(|j| mask & (1u64 << j) != 0)
                    .map(|j| format!("s{j}"))
                    .collect(),
                artifacts: None,
                inputs: None,
            })
            .collect();
        PlanDef {
            name: "prop".into(),
            params: HashMap::new(),
            steps,
        }
    })
}

fn has_unrunnable_ancestor(def: &PlanDef, steps: &[PlanRunStep], name: &str) -> bool {
    let by_name: HashMap<&str, &PlanRunStep> =
        steps.iter().map(|s| (s.step_name.as_str(), s)).collect();
    let mut queue: Vec<&str> = def
        .step(name)
        .map(|s| s.needs.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let mut seen = HashSet::new();
    while let Some(dep) = queue.pop() {
        if !seen.insert(dep) {
            continue;
        }
        if let Some(record) = by_name.get(dep) {
            if matches!(record.status, StepState::Failed | StepState::Skipped) {
                return true;
            }
        }
        if let Some(dep_def) = def.step(dep) {
            queue.extend(dep_def.needs.iter().map(String::as_str));
        }
    }
    false
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_dags_respect_failure_propagation(def in arb_plan()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let h = harness();
        let (run, steps) = rt.block_on(run_inline(&h, &def, HashMap::new()));

        // Every step resolves, and progress accounting matches.
        prop_assert_eq!(run.completed_steps, run.total_steps);
        prop_assert!(steps.iter().all(|s| s.status.is_resolved()));

        let any_failed = steps.iter().any(|s| s.status == StepState::Failed);
        prop_assert_eq!(
            run.status == PlanRunStatus::Success,
            !any_failed,
            "run status must reflect step failures"
        );

        for step in &steps {
            match step.status {
                // A successful step never sits downstream of a failure.
                StepState::Success => prop_assert!(
                    !has_unrunnable_ancestor(&def, &steps, &step.step_name)
                ),
                // A skipped step always does (the DAG is acyclic here).
                StepState::Skipped => prop_assert!(
                    has_unrunnable_ancestor(&def, &steps, &step.step_name)
                ),
                StepState::Failed => prop_assert_eq!(step.exit_code, Some(1)),
                _ => prop_assert!(false, "unresolved step {}", step.step_name),
            }
        }
    }
}
