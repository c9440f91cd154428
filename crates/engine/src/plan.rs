// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan runner: dependency-ordered multi-step execution.
//!
//! Drives one plan run to completion: ready steps execute in
//! lexicographic order, steps downstream of a failure skip, and every
//! transition is persisted and published before the next step starts.
//! A loop iteration that makes no progress means the `needs` graph is
//! cyclic (plans are not validated for acyclicity at load); the
//! remainder is skipped and the run fails.

use crate::bus::EventBus;
use crate::executor::StepExec;
use crate::EngineError;
use foreman_core::{
    BusEvent, Clock, JobStatus, PlanDef, PlanRun, PlanRunStatus, PlanRunStep, StepState,
    TriggerType,
};
use foreman_store::{PlanRunPatch, StepPatch, Store};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

pub struct PlanRunner<C: Clock> {
    store: Arc<Store>,
    bus: EventBus,
    executor: Arc<dyn StepExec>,
    clock: C,
}

/// Classification of the not-yet-resolved steps for one loop iteration.
struct Readiness {
    /// Every dependency succeeded; ordered lexicographically.
    ready: Vec<String>,
    /// Some dependency failed or was skipped.
    skip: Vec<String>,
}

fn classify(def: &PlanDef, remaining: &BTreeSet<String>, completed: &HashSet<String>, unrunnable: &HashSet<String>) -> Readiness {
    let mut ready = Vec::new();
    let mut skip = Vec::new();
    for name in remaining {
        let Some(step) = def.step(name) else {
            continue;
        };
        if step.needs.iter().any(|need| unrunnable.contains(need)) {
            skip.push(name.clone());
        } else if step.needs.iter().all(|need| completed.contains(need)) {
            ready.push(name.clone());
        }
    }
    Readiness { ready, skip }
}

impl<C: Clock> PlanRunner<C> {
    pub fn new(store: Arc<Store>, bus: EventBus, executor: Arc<dyn StepExec>, clock: C) -> Self {
        Self {
            store,
            bus,
            executor,
            clock,
        }
    }

    /// Persist a new run with its pending steps and drive it on a
    /// background task. Submitted vars override plan-level params.
    pub fn start(
        self: &Arc<Self>,
        def: PlanDef,
        overrides: HashMap<String, String>,
        trigger: TriggerType,
    ) -> Result<PlanRun, EngineError> {
        let mut params = def.params.clone();
        params.extend(overrides);
        let mut run = PlanRun::new(&def.name, params, trigger, def.steps.len() as u32);
        run.status = PlanRunStatus::Running;
        run.started_at = Some(self.clock.now_iso());
        self.store.insert_plan_run(&run)?;
        for step in &def.steps {
            self.store
                .insert_step(&PlanRunStep::new(&run.id, &step.name, &step.task))?;
        }
        self.publish_run(&run.id, &def.name, PlanRunStatus::Running);

        let runner = Arc::clone(self);
        let run_id = run.id.clone();
        let params = run.params.clone();
        tokio::spawn(async move {
            if let Err(err) = runner.drive(&run_id, &def, &params).await {
                tracing::error!(run_id = %run_id, error = %err, "plan run aborted");
                let _ = runner.store.update_plan_run(
                    &run_id,
                    &PlanRunPatch {
                        status: Some(PlanRunStatus::Error),
                        finished_at: Some(runner.clock.now_iso()),
                        ..PlanRunPatch::default()
                    },
                );
                runner.publish_run(&run_id, &def.name, PlanRunStatus::Error);
            }
        });
        Ok(run)
    }

    /// The scheduling loop. Extracted from `start` so tests can drive it
    /// to completion without going through a spawned task.
    async fn drive(
        &self,
        run_id: &str,
        def: &PlanDef,
        params: &HashMap<String, String>,
    ) -> Result<(), EngineError> {
        let started_ms = self.clock.epoch_ms();
        let mut completed: HashSet<String> = HashSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        // Failed steps plus skipped ones: both poison their dependents.
        let mut unrunnable: HashSet<String> = HashSet::new();
        let mut remaining: BTreeSet<String> =
            def.steps.iter().map(|s| s.name.clone()).collect();
        let mut resolved: u32 = 0;
        let mut stalled = false;

        while !remaining.is_empty() {
            let mut readiness = classify(def, &remaining, &completed, &unrunnable);
            if readiness.ready.is_empty() && readiness.skip.is_empty() {
                // No step can ever become ready: the needs graph cycles.
                stalled = true;
                readiness.skip = remaining.iter().cloned().collect();
                tracing::warn!(run_id, "plan makes no progress, skipping remainder");
            }

            for name in &readiness.skip {
                remaining.remove(name);
                unrunnable.insert(name.clone());
                resolved += 1;
                self.store.update_step(
                    run_id,
                    name,
                    &StepPatch {
                        status: Some(StepState::Skipped),
                        ..StepPatch::default()
                    },
                )?;
                self.store.update_plan_run(
                    run_id,
                    &PlanRunPatch {
                        completed_steps: Some(resolved),
                        ..PlanRunPatch::default()
                    },
                )?;
                self.publish_step(run_id, name, StepState::Skipped, None);
            }
            if stalled {
                break;
            }

            for name in readiness.ready {
                remaining.remove(&name);
                let Some(step) = def.step(&name) else {
                    continue;
                };
                let mut vars = params.clone();
                vars.extend(step.vars.clone());

                self.store.update_step(
                    run_id,
                    &name,
                    &StepPatch {
                        status: Some(StepState::Running),
                        started_at: Some(self.clock.now_iso()),
                        ..StepPatch::default()
                    },
                )?;
                self.publish_step(run_id, &name, StepState::Running, None);

                let step_started_ms = self.clock.epoch_ms();
                let mut logs = String::new();
                let outcome = self.executor.run_step(&step.task, &vars, &mut logs).await;
                let elapsed =
                    self.clock.epoch_ms().saturating_sub(step_started_ms) as f64 / 1000.0;

                let state = if outcome.status == JobStatus::Success {
                    StepState::Success
                } else {
                    StepState::Failed
                };
                resolved += 1;
                self.store.update_step(
                    run_id,
                    &name,
                    &StepPatch {
                        status: Some(state),
                        exit_code: outcome.exit_code,
                        logs: Some(logs),
                        finished_at: Some(self.clock.now_iso()),
                        duration: Some(elapsed),
                        ..StepPatch::default()
                    },
                )?;
                self.store.update_plan_run(
                    run_id,
                    &PlanRunPatch {
                        completed_steps: Some(resolved),
                        ..PlanRunPatch::default()
                    },
                )?;
                self.publish_step(run_id, &name, state, outcome.exit_code);

                if state == StepState::Success {
                    completed.insert(name);
                } else {
                    failed.insert(name.clone());
                    unrunnable.insert(name);
                }
            }
        }

        // A run only succeeds when nothing failed and the defense never
        // fired; skips always trace back to one of those two.
        let status = if failed.is_empty() && !stalled {
            PlanRunStatus::Success
        } else {
            PlanRunStatus::Failed
        };
        let duration = self.clock.epoch_ms().saturating_sub(started_ms) as f64 / 1000.0;
        self.store.update_plan_run(
            run_id,
            &PlanRunPatch {
                status: Some(status),
                completed_steps: Some(resolved),
                duration: Some(duration),
                finished_at: Some(self.clock.now_iso()),
                ..PlanRunPatch::default()
            },
        )?;
        self.publish_run(run_id, &def.name, status);
        Ok(())
    }

    fn publish_run(&self, run_id: &str, plan_name: &str, status: PlanRunStatus) {
        self.bus.publish(BusEvent::PlanUpdate {
            run_id: run_id.to_string(),
            plan_name: plan_name.to_string(),
            status,
        });
    }

    fn publish_step(&self, run_id: &str, step_name: &str, status: StepState, exit_code: Option<i32>) {
        self.bus.publish(BusEvent::PlanStepUpdate {
            run_id: run_id.to_string(),
            step_name: step_name.to_string(),
            status,
            exit_code,
        });
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
