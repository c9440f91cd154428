// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task and plan definition library.
//!
//! Definitions live under the installation root: task metadata in
//! `tasks.yml`, one plan per file under `plans/`. Parsing is plain
//! serde_yaml into the core's structures; anything richer belongs to
//! the external task runner.

use foreman_core::{DefError, PlanDef, StepDef, TaskDef};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("duplicate plan name {0:?}")]
    DuplicatePlan(String),
    #[error(transparent)]
    Invalid(#[from] DefError),
}

/// A plan file; the name falls back to the file stem when omitted.
#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    params: HashMap<String, String>,
    steps: Vec<StepDef>,
}

#[derive(Debug, Default)]
pub struct Library {
    tasks: BTreeMap<String, TaskDef>,
    plans: BTreeMap<String, PlanDef>,
}

impl Library {
    /// Load definitions from `<root>/tasks.yml` and `<root>/plans/*.yml`.
    /// Missing files and directories mean empty sets, not errors.
    pub fn load(root: &Path) -> Result<Self, LibraryError> {
        let mut library = Library::default();

        let taskfile = root.join("tasks.yml");
        if taskfile.is_file() {
            let text = read(&taskfile)?;
            let tasks: BTreeMap<String, TaskDef> =
                serde_yaml::from_str(&text).map_err(|source| LibraryError::Parse {
                    path: taskfile.clone(),
                    source,
                })?;
            library.tasks = tasks;
        }

        let plans_dir = root.join("plans");
        if plans_dir.is_dir() {
            let mut paths: Vec<PathBuf> = std::fs::read_dir(&plans_dir)
                .map_err(|source| LibraryError::Io {
                    path: plans_dir.clone(),
                    source,
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    matches!(
                        path.extension().and_then(|e| e.to_str()),
                        Some("yml" | "yaml")
                    )
                })
                .collect();
            paths.sort();
            for path in paths {
                library.add_plan_file(&path)?;
            }
        }

        tracing::info!(
            tasks = library.tasks.len(),
            plans = library.plans.len(),
            "definitions loaded"
        );
        Ok(library)
    }

    fn add_plan_file(&mut self, path: &Path) -> Result<(), LibraryError> {
        let text = read(path)?;
        let file: PlanFile = serde_yaml::from_str(&text).map_err(|source| LibraryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let name = file.name.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("plan")
                .to_string()
        });
        let plan = PlanDef {
            name: name.clone(),
            params: file.params,
            steps: file.steps,
        };
        plan.validate()?;
        if self.plans.contains_key(&name) {
            return Err(LibraryError::DuplicatePlan(name));
        }
        self.plans.insert(name, plan);
        Ok(())
    }

    pub fn task_names(&self) -> impl Iterator<Item = (&String, &TaskDef)> {
        self.tasks.iter()
    }

    pub fn plan(&self, name: &str) -> Option<&PlanDef> {
        self.plans.get(name)
    }

    pub fn plans(&self) -> impl Iterator<Item = &PlanDef> {
        self.plans.values()
    }

    #[cfg(test)]
    pub fn with_plans(plans: Vec<PlanDef>) -> Self {
        let mut library = Library::default();
        for plan in plans {
            library.plans.insert(plan.name.clone(), plan);
        }
        library
    }
}

fn read(path: &Path) -> Result<String, LibraryError> {
    std::fs::read_to_string(path).map_err(|source| LibraryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "library_tests.rs"]
mod tests;
