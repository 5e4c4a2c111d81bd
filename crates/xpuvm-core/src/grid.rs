//! Per-task worker grids
//!
//! A [`GridScheduler`] maps task ids to the grid the task runs with,
//! replacing the grid declared in its [`TaskMeta`](xpuvm_backends::TaskMeta).
//! Tasks without an entry keep their own grid.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use xpuvm_backends::LaunchConfig;

/// Worker grid overrides keyed by task id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GridScheduler {
    grids: BTreeMap<String, LaunchConfig>,
}

impl GridScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` with `grid`
    pub fn with_grid(mut self, task: impl Into<String>, grid: LaunchConfig) -> Self {
        self.set_grid(task, grid);
        self
    }

    pub fn set_grid(&mut self, task: impl Into<String>, grid: LaunchConfig) {
        self.grids.insert(task.into(), grid);
    }

    pub fn get(&self, task: &str) -> Option<&LaunchConfig> {
        self.grids.get(task)
    }

    /// Grid `task` runs with: the override, or `declared`
    pub fn resolve(&self, task: &str, declared: LaunchConfig) -> LaunchConfig {
        self.get(task).copied().unwrap_or(declared)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.grids.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

impl fmt::Display for GridScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.task_ids().collect();
        f.write_str(&ids.join(", "))
    }
}
