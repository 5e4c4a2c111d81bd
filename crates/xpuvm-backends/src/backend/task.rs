//! Task metadata and compile requests

use super::types::LaunchConfig;
use serde::{Deserialize, Serialize};

/// Immutable description of one task in the execution context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMeta {
    /// Task identifier, e.g. `s0.t0`
    pub id: String,
    /// Kernel name the backend compiles
    pub kernel: String,
    /// Index of the device the task is scheduled on
    pub device: u32,
    pub grid: LaunchConfig,
    /// Kernel stores the iteration index into an output
    pub writes_loop_index: bool,
    pub uses_fp64: bool,
}

impl TaskMeta {
    pub fn new(id: impl Into<String>, kernel: impl Into<String>, grid: LaunchConfig) -> Self {
        Self {
            id: id.into(),
            kernel: kernel.into(),
            device: 0,
            grid,
            writes_loop_index: false,
            uses_fp64: false,
        }
    }

    pub fn on_device(mut self, device: u32) -> Self {
        self.device = device;
        self
    }

    pub fn writes_loop_index(mut self, writes: bool) -> Self {
        self.writes_loop_index = writes;
        self
    }

    pub fn uses_fp64(mut self, uses: bool) -> Self {
        self.uses_fp64 = uses;
        self
    }
}

/// Parameters of one compilation
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub task: &'a TaskMeta,
    pub task_index: usize,
    pub batch_threads: u64,
    pub batch_size: u64,
    pub batch_number: u64,
    /// Grid replacing `task.grid`, when one is scheduled
    pub grid: Option<LaunchConfig>,
    /// Recompile even when the backend holds a binary for this task
    pub force: bool,
}
