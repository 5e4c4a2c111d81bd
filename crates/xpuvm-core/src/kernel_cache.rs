//! Per-task compiled-code cache and recompilation triggers
//!
//! A slot remembers the batch parameters its binary was built for. Two
//! conditions force a rebuild before a LAUNCH:
//!
//! - the batch thread count changed from a non-zero value the valid binary
//!   was built with (the last, shorter batch)
//! - the kernel writes the loop index and at least one batch has already
//!   run, so the baked-in batch number is stale

use xpuvm_backends::{CompileRequest, InstalledCode, LaunchConfig, TaskMeta};

/// Cached binary and batch parameters of one task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSlot {
    code: Option<InstalledCode>,
    pub batch_threads: u64,
    pub batch_size: u64,
    pub batch_number: u64,
    pub force_compile: bool,
}

impl CacheSlot {
    /// Installed and still valid
    pub fn code(&self) -> Option<&InstalledCode> {
        self.code.as_ref().filter(|c| c.is_valid())
    }

    pub fn needs_compile(&self) -> bool {
        self.code().is_none()
    }

    fn invalidate(&mut self) {
        if let Some(code) = self.code.as_mut() {
            code.invalidate();
        }
    }
}

/// Compiled binaries of every task in a context
#[derive(Debug, Clone, Default)]
pub struct KernelCache {
    slots: Vec<CacheSlot>,
    recompilations: u64,
}

impl KernelCache {
    pub fn new(tasks: usize) -> Self {
        Self {
            slots: vec![CacheSlot::default(); tasks],
            recompilations: 0,
        }
    }

    pub fn slot(&self, task: usize) -> Option<&CacheSlot> {
        self.slots.get(task)
    }

    pub fn code(&self, task: usize) -> Option<&InstalledCode> {
        self.slots.get(task).and_then(CacheSlot::code)
    }

    /// Forced recompilations so far
    pub fn recompilations(&self) -> u64 {
        self.recompilations
    }

    pub fn compiled_tasks(&self) -> usize {
        self.slots.iter().filter(|s| s.code().is_some()).count()
    }

    fn recompilation_needed(slot: &CacheSlot, batch_threads: u64, index_in_write: bool) -> bool {
        let last_batch =
            slot.code().is_some() && slot.batch_threads != 0 && slot.batch_threads != batch_threads;
        let stale_batch_number = slot.batch_number > 0 && index_in_write;
        last_batch || stale_batch_number
    }

    /// Apply the recompilation triggers and the LAUNCH batch parameters
    ///
    /// Returns `true` when a recompilation was triggered.
    pub fn prepare(&mut self, task: usize, batch_threads: u64, index_in_write: bool) -> bool {
        let Some(slot) = self.slots.get_mut(task) else {
            return false;
        };

        let triggered = Self::recompilation_needed(slot, batch_threads, index_in_write);
        if triggered {
            slot.force_compile = true;
            slot.invalidate();
            self.recompilations += 1;
        }

        slot.batch_threads = batch_threads;
        if slot.batch_size == 0 && index_in_write {
            slot.batch_size = batch_threads;
        }
        triggered
    }

    pub fn needs_compile(&self, task: usize) -> bool {
        self.slots.get(task).is_none_or(CacheSlot::needs_compile)
    }

    /// Compile request reflecting the slot's batch parameters
    pub fn request<'a>(
        &self,
        task_index: usize,
        task: &'a TaskMeta,
        grid: Option<LaunchConfig>,
    ) -> CompileRequest<'a> {
        let slot = self.slots.get(task_index).cloned().unwrap_or_default();
        CompileRequest {
            task,
            task_index,
            batch_threads: slot.batch_threads,
            batch_size: slot.batch_size,
            batch_number: slot.batch_number,
            grid,
            force: slot.force_compile,
        }
    }

    /// Store a freshly compiled binary
    pub fn install(&mut self, task: usize, code: InstalledCode, index_in_write: bool) {
        if let Some(slot) = self.slots.get_mut(task) {
            slot.code = Some(code);
            slot.force_compile = false;
            if index_in_write && slot.batch_threads != 0 {
                slot.batch_number += 1;
            }
        }
    }

    /// Rebuild `task` at its next LAUNCH
    pub fn force_recompile(&mut self, task: usize) {
        if let Some(slot) = self.slots.get_mut(task) {
            if slot.code().is_some() {
                slot.force_compile = true;
                slot.invalidate();
                self.recompilations += 1;
            }
        }
    }

    /// Drop every binary, keeping batch parameters
    pub fn clear_code(&mut self) {
        for slot in &mut self.slots {
            slot.code = None;
        }
    }
}

// ================================================================================================
// Tests
// ================================================================================================
