//! Host kernels for the CPU backend
//!
//! A kernel is a Rust closure registered under the name tasks refer to.
//! At launch it receives a [`KernelInvocation`] giving typed access to the
//! bound arguments.

use super::memory::MemoryManager;
use crate::backend::{ArgsFrame, BufferHandle, InstalledCode, KernelArg, LaunchConfig};
use crate::error::{BackendError, Result};
use crate::object::{Element, ScalarValue};
use std::sync::Arc;

/// Registered kernel body
pub type KernelFn = Arc<dyn Fn(&mut KernelInvocation<'_>) -> Result<()> + Send + Sync>;

/// Arguments and launch geometry of one kernel dispatch
pub struct KernelInvocation<'a> {
    memory: &'a mut MemoryManager,
    frame: &'a ArgsFrame,
    atomics: Option<BufferHandle>,
    code: &'a InstalledCode,
    /// Worker grid of the launch
    pub config: LaunchConfig,
    /// First global index covered by this launch
    pub global_offset: u64,
}

impl<'a> KernelInvocation<'a> {
    pub(crate) fn new(
        memory: &'a mut MemoryManager,
        frame: &'a ArgsFrame,
        atomics: Option<BufferHandle>,
        code: &'a InstalledCode,
        config: LaunchConfig,
        global_offset: u64,
    ) -> Self {
        Self {
            memory,
            frame,
            atomics,
            code,
            config,
            global_offset,
        }
    }

    /// Threads to run: the batch thread count when batched, else the grid size
    pub fn threads(&self) -> u64 {
        if self.code.batch_threads > 0 {
            self.code.batch_threads
        } else {
            self.config.total_threads()
        }
    }

    /// Batches completed before this one
    pub fn batch_number(&self) -> u64 {
        self.code.batch_number
    }

    pub fn batch_size(&self) -> u64 {
        self.code.batch_size
    }

    pub fn num_args(&self) -> usize {
        self.frame.len()
    }

    fn arg(&self, index: usize) -> Result<&KernelArg> {
        self.frame
            .get(index)
            .ok_or_else(|| BackendError::argument(index, format!("frame holds {} arguments", self.frame.len())))
    }

    fn buffer_handle(&self, index: usize) -> Result<BufferHandle> {
        match self.arg(index)? {
            KernelArg::Buffer(buffer) => Ok(buffer.handle),
            other => Err(BackendError::argument(index, format!("expected buffer, found {:?}", other))),
        }
    }

    pub fn constant(&self, index: usize) -> Result<ScalarValue> {
        match self.arg(index)? {
            KernelArg::Constant(value) => Ok(*value),
            other => Err(BackendError::argument(index, format!("expected constant, found {:?}", other))),
        }
    }

    pub fn is_kernel_context(&self, index: usize) -> bool {
        matches!(self.frame.get(index), Some(KernelArg::KernelContext))
    }

    /// Read a buffer argument as `T`
    pub fn read<T: Element>(&self, index: usize) -> Result<Vec<T>> {
        let bytes = self.memory.buffer(self.buffer_handle(index)?)?;
        Ok(bytemuck::allocation::pod_collect_to_vec::<u8, T>(bytes))
    }

    /// Overwrite the start of a buffer argument with `data`
    pub fn write<T: Element>(&mut self, index: usize, data: &[T]) -> Result<()> {
        let handle = self.buffer_handle(index)?;
        self.memory.copy_to_buffer(handle, 0, bytemuck::cast_slice(data))
    }

    /// Current atomics array
    pub fn atomics(&self) -> Result<Vec<i32>> {
        let handle = self
            .atomics
            .ok_or_else(|| BackendError::execution_error("launch has no atomics buffer"))?;
        Ok(bytemuck::allocation::pod_collect_to_vec::<u8, i32>(self.memory.buffer(handle)?))
    }

    pub fn write_atomics(&mut self, values: &[i32]) -> Result<()> {
        let handle = self
            .atomics
            .ok_or_else(|| BackendError::execution_error("launch has no atomics buffer"))?;
        self.memory.copy_to_buffer(handle, 0, bytemuck::cast_slice(values))
    }
}
