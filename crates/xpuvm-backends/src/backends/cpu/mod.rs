//! CPU backend implementation
//!
//! Reference implementation of the Backend trait in host memory. It serves
//! as the virtual device for tests, benchmarks and compile-only runs.
//!
//! # Architecture
//!
//! ```text
//! CpuBackend
//! ├── MemoryManager  - heap buffers with a global-memory budget
//! ├── EventTable     - event status, timestamps and marker dependencies
//! ├── kernels        - name → Rust closure
//! └── counters       - per-operation call counts for inspection
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use xpuvm_backends::{CpuBackend, KernelInvocation};
//!
//! let backend = CpuBackend::new().with_kernel("scale", Arc::new(|inv: &mut KernelInvocation<'_>| {
//!     let data: Vec<f32> = inv.read(0)?;
//!     let doubled: Vec<f32> = data.iter().map(|v| v * 2.0).collect();
//!     inv.write(0, &doubled)
//! }));
//! assert!(backend.has_kernel("scale"));
//! ```

mod events;
mod kernel;
pub(crate) mod memory;

use crate::backend::{
    AllocationRequest, ArgsFrame, Backend, CompileRequest, DeviceBuffer, DeviceInfo, EventHandle, EventProfile,
    InstalledCode, LaunchConfig, TaskMeta, TransferRange,
};
use crate::error::{BackendError, Result};
use crate::object::HostObject;
use events::{EventKind, EventTable};
pub use kernel::{KernelFn, KernelInvocation};
use memory::MemoryManager;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use xpuvm_tracing::performance::{record_compilation, record_launch, record_transfer, TransferDirection};

/// Default global memory of the CPU device
pub const DEFAULT_GLOBAL_MEMORY: u64 = 1 << 30;

/// Most recent markers kept by [`CpuBackend::marker_log`]
pub const MARKER_LOG_CAPACITY: usize = 256;

/// Count of each backend operation since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCounters {
    pub loads: u64,
    pub resets: u64,
    pub allocations: u64,
    pub deallocations: u64,
    pub h2d_transfers: u64,
    pub h2d_bytes: u64,
    pub d2h_transfers: u64,
    pub d2h_bytes: u64,
    pub atomics_writes: u64,
    pub compilations: u64,
    pub launches: u64,
    pub markers: u64,
    pub waits: u64,
    pub flushes: u64,
}

impl BackendCounters {
    /// Calls that touch device memory or the command queue
    pub fn device_work(&self) -> u64 {
        self.allocations
            + self.deallocations
            + self.h2d_transfers
            + self.d2h_transfers
            + self.atomics_writes
            + self.launches
            + self.markers
    }
}

/// One `install_code` call as seen by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRecord {
    pub kernel: String,
    pub task_index: usize,
    pub batch_threads: u64,
    pub batch_size: u64,
    pub batch_number: u64,
    pub grid: Option<LaunchConfig>,
    pub forced: bool,
}

/// CPU backend executing registered host kernels
pub struct CpuBackend {
    info: DeviceInfo,
    memory: MemoryManager,
    events: EventTable,
    kernels: HashMap<String, KernelFn>,
    failing_kernels: HashSet<String>,
    compile_log: Vec<CompileRecord>,
    marker_log: Vec<(EventHandle, Vec<EventHandle>)>,
    atomics: Option<DeviceBuffer>,
    counters: BackendCounters,
    epoch: u64,
    loaded: bool,
    next_code_id: u64,
}

impl CpuBackend {
    /// Create a new CPU backend
    ///
    /// # Example
    ///
    /// ```rust
    /// use xpuvm_backends::{Backend, CpuBackend};
    ///
    /// let backend = CpuBackend::new();
    /// assert!(backend.device_info().supports_fp64);
    /// ```
    pub fn new() -> Self {
        Self {
            info: DeviceInfo {
                name: "cpu".to_string(),
                index: 0,
                supports_fp64: true,
                global_memory: DEFAULT_GLOBAL_MEMORY,
            },
            memory: MemoryManager::new(DEFAULT_GLOBAL_MEMORY),
            events: EventTable::new(false),
            kernels: HashMap::new(),
            failing_kernels: HashSet::new(),
            compile_log: Vec::new(),
            marker_log: Vec::new(),
            atomics: None,
            counters: BackendCounters::default(),
            epoch: 0,
            loaded: false,
            next_code_id: 1,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.info.name = name.into();
        self
    }

    pub fn with_device_index(mut self, index: u32) -> Self {
        self.info.index = index;
        self
    }

    /// Limit device memory to `bytes`
    pub fn with_global_memory(mut self, bytes: u64) -> Self {
        self.info.global_memory = bytes;
        self.memory = MemoryManager::new(bytes);
        self
    }

    pub fn with_fp64(mut self, supported: bool) -> Self {
        self.info.supports_fp64 = supported;
        self
    }

    /// Keep command events queued until completed explicitly or waited on
    pub fn with_deferred_completion(mut self) -> Self {
        self.events.set_deferred(true);
        self
    }

    pub fn with_kernel(mut self, name: impl Into<String>, kernel: KernelFn) -> Self {
        self.register_kernel(name, kernel);
        self
    }

    pub fn register_kernel(&mut self, name: impl Into<String>, kernel: KernelFn) {
        self.kernels.insert(name.into(), kernel);
    }

    pub fn has_kernel(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Make every later compilation of `kernel` fail
    pub fn fail_compilation_of(&mut self, kernel: impl Into<String>) {
        self.failing_kernels.insert(kernel.into());
    }

    pub fn counters(&self) -> BackendCounters {
        self.counters
    }

    pub fn compile_log(&self) -> &[CompileRecord] {
        &self.compile_log
    }

    /// Recent markers, oldest first, with the events each one waits on
    ///
    /// Holds at most [`MARKER_LOG_CAPACITY`] entries.
    pub fn marker_log(&self) -> &[(EventHandle, Vec<EventHandle>)] {
        &self.marker_log
    }

    /// Events a command waited on when it was enqueued
    pub fn event_dependencies(&self, event: EventHandle) -> Result<Vec<EventHandle>> {
        self.events.dependencies(event)
    }

    /// Finish a deferred command
    pub fn complete_event(&mut self, event: EventHandle) -> Result<()> {
        self.events.complete(event)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.memory.allocated()
    }

    pub fn live_buffers(&self) -> usize {
        self.memory.live_buffers()
    }

    pub fn live_events(&self) -> usize {
        self.events.len()
    }

    /// Raw contents of a device buffer
    pub fn buffer_contents(&self, buffer: &DeviceBuffer) -> Result<Vec<u8>> {
        self.memory.buffer(buffer.handle).map(<[u8]>::to_vec)
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if !self.loaded {
            self.loaded = true;
            self.counters.loads += 1;
            tracing::debug!(device = %self.info, "device_loaded");
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.memory.clear();
        self.events.clear();
        self.marker_log.clear();
        self.atomics = None;
        self.epoch += 1;
        self.counters.resets += 1;
        tracing::debug!(device = %self.info, epoch = self.epoch, "device_reset");
        Ok(())
    }

    fn reset_epoch(&self) -> u64 {
        self.epoch
    }

    fn allocate(&mut self, requests: &[AllocationRequest]) -> Result<Vec<DeviceBuffer>> {
        let total: u64 = requests.iter().map(|r| r.size).sum();
        self.memory.reserve(total)?;

        let mut buffers = Vec::with_capacity(requests.len());
        for request in requests {
            let handle = self.memory.allocate_buffer(request.size as usize)?;
            buffers.push(DeviceBuffer {
                handle,
                size: request.size,
            });
        }
        self.counters.allocations += 1;
        tracing::trace!(buffers = buffers.len(), bytes = total, "cpu_allocate");
        Ok(buffers)
    }

    fn deallocate(&mut self, buffer: DeviceBuffer) -> Result<u64> {
        let freed = self.memory.free_buffer(buffer.handle)?;
        self.counters.deallocations += 1;
        Ok(freed)
    }

    fn stream_in(
        &mut self,
        object: &HostObject,
        buffer: &DeviceBuffer,
        range: TransferRange,
        wait: &[EventHandle],
    ) -> Result<Vec<EventHandle>> {
        let queued_ns = self.events.now_ns();
        let data = object.read_range(range.host_offset as usize, range.size as usize)?;
        self.memory.copy_to_buffer(buffer.handle, 0, &data)?;
        let event = self.events.record(EventKind::Write, queued_ns, wait)?;

        self.counters.h2d_transfers += 1;
        self.counters.h2d_bytes += range.size;
        record_transfer(
            range.size,
            TransferDirection::HostToDevice,
            (self.events.now_ns() - queued_ns) / 1000,
        );
        Ok(vec![event])
    }

    fn stream_out(
        &mut self,
        object: &mut HostObject,
        buffer: &DeviceBuffer,
        range: TransferRange,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let queued_ns = self.events.now_ns();
        let mut data = vec![0u8; range.size as usize];
        self.memory.copy_from_buffer(buffer.handle, 0, &mut data)?;
        object.write_range(range.host_offset as usize, &data)?;
        let event = self.events.record(EventKind::Read, queued_ns, wait)?;

        self.counters.d2h_transfers += 1;
        self.counters.d2h_bytes += range.size;
        record_transfer(
            range.size,
            TransferDirection::DeviceToHost,
            (self.events.now_ns() - queued_ns) / 1000,
        );
        Ok(event)
    }

    fn install_code(&mut self, request: &CompileRequest<'_>) -> Result<InstalledCode> {
        let start = std::time::Instant::now();
        let kernel = &request.task.kernel;

        if !self.kernels.contains_key(kernel) {
            return Err(BackendError::compilation(kernel, "kernel is not registered"));
        }
        if self.failing_kernels.contains(kernel) {
            return Err(BackendError::compilation(kernel, "code generation failed"));
        }
        if request.task.uses_fp64 && !self.info.supports_fp64 {
            return Err(BackendError::unsupported(format!(
                "fp64 required by '{}' on {}",
                request.task.id, self.info
            )));
        }

        let mut code = InstalledCode::new(self.next_code_id, kernel.clone(), self.epoch);
        self.next_code_id += 1;
        code.batch_threads = request.batch_threads;
        code.batch_size = request.batch_size;
        code.batch_number = request.batch_number;

        self.counters.compilations += 1;
        self.compile_log.push(CompileRecord {
            kernel: kernel.clone(),
            task_index: request.task_index,
            batch_threads: request.batch_threads,
            batch_size: request.batch_size,
            batch_number: request.batch_number,
            grid: request.grid,
            forced: request.force,
        });
        record_compilation(&request.task.id, request.force, start.elapsed().as_micros() as u64);
        Ok(code)
    }

    fn loop_index_in_write(&self, task: &TaskMeta) -> bool {
        task.writes_loop_index
    }

    fn write_atomics(&mut self, values: &[i32], wait: &[EventHandle]) -> Result<(DeviceBuffer, Vec<EventHandle>)> {
        let queued_ns = self.events.now_ns();
        let size = std::mem::size_of_val(values) as u64;

        let buffer = match self.atomics {
            Some(existing) if existing.size >= size => existing,
            previous => {
                if let Some(old) = previous {
                    self.memory.free_buffer(old.handle)?;
                }
                let handle = self.memory.allocate_buffer(size as usize)?;
                let buffer = DeviceBuffer { handle, size };
                self.atomics = Some(buffer);
                buffer
            }
        };

        self.memory
            .copy_to_buffer(buffer.handle, 0, bytemuck::cast_slice(values))?;
        let event = self.events.record(EventKind::Write, queued_ns, wait)?;
        self.counters.atomics_writes += 1;
        Ok((buffer, vec![event]))
    }

    fn launch(
        &mut self,
        code: &InstalledCode,
        frame: &ArgsFrame,
        atomics: Option<&DeviceBuffer>,
        config: &LaunchConfig,
        global_offset: u64,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        if !code.is_valid() || code.epoch != self.epoch {
            return Err(BackendError::InvalidCode {
                id: code.id,
                kernel: code.kernel.clone(),
            });
        }
        let kernel = self
            .kernels
            .get(&code.kernel)
            .cloned()
            .ok_or_else(|| BackendError::compilation(&code.kernel, "kernel is not registered"))?;

        let queued_ns = self.events.now_ns();
        let mut invocation = KernelInvocation::new(
            &mut self.memory,
            frame,
            atomics.map(|a| a.handle),
            code,
            *config,
            global_offset,
        );
        let threads = invocation.threads();
        kernel(&mut invocation)?;

        let event = self.events.record(EventKind::Launch, queued_ns, wait)?;
        self.counters.launches += 1;
        record_launch(&code.kernel, threads, (self.events.now_ns() - queued_ns) / 1000);
        Ok(event)
    }

    fn enqueue_marker(&mut self, wait: &[EventHandle]) -> Result<EventHandle> {
        let (marker, deps) = self.events.marker(wait)?;
        self.counters.markers += 1;
        if self.marker_log.len() == MARKER_LOG_CAPACITY {
            self.marker_log.drain(..MARKER_LOG_CAPACITY / 2);
        }
        self.marker_log.push((marker, deps));
        Ok(marker)
    }

    fn resolve_event(&self, event: EventHandle) -> Result<EventProfile> {
        self.events.profile(event)
    }

    fn wait_events(&mut self, events: &[EventHandle]) -> Result<()> {
        for event in events {
            self.events.drain(*event)?;
        }
        self.counters.waits += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.counters.flushes += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

// ================================================================================================
// Tests
// ================================================================================================
