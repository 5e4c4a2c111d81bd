//! Bytecode interpreter
//!
//! An [`Interpreter`] replays one program against one device. Construction
//! consumes the header and the CONTEXT declarations and records a mark at
//! BEGIN; every [`execute`](Interpreter::execute) decodes from that mark to
//! END and rewinds.
//!
//! # Execution Flow
//!
//! ```text
//! ┌────────┬──────────┬────────────────────────────────────────────┬─────┐
//! │ header │ CONTEXT* │ BEGIN  ALLOC  TRANSFER  LAUNCH  ...  END     │ ... │
//! └────────┴──────────┴──▲─────────────────────────────────────────┴─────┘
//!                        │ mark                                 │
//!                        └──────────── rewind after each pass ──┘
//! ```
//!
//! # Modes
//!
//! - **Warmup**: decodes everything, compiles every LAUNCH target, touches
//!   no device memory and enqueues nothing.
//! - **Run**: allocates, transfers, launches and synchronizes.
//!
//! # Events
//!
//! Each consumer (transfer, launch, barrier) waits on the events collected
//! in its event list and then resets the list. ADD_DEPENDENCY appends the
//! event of the most recent producer ("last event") to a list.

use crate::buffer_state::{BufferState, BufferStateTable};
use crate::config::VmConfig;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::events::EventTracker;
use crate::grid::GridScheduler;
use crate::kernel_cache::KernelCache;
use crate::profiler::{MetricKind, NoopProfiler, Profiler, TimeProfiler, TimerKind};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use xpuvm_backends::{
    AllocationRequest, ArgsFrame, DeviceBuffer, DeviceInfo, DeviceRef, EventHandle, HostObject, KernelArg,
    ScalarValue, TransferRange,
};
use xpuvm_bytecode::{disassemble, BytecodeProgram, Instruction, Launch, LaunchArg, Transfer};
use xpuvm_tracing::{perf_event, perf_span, timed_block};
use xpuvm_tracing::performance::record_allocation;

/// Pass semantics of [`Interpreter::execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExecutionMode {
    Warmup,
    Run,
}

/// Counters kept across passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterpreterStats {
    /// Completed run passes
    pub invocations: u64,
    /// Completed warmup (or virtual-device) passes
    pub warmups: u64,
    /// Wall time of all run passes
    pub total_time: Duration,
    pub last_time: Duration,
    pub compilations: u64,
    pub recompilations: u64,
}

/// Replays a bytecode program on one device
pub struct Interpreter {
    context: Arc<ExecutionContext>,
    program: BytecodeProgram,
    device: DeviceRef,
    device_info: DeviceInfo,
    device_epoch: u64,
    config: VmConfig,
    events: EventTracker,
    states: BufferStateTable,
    cache: KernelCache,
    grid_scheduler: GridScheduler,
    frames: HashMap<u32, ArgsFrame>,
    profiler: Arc<dyn Profiler>,
    finished_warmup: bool,
    stats: InterpreterStats,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("context", &self.context.name())
            .field("device", &self.device_info)
            .field("position", &self.program.position())
            .field("finished_warmup", &self.finished_warmup)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Bind a program to a device
    ///
    /// Reads the header, sizes the event lists, loads the device once per
    /// CONTEXT declaration and marks BEGIN as the replay point.
    ///
    /// # Errors
    ///
    /// - Malformed program when the header is truncated, a CONTEXT names a
    ///   different device, or any other opcode appears before BEGIN
    /// - Backend errors from loading the device
    pub fn new(
        context: Arc<ExecutionContext>,
        mut program: BytecodeProgram,
        device: DeviceRef,
        config: VmConfig,
    ) -> Result<Self> {
        let start = Instant::now();
        let header = program.read_header()?;
        let (device_info, device_epoch) = {
            let device = device.read();
            (device.device_info(), device.reset_epoch())
        };

        loop {
            let offset = program.position();
            match Instruction::decode(&mut program)? {
                Instruction::Context { device: index } => {
                    if index != device_info.index {
                        return Err(Error::malformed(format!(
                            "CONTEXT at offset {} declares device {} but the interpreter is bound to {}",
                            offset, index, device_info
                        )));
                    }
                    device.write().ensure_loaded()?;
                }
                Instruction::Begin => break,
                other => {
                    return Err(Error::malformed(format!(
                        "{} at offset {} before BEGIN",
                        other.opcode(),
                        offset
                    )))
                }
            }
        }
        program.mark();

        if let Some(limit) = config.memory_limit {
            context.memory().set_limit(Some(limit));
        }
        let profiler: Arc<dyn Profiler> = if config.profiler {
            Arc::new(TimeProfiler::new())
        } else {
            Arc::new(NoopProfiler)
        };

        let interpreter = Self {
            events: EventTracker::new(header.event_lists, config.max_events),
            states: BufferStateTable::from_context(&context),
            cache: KernelCache::new(context.tasks().len()),
            grid_scheduler: GridScheduler::default(),
            frames: HashMap::new(),
            context,
            program,
            device,
            device_info,
            device_epoch,
            config,
            profiler,
            finished_warmup: false,
            stats: InterpreterStats::default(),
        };

        tracing::info!(
            context = %interpreter.context.name(),
            device = %interpreter.device_info,
            event_lists = header.event_lists,
            duration_us = start.elapsed().as_micros() as u64,
            "interpreter_created"
        );
        Ok(interpreter)
    }

    // ============================================================================================
    // Accessors
    // ============================================================================================

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Replace the configuration; event lists are resized when the
    /// capacity changes
    pub fn set_config(&mut self, config: VmConfig) {
        if config.max_events != self.config.max_events {
            self.events = EventTracker::new(self.events.len(), config.max_events);
        }
        if config.memory_limit.is_some() {
            self.context.memory().set_limit(config.memory_limit);
        }
        self.config = config;
    }

    pub fn stats(&self) -> &InterpreterStats {
        &self.stats
    }

    pub fn profiler(&self) -> &Arc<dyn Profiler> {
        &self.profiler
    }

    pub fn set_profiler(&mut self, profiler: Arc<dyn Profiler>) {
        self.profiler = profiler;
    }

    pub fn grid_scheduler(&self) -> &GridScheduler {
        &self.grid_scheduler
    }

    /// Run tasks with the scheduler's grids
    ///
    /// Compiled tasks whose grid changes are rebuilt at their next LAUNCH.
    pub fn set_grid_scheduler(&mut self, scheduler: GridScheduler) {
        for (index, task) in self.context.tasks().iter().enumerate() {
            if self.grid_scheduler.get(&task.id) != scheduler.get(&task.id) {
                self.cache.force_recompile(index);
                tracing::debug!(task = %task.id, "grid_changed");
            }
        }
        self.grid_scheduler = scheduler;
    }

    pub fn finished_warmup(&self) -> bool {
        self.finished_warmup
    }

    pub fn buffer_state(&self, object: u32) -> Result<&BufferState> {
        self.states.get(object)
    }

    pub fn kernel_cache(&self) -> &KernelCache {
        &self.cache
    }

    /// Drop every cached binary; the next LAUNCH of each task compiles again
    pub fn clear_installed_code(&mut self) {
        self.cache.clear_code();
    }

    /// One line per instruction from BEGIN through END
    pub fn listing(&self) -> Result<Vec<String>> {
        Ok(disassemble(&self.program)?
            .into_iter()
            .map(|(offset, instruction)| format!("{:>6}: {}", offset, instruction))
            .collect())
    }

    // ============================================================================================
    // Passes
    // ============================================================================================

    /// Compile every task without touching device memory
    ///
    /// Re-arms the interpreter after a device reset.
    #[tracing::instrument(skip(self), fields(context = %self.context.name()))]
    pub fn warmup(&mut self) -> Result<()> {
        self.finished_warmup = false;
        self.execute(ExecutionMode::Warmup)?;
        self.finished_warmup = true;
        Ok(())
    }

    /// Run one pass from BEGIN to END
    ///
    /// Returns the END marker event in run mode when dependency tracking is
    /// on. The cursor is rewound to BEGIN whether or not the pass succeeds.
    #[tracing::instrument(skip(self), fields(context = %self.context.name()))]
    pub fn execute(&mut self, mode: ExecutionMode) -> Result<Option<EventHandle>> {
        let warmup = mode == ExecutionMode::Warmup || self.config.virtual_device;

        {
            let memory = self.context.memory();
            if memory.exceeded() {
                return Err(Error::OutOfMemory {
                    usage: memory.usage(),
                    requested: 0,
                    limit: memory.limit().unwrap_or(u64::MAX),
                });
            }
        }

        let _span = perf_span!("interpreter_pass", warmup = warmup);
        self.events.reset_all();
        let start = Instant::now();

        let result = self.sync_device_epoch().and_then(|()| self.run_pass(warmup));
        self.program.reset();

        let elapsed = start.elapsed();
        match &result {
            Ok(_) => {
                if warmup {
                    self.stats.warmups += 1;
                } else {
                    self.stats.invocations += 1;
                    self.stats.total_time += elapsed;
                    self.stats.last_time = elapsed;
                }
                self.stats.recompilations = self.cache.recompilations();
                tracing::debug!(
                    warmup,
                    duration_us = elapsed.as_micros() as u64,
                    usage = self.context.memory().usage(),
                    "pass_complete"
                );
            }
            Err(err) => tracing::error!(error = %err, kind = ?err.kind(), "pass_failed"),
        }
        result
    }

    fn run_pass(&mut self, warmup: bool) -> Result<Option<EventHandle>> {
        let mut last_event: Option<EventHandle> = None;

        while self.program.has_remaining() {
            let offset = self.program.position();
            let instruction = Instruction::decode(&mut self.program)?;
            let opcode = instruction.opcode();
            if self.config.trace_bytecodes {
                tracing::debug!(target: "xpuvm::bytecode", offset, warmup, "{}", instruction);
            }

            match instruction {
                Instruction::Alloc { batch_size, objects } => {
                    if warmup {
                        continue;
                    }
                    self.alloc(batch_size, &objects)?;
                    last_event = None;
                }
                Instruction::Dealloc { object } => {
                    if warmup {
                        continue;
                    }
                    self.dealloc(object)?;
                    last_event = None;
                }
                Instruction::TransferH2dOnce(transfer) => {
                    if !warmup {
                        self.transfer_in(&transfer, true)?;
                    }
                }
                Instruction::TransferH2dAlways(transfer) => {
                    if !warmup {
                        self.transfer_in(&transfer, false)?;
                    }
                }
                Instruction::TransferD2hAlways(transfer) => {
                    if !warmup {
                        last_event = self.transfer_out(&transfer, false)?;
                    }
                }
                Instruction::TransferD2hAlwaysBlocking(transfer) => {
                    if !warmup {
                        self.transfer_out(&transfer, true)?;
                    }
                }
                Instruction::Launch(launch) => {
                    self.compile(&launch)?;
                    if !warmup {
                        last_event = Some(self.dispatch(&launch)?);
                    }
                }
                Instruction::AddDependency { event_list } => {
                    if !warmup {
                        self.add_dependency(last_event, event_list)?;
                    }
                }
                Instruction::OnDevice { object } => {
                    if warmup {
                        continue;
                    }
                    self.context.object(object)?;
                    tracing::trace!(object, device = %self.device_info, "on_device");
                    last_event = None;
                }
                Instruction::Barrier { event_list } => {
                    if !warmup {
                        last_event = Some(self.barrier(event_list)?);
                    }
                }
                Instruction::End => {
                    return if warmup { Ok(None) } else { self.end() };
                }
                Instruction::Context { .. } | Instruction::Begin => {
                    return Err(Error::malformed(format!("{} at offset {} after BEGIN", opcode, offset)));
                }
            }
        }

        if warmup {
            Ok(None)
        } else {
            self.end()
        }
    }

    /// A reset before warmup drops device state; a reset after it is fatal
    fn sync_device_epoch(&mut self) -> Result<()> {
        let epoch = self.device.read().reset_epoch();
        if epoch == self.device_epoch {
            return Ok(());
        }
        if self.finished_warmup {
            return Err(Error::DeviceReset {
                device: self.device_info.to_string(),
            });
        }

        tracing::warn!(device = %self.device_info, "device was reset, dropping binaries and buffers");
        self.forget_device_buffers();
        self.cache.clear_code();
        self.device_epoch = epoch;
        Ok(())
    }

    /// Forget buffers the device no longer holds, returning their bytes
    pub(crate) fn forget_device_buffers(&mut self) -> u64 {
        let bytes = self.states.invalidate_all();
        self.context.memory().sub(bytes);
        self.frames.clear();
        bytes
    }

    // ============================================================================================
    // Buffers
    // ============================================================================================

    fn alloc(&mut self, batch_size: u64, objects: &[u32]) -> Result<()> {
        let context = Arc::clone(&self.context);
        let mut requests: Vec<AllocationRequest> = Vec::with_capacity(objects.len());

        for &index in objects {
            let entry = context.object(index)?;
            if self.states.get(index)?.is_valid() || requests.iter().any(|r| r.object == index as usize) {
                continue;
            }
            let object = entry.object.read();
            if object.is_kernel_context() {
                continue;
            }
            let size = if batch_size > 0 { batch_size } else { object.byte_size() };
            requests.push(AllocationRequest {
                object: index as usize,
                size,
                access: entry.access,
            });
        }

        if requests.is_empty() {
            return Ok(());
        }

        let required: u64 = requests.iter().map(|r| r.size).sum();
        context.memory().check(required)?;

        let buffers = self.device.write().allocate(&requests)?;
        let total: u64 = buffers.iter().map(|b| b.size).sum();
        let usage = context.memory().add(total);

        for (request, buffer) in requests.iter().zip(buffers) {
            self.states.get_mut(request.object as u32)?.set_buffer(buffer);
            if self.profiler.is_enabled() {
                self.profiler
                    .add_metric(MetricKind::AllocationBytes, &format!("obj[{}]", request.object), buffer.size);
            }
        }
        record_allocation(requests.len(), total, usage);
        Ok(())
    }

    fn dealloc(&mut self, index: u32) -> Result<u64> {
        let context = Arc::clone(&self.context);
        let entry = context.object(index)?;

        let Some(buffer) = self.states.get(index)?.buffer() else {
            if !entry.object.read().is_kernel_context() {
                tracing::warn!(object = index, "DEALLOC of an object without a device buffer");
            }
            return Ok(0);
        };

        let freed = self.device.write().deallocate(buffer)?;
        self.states.get_mut(index)?.invalidate();
        let usage = context.memory().sub(freed);
        tracing::debug!(object = index, freed, usage, "buffer_released");
        Ok(freed)
    }

    /// Release every device buffer of this program
    pub fn free_device_memory(&mut self) -> Result<u64> {
        let mut freed = 0;
        for (index, _) in self.states.valid_buffers() {
            freed += self.dealloc(index)?;
        }
        Ok(freed)
    }

    // ============================================================================================
    // Transfers
    // ============================================================================================

    fn bound_buffer(&self, index: u32, what: &str) -> Result<DeviceBuffer> {
        self.states
            .get(index)?
            .buffer()
            .ok_or_else(|| Error::malformed(format!("{} of obj[{}] before ALLOC", what, index)))
    }

    fn transfer_in(&mut self, transfer: &Transfer, once: bool) -> Result<()> {
        let context = Arc::clone(&self.context);
        let entry = context.object(transfer.object)?;
        let object = entry.object.read();
        if object.is_kernel_context() {
            return Ok(());
        }

        let buffer = self.bound_buffer(transfer.object, "host to device transfer")?;
        let full_copy = transfer.batch_size == 0;
        if once && full_copy && self.states.get(transfer.object)?.has_content() {
            return self.events.reset(transfer.event_list);
        }

        let range = transfer_range(transfer, object.byte_size())?;
        let wait = self
            .events
            .wait_list(transfer.event_list, self.config.use_dependencies)?;
        let events = self.device.write().stream_in(&object, &buffer, range, &wait)?;
        drop(object);

        if full_copy {
            self.states.get_mut(transfer.object)?.set_content(true);
        }
        self.events.reset(transfer.event_list)?;

        if self.profiler.is_enabled() {
            self.profile_transfer(&events, TimerKind::CopyInTime, MetricKind::CopyInBytes, transfer.object, range.size)?;
        }
        Ok(())
    }

    fn transfer_out(&mut self, transfer: &Transfer, blocking: bool) -> Result<Option<EventHandle>> {
        let context = Arc::clone(&self.context);
        let entry = context.object(transfer.object)?;
        let mut object = entry.object.write();
        if object.is_kernel_context() {
            return Ok(None);
        }

        let buffer = self.bound_buffer(transfer.object, "device to host transfer")?;
        let range = transfer_range(transfer, object.byte_size())?;
        let wait = self
            .events
            .wait_list(transfer.event_list, self.config.use_dependencies)?;

        let event = {
            let mut device = self.device.write();
            if blocking {
                device.stream_out_blocking(&mut object, &buffer, range, &wait)?
            } else {
                device.stream_out(&mut object, &buffer, range, &wait)?
            }
        };
        drop(object);
        self.events.reset(transfer.event_list)?;

        if self.profiler.is_enabled() {
            self.profile_transfer(&[event], TimerKind::CopyOutTime, MetricKind::CopyOutBytes, transfer.object, range.size)?;
        }
        Ok(Some(event))
    }

    fn profile_transfer(
        &self,
        events: &[EventHandle],
        timer: TimerKind,
        metric: MetricKind,
        object: u32,
        bytes: u64,
    ) -> Result<()> {
        let mut device = self.device.write();
        device.wait_events(events)?;
        for event in events {
            let profile = device.resolve_event(*event)?;
            self.profiler.add_timer(timer, profile.elapsed_ns());
            self.profiler
                .add_timer(TimerKind::DispatchDataTransfersTime, profile.dispatch_ns());
        }
        self.profiler.add_metric(metric, &format!("obj[{}]", object), bytes);
        Ok(())
    }

    // ============================================================================================
    // Kernels
    // ============================================================================================

    /// Resolve or compile the binary a LAUNCH needs
    fn compile(&mut self, launch: &Launch) -> Result<()> {
        self.sync_device_epoch()?;

        let context = Arc::clone(&self.context);
        let task = context.task(launch.task)?;
        let task_index = launch.task as usize;

        let index_in_write = self.device.read().loop_index_in_write(task);
        if self.cache.prepare(task_index, launch.batch_threads, index_in_write) {
            tracing::debug!(task = %task.id, batch_threads = launch.batch_threads, "recompilation_triggered");
        }
        if !self.cache.needs_compile(task_index) {
            return Ok(());
        }

        let request = self
            .cache
            .request(task_index, task, self.grid_scheduler.get(&task.id).copied());
        let (installed, elapsed) = timed_block!("install_code", {
            self.device.write().install_code(&request)
        });
        let code = installed.map_err(|err| task_error(&task.id, err.into()))?;

        self.profiler
            .add_timer(TimerKind::CompileTime, elapsed.as_nanos() as u64);
        self.cache.install(task_index, code, index_in_write);
        self.stats.compilations += 1;
        Ok(())
    }

    /// Bind arguments and enqueue the kernel
    fn dispatch(&mut self, launch: &Launch) -> Result<EventHandle> {
        let context = Arc::clone(&self.context);
        let task = context.task(launch.task)?;
        let code = self
            .cache
            .code(launch.task as usize)
            .cloned()
            .ok_or_else(|| Error::bailout(&task.id, "code generator failed: no installed code"))?;

        let mut frame = self
            .frames
            .remove(&launch.call_wrapper)
            .unwrap_or_else(|| ArgsFrame::with_capacity(launch.args.len()));
        frame.reset();

        let mut atomics: Vec<i32> = Vec::new();
        for arg in &launch.args {
            match *arg {
                LaunchArg::Constant(index) => frame.push(KernelArg::Constant(context.constant(index)?)),
                LaunchArg::Reference(index) => {
                    let entry = context.object(index)?;
                    let object = entry.object.read();
                    if object.is_kernel_context() {
                        frame.push(KernelArg::KernelContext);
                    } else if entry.atomic {
                        // the kernel sees the base index of this object's slots
                        let base = atomics.len() as i32;
                        atomics.extend(atomic_values(&object, index)?);
                        frame.push(KernelArg::Constant(ScalarValue::I32(base)));
                    } else {
                        frame.push(KernelArg::Buffer(self.bound_buffer(index, "LAUNCH argument")?));
                    }
                }
            }
        }

        let mut wait = self
            .events
            .wait_list(launch.event_list, self.config.use_dependencies)?;
        let grid = self.grid_scheduler.resolve(&task.id, task.grid);
        let grid = if launch.batch_threads > 0 {
            grid.with_threads(launch.batch_threads)
        } else {
            grid
        };

        let start = Instant::now();
        let launched = {
            let mut device = self.device.write();
            let atomics_buffer = if atomics.is_empty() {
                None
            } else {
                let (buffer, written) = device.write_atomics(&atomics, &[])?;
                if self.config.use_dependencies {
                    wait.extend(written);
                }
                Some(buffer)
            };
            device.launch(&code, &frame, atomics_buffer.as_ref(), &grid, launch.offset, &wait)
        };
        self.frames.insert(launch.call_wrapper, frame);
        let event = launched.map_err(|err| task_error(&task.id, err.into()))?;

        self.events.reset(launch.event_list)?;

        if self.profiler.is_enabled() {
            self.profiler
                .add_timer(TimerKind::DispatchTime, start.elapsed().as_nanos() as u64);
            let mut device = self.device.write();
            device.wait_events(&[event])?;
            let profile = device.resolve_event(event)?;
            self.profiler
                .add_metric(MetricKind::KernelTime, &task.id, profile.elapsed_ns());
        }
        Ok(event)
    }

    // ============================================================================================
    // Synchronization
    // ============================================================================================

    fn add_dependency(&mut self, last_event: Option<EventHandle>, list: Option<u32>) -> Result<()> {
        if !self.config.use_dependencies {
            return Ok(());
        }
        match (last_event, list) {
            (Some(event), Some(list)) => self.events.push(list, event),
            _ => Ok(()),
        }
    }

    fn barrier(&mut self, list: Option<u32>) -> Result<EventHandle> {
        let wait = self.events.wait_list(list, self.config.use_dependencies)?;
        let marker = self.device.write().enqueue_marker(&wait)?;
        perf_event!("barrier", waits = wait.len(), marker = marker.id());
        self.events.reset(list)?;
        Ok(marker)
    }

    fn end(&mut self) -> Result<Option<EventHandle>> {
        let mut device = self.device.write();
        let marker = if self.config.use_dependencies {
            Some(device.enqueue_marker(&[])?)
        } else {
            None
        };
        if self.config.flush_on_end {
            device.flush()?;
        }
        Ok(marker)
    }
}

/// Host range a transfer covers, clamped to the object
fn transfer_range(transfer: &Transfer, object_size: u64) -> Result<TransferRange> {
    if transfer.batch_size == 0 {
        return Ok(TransferRange::full(object_size));
    }
    if transfer.offset > object_size {
        return Err(Error::malformed(format!(
            "transfer offset {} past the end of obj[{}] ({} bytes)",
            transfer.offset, transfer.object, object_size
        )));
    }
    let end = transfer
        .offset
        .saturating_add(transfer.batch_size)
        .min(object_size);
    Ok(TransferRange::new(transfer.offset, end - transfer.offset))
}

/// Attach the task id to compilation failures; other backend errors keep
/// their kind
fn task_error(task: &str, err: Error) -> Error {
    match err {
        Error::Bailout { reason, .. } => Error::bailout(task, reason),
        other => other,
    }
}

fn atomic_values(object: &HostObject, index: u32) -> Result<Vec<i32>> {
    match object {
        HostObject::Array(array) => array.to_vec::<i32>().map_err(|_| {
            Error::malformed(format!("atomic obj[{}] must hold i32 values, found {}", index, array.element()))
        }),
        HostObject::Scalar(ScalarValue::I32(value)) => Ok(vec![*value]),
        other => Err(Error::malformed(format!(
            "atomic obj[{}] must hold i32 values, found {}",
            index, other
        ))),
    }
}

// ================================================================================================
// Tests
// ================================================================================================
