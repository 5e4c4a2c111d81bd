//! Execution plans
//!
//! An [`ExecutionPlan`] is the user-facing handle on one program: it picks
//! a device from the [`Runtime`], accumulates options and builds its
//! [`Interpreter`] lazily on first use.
//!
//! ```rust
//! use std::sync::Arc;
//! use xpuvm_backends::{AccessMode, CpuBackend, HostObject, KernelInvocation, LaunchConfig, TaskMeta};
//! use xpuvm_bytecode::{BytecodeBuilder, LaunchArg};
//! use xpuvm_core::{ExecutionContext, ExecutionPlan, Runtime};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut runtime = Runtime::new();
//! runtime.register_device(CpuBackend::new().with_kernel(
//!     "double",
//!     Arc::new(|inv: &mut KernelInvocation<'_>| {
//!         let data: Vec<f32> = inv.read(0)?;
//!         inv.write(0, &data.iter().map(|v| v * 2.0).collect::<Vec<_>>())
//!     }),
//! ));
//!
//! let data = HostObject::array(&[1.0f32, 2.0, 3.0, 4.0]).into_ref();
//! let mut builder = ExecutionContext::builder("double");
//! builder.add_object(Arc::clone(&data), AccessMode::ReadWrite);
//! builder.add_task(TaskMeta::new("s0.t0", "double", LaunchConfig::linear(4, 4)));
//!
//! let program = BytecodeBuilder::new()
//!     .context(0)
//!     .begin()
//!     .alloc(0, &[0])
//!     .transfer_h2d_once(0, None, 0, 0)
//!     .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0)])
//!     .transfer_d2h_blocking(0, None, 0, 0)
//!     .end()
//!     .finish();
//!
//! let mut plan = ExecutionPlan::new(&runtime, builder.build(), program).with_warmup();
//! plan.execute()?;
//! assert_eq!(*data.read(), HostObject::array(&[2.0f32, 4.0, 6.0, 8.0]));
//! # Ok(())
//! # }
//! ```

use crate::config::{parse_byte_size, VmConfig};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::grid::GridScheduler;
use crate::interpreter::{ExecutionMode, Interpreter, InterpreterStats};
use crate::profiler::{NoopProfiler, Profiler, ProfilerSnapshot, TimeProfiler};
use crate::runtime::Runtime;
use std::fmt;
use std::sync::Arc;
use xpuvm_backends::EventHandle;
use xpuvm_bytecode::BytecodeProgram;

/// An option applied to a plan, in application order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOption {
    WithWarmup,
    WithDevice(usize),
    WithMemoryLimit(String),
    WithoutMemoryLimit,
    WithProfiler,
    WithoutProfiler,
    WithDependencies(bool),
    WithFlush(bool),
    WithTraceBytecodes,
    WithGridScheduler(GridScheduler),
}

impl fmt::Display for PlanOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanOption::WithWarmup => f.write_str("with_warmup"),
            PlanOption::WithDevice(index) => write!(f, "with_device({})", index),
            PlanOption::WithMemoryLimit(limit) => write!(f, "with_memory_limit({})", limit),
            PlanOption::WithoutMemoryLimit => f.write_str("without_memory_limit"),
            PlanOption::WithProfiler => f.write_str("with_profiler"),
            PlanOption::WithoutProfiler => f.write_str("without_profiler"),
            PlanOption::WithDependencies(enabled) => write!(f, "with_dependencies({})", enabled),
            PlanOption::WithFlush(enabled) => write!(f, "with_flush({})", enabled),
            PlanOption::WithTraceBytecodes => f.write_str("with_trace_bytecodes"),
            PlanOption::WithGridScheduler(scheduler) => write!(f, "with_grid_scheduler({})", scheduler),
        }
    }
}

/// One program bound to a device of a [`Runtime`]
pub struct ExecutionPlan<'rt> {
    runtime: &'rt Runtime,
    context: Arc<ExecutionContext>,
    program: BytecodeProgram,
    options: Vec<PlanOption>,
    config: VmConfig,
    device_index: usize,
    warmup_requested: bool,
    profiler: Arc<dyn Profiler>,
    grid_scheduler: GridScheduler,
    interpreter: Option<Interpreter>,
}

impl fmt::Debug for ExecutionPlan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("context", &self.context.name())
            .field("device", &self.device_index)
            .field("options", &self.options)
            .field("interpreter", &self.interpreter)
            .finish_non_exhaustive()
    }
}

impl<'rt> ExecutionPlan<'rt> {
    /// Plan on the runtime's default device with [`VmConfig::default`]
    pub fn new(runtime: &'rt Runtime, context: Arc<ExecutionContext>, program: BytecodeProgram) -> Self {
        Self::with_config(runtime, context, program, VmConfig::default())
    }

    pub fn with_config(
        runtime: &'rt Runtime,
        context: Arc<ExecutionContext>,
        program: BytecodeProgram,
        config: VmConfig,
    ) -> Self {
        let profiler: Arc<dyn Profiler> = if config.profiler {
            Arc::new(TimeProfiler::new())
        } else {
            Arc::new(NoopProfiler)
        };
        Self {
            device_index: runtime.default_device_index(),
            runtime,
            context,
            program,
            options: Vec::new(),
            config,
            warmup_requested: false,
            profiler,
            grid_scheduler: GridScheduler::default(),
            interpreter: None,
        }
    }

    fn apply(&mut self, option: PlanOption) {
        tracing::debug!(context = %self.context.name(), option = %option, "plan_option");
        self.options.push(option);
        if let Some(interpreter) = self.interpreter.as_mut() {
            interpreter.set_config(self.config.clone());
            interpreter.set_profiler(Arc::clone(&self.profiler));
            interpreter.set_grid_scheduler(self.grid_scheduler.clone());
        }
    }

    // ============================================================================================
    // Options
    // ============================================================================================

    /// Warm up before the first execution
    pub fn with_warmup(mut self) -> Self {
        self.warmup_requested = true;
        self.apply(PlanOption::WithWarmup);
        self
    }

    /// Move the plan to another registered device
    ///
    /// The interpreter is rebuilt on next use; buffers on the old device
    /// are released first.
    pub fn with_device(mut self, index: usize) -> Result<Self> {
        self.runtime.device(index)?;
        if index != self.device_index {
            if let Some(mut interpreter) = self.interpreter.take() {
                interpreter.free_device_memory()?;
            }
            self.device_index = index;
        }
        self.apply(PlanOption::WithDevice(index));
        Ok(self)
    }

    /// Cap device memory, e.g. `"512MB"`
    pub fn with_memory_limit(mut self, limit: &str) -> Result<Self> {
        let bytes = parse_byte_size(limit)?;
        self.config.memory_limit = Some(bytes);
        self.context.memory().set_limit(Some(bytes));
        self.apply(PlanOption::WithMemoryLimit(limit.trim().to_string()));
        Ok(self)
    }

    pub fn without_memory_limit(mut self) -> Self {
        self.config.memory_limit = None;
        self.context.memory().set_limit(None);
        self.apply(PlanOption::WithoutMemoryLimit);
        self
    }

    pub fn with_profiler(mut self) -> Self {
        self.config.profiler = true;
        self.profiler = Arc::new(TimeProfiler::new());
        self.apply(PlanOption::WithProfiler);
        self
    }

    pub fn without_profiler(mut self) -> Self {
        self.config.profiler = false;
        self.profiler = Arc::new(NoopProfiler);
        self.apply(PlanOption::WithoutProfiler);
        self
    }

    pub fn with_dependencies(mut self, enabled: bool) -> Self {
        self.config.use_dependencies = enabled;
        self.apply(PlanOption::WithDependencies(enabled));
        self
    }

    pub fn with_flush(mut self, enabled: bool) -> Self {
        self.config.flush_on_end = enabled;
        self.apply(PlanOption::WithFlush(enabled));
        self
    }

    pub fn with_trace_bytecodes(mut self) -> Self {
        self.config.trace_bytecodes = true;
        self.apply(PlanOption::WithTraceBytecodes);
        self
    }

    /// Run tasks with the scheduler's worker grids
    pub fn with_grid_scheduler(mut self, scheduler: GridScheduler) -> Self {
        self.grid_scheduler = scheduler.clone();
        self.apply(PlanOption::WithGridScheduler(scheduler));
        self
    }

    // ============================================================================================
    // Operations
    // ============================================================================================

    fn interpreter(&mut self) -> Result<&mut Interpreter> {
        let interpreter = match self.interpreter.take() {
            Some(interpreter) => interpreter,
            None => {
                let device = self.runtime.device(self.device_index)?;
                let mut interpreter = Interpreter::new(
                    Arc::clone(&self.context),
                    self.program.clone(),
                    device,
                    self.config.clone(),
                )?;
                interpreter.set_profiler(Arc::clone(&self.profiler));
                interpreter.set_grid_scheduler(self.grid_scheduler.clone());
                interpreter
            }
        };
        Ok(self.interpreter.insert(interpreter))
    }

    /// Run the program once, warming up first when requested
    pub fn execute(&mut self) -> Result<Option<EventHandle>> {
        let warmup = self.warmup_requested;
        let interpreter = self.interpreter()?;
        if warmup && !interpreter.finished_warmup() {
            interpreter.warmup()?;
        }
        interpreter.execute(ExecutionMode::Run)
    }

    /// Compile every task without running
    pub fn warmup(&mut self) -> Result<()> {
        self.interpreter()?.warmup()
    }

    /// Reset the plan's device, dropping its buffers and binaries
    ///
    /// A plan that already finished warmup must warm up again before the
    /// next execution.
    pub fn reset_device(&mut self) -> Result<()> {
        self.runtime.device(self.device_index)?.write().reset()?;
        if let Some(interpreter) = self.interpreter.as_mut() {
            let released = interpreter.forget_device_buffers();
            tracing::debug!(context = %self.context.name(), released, "plan_device_reset");
        }
        Ok(())
    }

    /// Release every device buffer, returning the bytes freed
    pub fn free_device_memory(&mut self) -> Result<u64> {
        match self.interpreter.as_mut() {
            Some(interpreter) => interpreter.free_device_memory(),
            None => Ok(0),
        }
    }

    pub fn current_device_memory_usage(&self) -> u64 {
        self.context.memory().usage()
    }

    /// Applied options, in order
    pub fn options(&self) -> &[PlanOption] {
        &self.options
    }

    /// Applied options as one line, e.g. `with_warmup -> with_profiler`
    pub fn trace(&self) -> String {
        let options: Vec<String> = self.options.iter().map(ToString::to_string).collect();
        format!("ExecutionPlan[{}] {}", self.context.name(), options.join(" -> "))
    }

    /// Profiler values when profiling is enabled
    pub fn profile(&self) -> Option<ProfilerSnapshot> {
        self.profiler.is_enabled().then(|| self.profiler.snapshot())
    }

    pub fn stats(&self) -> Option<&InterpreterStats> {
        self.interpreter.as_ref().map(Interpreter::stats)
    }

    pub fn device_index(&self) -> usize {
        self.device_index
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }
}
