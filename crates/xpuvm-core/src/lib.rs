//! # xpuvm-core
//!
//! Bytecode interpreter that drives accelerator backends.
//!
//! A program is a compact bytecode stream (built with
//! [`xpuvm_bytecode::BytecodeBuilder`]) whose operands index into an
//! [`ExecutionContext`]: host objects, constants and tasks. The
//! [`Interpreter`] replays it against one device, managing device buffers,
//! transfers, kernel compilation and event dependencies.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │   ExecutionPlan  (options, lazy interpreter, profiling)   │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//! ┌────────────────────────────▼─────────────────────────────┐
//! │                        Interpreter                        │
//! │  BufferStateTable   KernelCache   EventTracker   Profiler │
//! │  GridScheduler                                            │
//! └──────────┬─────────────────────────────────┬─────────────┘
//!            │ Arc<ExecutionContext>           │ DeviceRef
//!            ▼                                 ▼
//!   objects / constants / tasks        dyn Backend (CPU, ...)
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result`]; [`Error::kind`] classifies failures
//! and [`Error::is_recoverable_on_other_device`] tells whether retrying on
//! another device can help.

pub mod buffer_state;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod grid;
pub mod interpreter;
pub mod kernel_cache;
pub mod plan;
pub mod profiler;
pub mod runtime;

pub use buffer_state::{BufferState, BufferStateTable};
pub use config::{parse_byte_size, VmConfig, DEFAULT_MAX_EVENTS};
pub use context::{ExecutionContext, ExecutionContextBuilder, MemoryTracker, ObjectEntry};
pub use error::{Error, ErrorKind, Result};
pub use events::{EventList, EventTracker};
pub use grid::GridScheduler;
pub use interpreter::{ExecutionMode, Interpreter, InterpreterStats};
pub use kernel_cache::{CacheSlot, KernelCache};
pub use plan::{ExecutionPlan, PlanOption};
pub use profiler::{MetricKind, NoopProfiler, Profiler, ProfilerSnapshot, TimeProfiler, TimerKind};
pub use runtime::Runtime;
