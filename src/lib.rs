//! # xpuvm
//!
//! Device-execution bytecode VM for accelerators.
//!
//! This facade re-exports the workspace crates:
//!
//! - [`bytecode`]: opcodes, decoder, assembler and batch planning
//! - [`backends`]: host objects, the `Backend` trait and the CPU backend
//! - [`telemetry`]: tracing subscriber setup and performance events
//! - the interpreter, execution plans and runtime at the crate root
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use xpuvm::prelude::*;
//!
//! # fn main() -> xpuvm::Result<()> {
//! let mut runtime = Runtime::new();
//! runtime.register_device(CpuBackend::new().with_kernel(
//!     "inc",
//!     Arc::new(|inv: &mut KernelInvocation<'_>| {
//!         let data: Vec<i32> = inv.read(0)?;
//!         inv.write(0, &data.iter().map(|v| v + 1).collect::<Vec<_>>())
//!     }),
//! ));
//!
//! let values = HostObject::array(&[1i32, 2, 3]).into_ref();
//! let mut builder = ExecutionContext::builder("inc");
//! builder.add_object(Arc::clone(&values), AccessMode::ReadWrite);
//! builder.add_task(TaskMeta::new("s0.t0", "inc", LaunchConfig::linear(3, 3)));
//!
//! let program = BytecodeBuilder::new()
//!     .context(0)
//!     .begin()
//!     .alloc(0, &[0])
//!     .transfer_h2d_always(0, None, 0, 0)
//!     .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0)])
//!     .transfer_d2h_blocking(0, None, 0, 0)
//!     .end()
//!     .finish();
//!
//! let mut plan = ExecutionPlan::new(&runtime, builder.build(), program);
//! plan.execute()?;
//! plan.execute()?;
//! assert_eq!(*values.read(), HostObject::array(&[3i32, 4, 5]));
//! # Ok(())
//! # }
//! ```

pub use xpuvm_backends as backends;
pub use xpuvm_bytecode as bytecode;
pub use xpuvm_tracing as telemetry;

pub use xpuvm_core::*;

/// Common imports for building and running programs
pub mod prelude {
    pub use xpuvm_backends::{
        AccessMode, Backend, CpuBackend, DeviceRef, HostObject, KernelFn, KernelInvocation, LaunchConfig,
        ScalarValue, TaskMeta,
    };
    pub use xpuvm_bytecode::{BatchPlan, BytecodeBuilder, BytecodeProgram, LaunchArg};
    pub use xpuvm_core::{
        Error, ErrorKind, ExecutionContext, ExecutionMode, ExecutionPlan, GridScheduler, Interpreter, Result, Runtime,
        VmConfig,
    };
}
