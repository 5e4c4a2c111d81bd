//! Device backends for the xpuvm interpreter
//!
//! This crate provides:
//! - **Host objects**: the logical objects programs move between host and device
//! - **Backend Trait**: the device contract the interpreter drives
//! - **CPU Backend**: host-memory reference implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Bytecode Interpreter                    │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ allocate / stream_in / launch / enqueue_marker
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Backend trait                        │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         ▼             ▼             ▼
//!   ┌─────────┐  ┌─────────┐  ┌─────────┐
//!   │   CPU   │  │   GPU   │  │  FPGA   │
//!   │ Backend │  │ drivers │  │ drivers │
//!   └─────────┘  └─────────┘  └─────────┘
//! ```
//!
//! Only the CPU backend ships here; driver-backed devices implement
//! [`Backend`] out of tree.

pub mod backend;
pub mod backends;
pub mod error;
pub mod object;

pub use backend::{
    AccessMode, AllocationRequest, ArgsFrame, Backend, BlockDim, BufferHandle, CompileRequest, DeviceBuffer,
    DeviceInfo, DeviceRef, EventHandle, EventProfile, EventStatus, GridDim, InstalledCode, KernelArg, LaunchConfig,
    TaskMeta, TransferRange,
};
pub use backends::{BackendCounters, CompileRecord, CpuBackend, KernelFn, KernelInvocation, MARKER_LOG_CAPACITY};
pub use error::{BackendError, Result};
pub use object::{Element, ElementType, HostArray, HostObject, ObjectRef, ScalarValue};

use parking_lot::RwLock;
use std::sync::Arc;

/// Box a backend into a shareable [`DeviceRef`]
pub fn device_ref<B: Backend + Send + Sync + 'static>(backend: B) -> DeviceRef {
    Arc::new(RwLock::new(Box::new(backend)))
}
