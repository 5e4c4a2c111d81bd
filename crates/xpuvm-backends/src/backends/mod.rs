//! Backend implementations
//!
//! This module contains:
//! - `cpu` - host-memory reference backend, used as the virtual device

pub mod cpu;

pub use cpu::{BackendCounters, CompileRecord, CpuBackend, KernelFn, KernelInvocation, MARKER_LOG_CAPACITY};
