//! Shared kernels and helpers

use std::sync::Arc;
use xpuvm::backends::{BackendCounters, CompileRecord};
use xpuvm::prelude::*;

/// `out[i] = in[i] + global_offset + i` over the launch's threads
pub fn add_index() -> KernelFn {
    Arc::new(|inv: &mut KernelInvocation<'_>| {
        let threads = inv.threads() as usize;
        let offset = inv.global_offset as i32;
        let mut data: Vec<i32> = inv.read(0)?;
        for (i, value) in data.iter_mut().take(threads).enumerate() {
            *value += offset + i as i32;
        }
        inv.write(0, &data)
    })
}

/// `b[i] = a[i] * 2`
pub fn double_into() -> KernelFn {
    Arc::new(|inv: &mut KernelInvocation<'_>| {
        let a: Vec<f32> = inv.read(0)?;
        inv.write(1, &a.iter().map(|v| v * 2.0).collect::<Vec<_>>())
    })
}

pub fn noop() -> KernelFn {
    Arc::new(|_: &mut KernelInvocation<'_>| Ok(()))
}

pub fn cpu() -> CpuBackend {
    xpuvm::telemetry::init_test_tracing();
    CpuBackend::new()
        .with_kernel("add_index", add_index())
        .with_kernel("double_into", double_into())
        .with_kernel("noop", noop())
}

pub fn counters(device: &DeviceRef) -> BackendCounters {
    let guard = device.read();
    guard
        .as_any()
        .downcast_ref::<CpuBackend>()
        .map(CpuBackend::counters)
        .unwrap_or_default()
}

pub fn compile_log(device: &DeviceRef) -> Vec<CompileRecord> {
    let guard = device.read();
    guard
        .as_any()
        .downcast_ref::<CpuBackend>()
        .map(|cpu| cpu.compile_log().to_vec())
        .unwrap_or_default()
}

pub fn read_i32(context: &ExecutionContext, object: u32) -> Vec<i32> {
    context
        .object(object)
        .unwrap()
        .object
        .read()
        .as_array()
        .unwrap()
        .to_vec::<i32>()
        .unwrap()
}
