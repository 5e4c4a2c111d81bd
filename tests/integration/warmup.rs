//! Warmup passes and the virtual device

use crate::common::{compile_log, counters, cpu, read_i32};
use std::sync::Arc;
use xpuvm::backends::device_ref;
use xpuvm::prelude::*;

fn context() -> Arc<ExecutionContext> {
    let mut builder = ExecutionContext::builder("warm");
    builder.add_object(HostObject::array(&[1i32; 16]).into_ref(), AccessMode::ReadWrite);
    builder.add_object(HostObject::array(&[0f32; 16]).into_ref(), AccessMode::ReadOnly);
    builder.add_object(HostObject::array(&[0f32; 16]).into_ref(), AccessMode::WriteOnly);
    builder.add_task(TaskMeta::new("s0.t0", "add_index", LaunchConfig::linear(16, 16)));
    builder.add_task(TaskMeta::new("s0.t1", "double_into", LaunchConfig::linear(16, 16)));
    builder.build()
}

fn program() -> BytecodeProgram {
    BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0, 1, 2])
        .transfer_h2d_always(0, None, 0, 0)
        .transfer_h2d_once(1, None, 0, 0)
        .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0)])
        .launch(1, 1, None, 0, 0, &[LaunchArg::Reference(1), LaunchArg::Reference(2)])
        .transfer_d2h_blocking(0, None, 0, 0)
        .dealloc(0)
        .dealloc(1)
        .dealloc(2)
        .end()
        .finish()
}

#[test]
fn test_warmup_compiles_without_device_work() -> Result<()> {
    let device = device_ref(cpu());
    let context = context();
    let mut interpreter = Interpreter::new(context.clone(), program(), device.clone(), VmConfig::default())?;

    interpreter.warmup()?;
    assert!(interpreter.finished_warmup());
    assert_eq!(interpreter.stats().warmups, 1);
    assert_eq!(interpreter.stats().compilations, 2);
    assert_eq!(interpreter.kernel_cache().compiled_tasks(), 2);

    let after = counters(&device);
    assert_eq!(after.device_work(), 0);
    assert_eq!(compile_log(&device).len(), 2);
    assert_eq!(context.memory().usage(), 0);
    assert_eq!(read_i32(&context, 0), vec![1; 16]);
    Ok(())
}

#[test]
fn test_warmup_then_execute_matches_cold_execute() -> Result<()> {
    let warm_context = context();
    let warm_device = device_ref(cpu());
    let mut warm = Interpreter::new(warm_context.clone(), program(), warm_device.clone(), VmConfig::default())?;
    warm.warmup()?;
    warm.execute(ExecutionMode::Run)?;

    let cold_context = context();
    let mut cold = Interpreter::new(cold_context.clone(), program(), device_ref(cpu()), VmConfig::default())?;
    cold.execute(ExecutionMode::Run)?;

    assert_eq!(read_i32(&warm_context, 0), read_i32(&cold_context, 0));
    assert_eq!(read_i32(&warm_context, 0)[3], 4);
    // nothing left to compile after warmup
    assert_eq!(compile_log(&warm_device).len(), 2);
    Ok(())
}

#[test]
fn test_virtual_device_never_touches_memory() -> Result<()> {
    let device = device_ref(cpu());
    let context = context();
    let config = VmConfig::default().with_virtual_device(true);
    let mut interpreter = Interpreter::new(context.clone(), program(), device.clone(), config)?;

    assert_eq!(interpreter.execute(ExecutionMode::Run)?, None);
    assert_eq!(interpreter.stats().invocations, 0);
    assert_eq!(interpreter.stats().warmups, 1);
    assert_eq!(counters(&device).device_work(), 0);
    assert_eq!(read_i32(&context, 0), vec![1; 16]);
    Ok(())
}

#[test]
fn test_reset_after_warmup_requires_new_warmup() -> Result<()> {
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(context(), program(), device.clone(), VmConfig::default())?;
    interpreter.warmup()?;

    device.write().reset()?;
    let err = interpreter.execute(ExecutionMode::Run).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceInconsistency);

    interpreter.warmup()?;
    interpreter.execute(ExecutionMode::Run)?;
    assert_eq!(compile_log(&device).len(), 4);
    Ok(())
}
