//! Kernel cache behaviour across launches

use crate::common::{compile_log, cpu};
use std::sync::Arc;
use xpuvm::backends::device_ref;
use xpuvm::prelude::*;

fn context(writes_loop_index: bool) -> Arc<ExecutionContext> {
    let mut builder = ExecutionContext::builder("recompile");
    builder.add_object(HostObject::array(&[0i32; 256]).into_ref(), AccessMode::ReadWrite);
    builder.add_task(
        TaskMeta::new("s0.t0", "noop", LaunchConfig::linear(256, 64)).writes_loop_index(writes_loop_index),
    );
    builder.build()
}

fn two_launches(first: u64, second: u64) -> BytecodeProgram {
    BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0])
        .launch(0, 0, None, 0, first, &[LaunchArg::Reference(0)])
        .launch(0, 0, None, first, second, &[LaunchArg::Reference(0)])
        .end()
        .finish()
}

#[test]
fn test_thread_count_change_recompiles_once() -> Result<()> {
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(context(false), two_launches(64, 128), device.clone(), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;

    assert_eq!(interpreter.stats().recompilations, 1);
    let log = compile_log(&device);
    assert_eq!(log.len(), 2);
    assert_eq!((log[0].batch_threads, log[0].forced), (64, false));
    assert_eq!((log[1].batch_threads, log[1].forced), (128, true));
    Ok(())
}

#[test]
fn test_same_thread_count_reuses_binary() -> Result<()> {
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(context(false), two_launches(64, 64), device.clone(), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;
    interpreter.execute(ExecutionMode::Run)?;

    assert_eq!(interpreter.stats().recompilations, 0);
    assert_eq!(compile_log(&device).len(), 1);
    Ok(())
}

#[test]
fn test_loop_index_in_write_rebuilds_each_batch() -> Result<()> {
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(context(true), two_launches(64, 64), device.clone(), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;

    let log = compile_log(&device);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].batch_size, 64);
    assert_eq!((log[0].batch_number, log[1].batch_number), (0, 1));
    assert!(log[1].forced);
    Ok(())
}

#[test]
fn test_unsupported_fp64_is_recoverable() -> Result<()> {
    let mut builder = ExecutionContext::builder("fp64");
    builder.add_task(TaskMeta::new("s0.t0", "noop", LaunchConfig::linear(1, 1)).uses_fp64(true));
    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .launch(0, 0, None, 0, 0, &[])
        .end()
        .finish();
    let mut interpreter = Interpreter::new(builder.build(), program, device_ref(cpu().with_fp64(false)), VmConfig::default())?;

    let err = interpreter.warmup().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    assert!(err.is_recoverable_on_other_device());
    Ok(())
}

#[test]
fn test_clear_installed_code_forces_compile() -> Result<()> {
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(context(false), two_launches(0, 0), device.clone(), VmConfig::default())?;
    interpreter.warmup()?;
    interpreter.clear_installed_code();
    interpreter.execute(ExecutionMode::Run)?;
    assert_eq!(compile_log(&device).len(), 2);
    Ok(())
}
