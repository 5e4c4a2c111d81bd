//! Buffer lifecycle and memory accounting

use crate::common::{counters, cpu};
use std::sync::Arc;
use xpuvm::backends::device_ref;
use xpuvm::prelude::*;

fn context(limit: Option<u64>) -> Arc<ExecutionContext> {
    let mut builder = ExecutionContext::builder("memory");
    builder.add_object(HostObject::array(&[0f32; 64]).into_ref(), AccessMode::ReadWrite);
    builder.add_object(HostObject::array(&[0f64; 32]).into_ref(), AccessMode::ReadWrite);
    builder.add_kernel_context();
    builder.memory_limit(limit);
    builder.build()
}

#[test]
fn test_dealloc_restores_counter() -> Result<()> {
    let context = context(None);
    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0])
        .alloc(0, &[1, 2])
        .dealloc(1)
        .dealloc(2)
        .end()
        .finish();
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(Arc::clone(&context), program, device.clone(), VmConfig::default())?;

    interpreter.execute(ExecutionMode::Run)?;
    assert_eq!(context.memory().usage(), 256);

    // object 0 is still bound, so the replay allocates and frees only object 1
    interpreter.execute(ExecutionMode::Run)?;
    assert_eq!(context.memory().usage(), 256);
    assert_eq!(counters(&device).deallocations, 2);
    Ok(())
}

#[test]
fn test_batched_alloc_uses_batch_size() -> Result<()> {
    let context = context(None);
    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(48, &[0, 1])
        .end()
        .finish();
    let mut interpreter = Interpreter::new(Arc::clone(&context), program, device_ref(cpu()), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;

    assert_eq!(context.memory().usage(), 96);
    assert_eq!(interpreter.buffer_state(0)?.buffer().map(|b| b.size), Some(48));
    Ok(())
}

#[test]
fn test_limit_refuses_before_device_call() -> Result<()> {
    let context = context(Some(300));
    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0])
        .alloc(0, &[1])
        .end()
        .finish();
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(Arc::clone(&context), program, device.clone(), VmConfig::default())?;

    let err = interpreter.execute(ExecutionMode::Run).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhaustion);
    assert!(matches!(
        err,
        Error::OutOfMemory {
            usage: 256,
            requested: 256,
            limit: 300
        }
    ));
    assert_eq!(counters(&device).allocations, 1);
    Ok(())
}

#[test]
fn test_usage_over_limit_fails_fast() -> Result<()> {
    let context = context(None);
    let program = BytecodeBuilder::new().context(0).begin().alloc(0, &[0, 1]).end().finish();
    let mut interpreter = Interpreter::new(Arc::clone(&context), program, device_ref(cpu()), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;

    context.memory().set_limit(Some(100));
    let err = interpreter.execute(ExecutionMode::Run).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory { requested: 0, .. }));
    Ok(())
}

#[test]
fn test_device_memory_exhaustion() -> Result<()> {
    let context = context(None);
    let program = BytecodeBuilder::new().context(0).begin().alloc(0, &[0, 1]).end().finish();
    let device = device_ref(cpu().with_global_memory(128));
    let mut interpreter = Interpreter::new(Arc::clone(&context), program, device, VmConfig::default())?;

    let err = interpreter.execute(ExecutionMode::Run).unwrap_err();
    assert!(matches!(err, Error::DeviceOutOfMemory { requested: 512, .. }));
    assert_eq!(context.memory().usage(), 0);
    Ok(())
}
