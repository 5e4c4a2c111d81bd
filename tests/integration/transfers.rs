//! Transfer semantics across replays

use crate::common::{counters, cpu, read_i32};
use std::sync::Arc;
use xpuvm::backends::device_ref;
use xpuvm::prelude::*;

#[test]
fn test_once_copies_once_always_copies_every_replay() -> Result<()> {
    let mut builder = ExecutionContext::builder("replay");
    builder.add_object(HostObject::array(&[1f32; 4]).into_ref(), AccessMode::ReadOnly);
    builder.add_object(HostObject::array(&[2f32; 8]).into_ref(), AccessMode::ReadOnly);
    let context = builder.build();

    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0, 1])
        .transfer_h2d_once(0, None, 0, 0)
        .transfer_h2d_always(1, None, 0, 0)
        .end()
        .finish();
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(context, program, device.clone(), VmConfig::default())?;

    const REPLAYS: u64 = 5;
    for _ in 0..REPLAYS {
        interpreter.execute(ExecutionMode::Run)?;
    }

    let counters = counters(&device);
    assert_eq!(counters.h2d_transfers, 1 + REPLAYS);
    assert_eq!(counters.h2d_bytes, 16 + 32 * REPLAYS);
    assert!(interpreter.buffer_state(0)?.has_content());
    Ok(())
}

#[test]
fn test_kernel_context_transfers_are_skipped() -> Result<()> {
    let mut builder = ExecutionContext::builder("ctx");
    let ctx = builder.add_kernel_context();
    let context = builder.build();

    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[ctx])
        .transfer_h2d_always(ctx, None, 0, 0)
        .transfer_d2h_blocking(ctx, None, 0, 0)
        .dealloc(ctx)
        .end()
        .finish();
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(context, program, device.clone(), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;

    let counters = counters(&device);
    assert_eq!(counters.allocations + counters.h2d_transfers + counters.d2h_transfers, 0);
    Ok(())
}

#[test]
fn test_partial_transfers_stream_batches() -> Result<()> {
    let source: Vec<i32> = (0..10).collect();
    let mut builder = ExecutionContext::builder("partial");
    builder.add_object(HostObject::array(&source).into_ref(), AccessMode::ReadOnly);
    builder.add_object(HostObject::array(&[0i32; 10]).into_ref(), AccessMode::WriteOnly);
    let context = builder.build();

    // copy elements 4..10 of object 0 through a 24-byte device buffer
    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(24, &[0])
        .transfer_h2d_once(0, None, 16, 24)
        .end()
        .finish();
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(Arc::clone(&context), program, device.clone(), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;
    interpreter.execute(ExecutionMode::Run)?;

    // batched ONCE transfers always stream
    assert_eq!(counters(&device).h2d_transfers, 2);
    let buffer = interpreter.buffer_state(0)?.buffer().unwrap();
    let guard = device.read();
    let cpu = guard.as_any().downcast_ref::<CpuBackend>().unwrap();
    let bytes = cpu.buffer_contents(&buffer).map_err(Error::from)?;
    let copied: Vec<i32> = bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    assert_eq!(copied, vec![4, 5, 6, 7, 8, 9]);
    assert_eq!(read_i32(&context, 1), vec![0; 10]);
    Ok(())
}

#[test]
fn test_non_blocking_read_feeds_dependency() -> Result<()> {
    let mut builder = ExecutionContext::builder("read");
    builder.add_object(HostObject::array(&[7i32; 4]).into_ref(), AccessMode::ReadWrite);
    builder.add_object(HostObject::array(&[0i32; 4]).into_ref(), AccessMode::ReadWrite);
    let context = builder.build();

    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0, 1])
        .transfer_h2d_always(0, None, 0, 0)
        .transfer_d2h_always(0, None, 0, 0)
        .add_dependency(Some(0))
        .transfer_d2h_blocking(1, Some(0), 0, 0)
        .end()
        .finish();
    let mut interpreter = Interpreter::new(Arc::clone(&context), program, device_ref(cpu()), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;

    assert_eq!(read_i32(&context, 0), vec![7; 4]);
    assert_eq!(read_i32(&context, 1), vec![0; 4]);
    Ok(())
}
