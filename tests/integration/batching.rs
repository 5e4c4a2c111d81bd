//! Batch planning and batched execution

use crate::common::{compile_log, cpu, read_i32};
use proptest::prelude::*;
use std::sync::Arc;
use xpuvm::backends::device_ref;
use xpuvm::prelude::*;

const ELEMENTS: u64 = 100;

#[test]
fn test_hundred_units_in_batches_of_thirty() {
    let plan = BatchPlan::new(100, 30);
    let offsets: Vec<u64> = plan.iter().map(|b| b.offset).collect();
    assert_eq!(offsets, vec![0, 30, 60, 90]);
    assert_eq!(plan.last_batch_size(), 10);

    let batches: Vec<_> = plan.iter().collect();
    for pair in batches.windows(2) {
        assert_eq!(pair[0].end(), pair[1].offset);
    }
    assert_eq!(batches.last().unwrap().end(), 100);
}

fn context() -> Arc<ExecutionContext> {
    let mut builder = ExecutionContext::builder("batched");
    builder.add_object(HostObject::array(&vec![1i32; ELEMENTS as usize]).into_ref(), AccessMode::ReadWrite);
    builder.add_task(TaskMeta::new("s0.t0", "add_index", LaunchConfig::linear(ELEMENTS as u32, 10)));
    builder.build()
}

/// One H2D / LAUNCH / D2H triple per batch of `batch_elements`
fn batched_program(batch_elements: u64) -> BytecodeProgram {
    let bytes = BatchPlan::new(ELEMENTS * 4, batch_elements * 4);
    let mut builder = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(bytes.batch_size(), &[0]);
    for batch in bytes.iter() {
        builder = builder
            .transfer_h2d_always(0, None, batch.offset, batch.size)
            .launch(0, 0, None, batch.offset / 4, batch.size / 4, &[LaunchArg::Reference(0)])
            .transfer_d2h_blocking(0, None, batch.offset, batch.size);
    }
    builder.end().finish()
}

fn unbatched_program() -> BytecodeProgram {
    BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0])
        .transfer_h2d_always(0, None, 0, 0)
        .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0)])
        .transfer_d2h_blocking(0, None, 0, 0)
        .end()
        .finish()
}

fn run(program: BytecodeProgram) -> Result<(Vec<i32>, DeviceRef)> {
    let context = context();
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(Arc::clone(&context), program, device.clone(), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;
    Ok((read_i32(&context, 0), device))
}

#[test]
fn test_batched_run_matches_unbatched() -> Result<()> {
    let (expected, _) = run(unbatched_program())?;
    assert_eq!(expected[0], 1);
    assert_eq!(expected[99], 100);

    let (batched, device) = run(batched_program(30))?;
    assert_eq!(batched, expected);

    // 30, 30, 30 then the 10-thread tail forces one rebuild
    let log = compile_log(&device);
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].batch_threads, 10);
    assert!(log[1].forced);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn batches_cover_every_element_once(batch in 1u64..=ELEMENTS) {
        let (batched, _) = run(batched_program(batch)).unwrap();
        let expected: Vec<i32> = (0..ELEMENTS as i32).map(|i| 1 + i).collect();
        prop_assert_eq!(batched, expected);
    }
}
