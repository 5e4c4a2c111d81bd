//! Event lists, barriers and the END marker

use crate::common::cpu;
use std::sync::Arc;
use xpuvm::backends::{device_ref, EventHandle, EventStatus, MARKER_LOG_CAPACITY};
use xpuvm::prelude::*;

fn context() -> Arc<ExecutionContext> {
    let mut builder = ExecutionContext::builder("deps");
    builder.add_object(HostObject::array(&[1i32; 8]).into_ref(), AccessMode::ReadWrite);
    builder.add_object(HostObject::array(&[0i32; 8]).into_ref(), AccessMode::ReadWrite);
    builder.add_task(TaskMeta::new("s0.t0", "add_index", LaunchConfig::linear(8, 8)));
    builder.build()
}

fn with_cpu<R>(device: &DeviceRef, f: impl FnOnce(&mut CpuBackend) -> R) -> R {
    let mut guard = device.write();
    f(guard.as_any_mut().downcast_mut::<CpuBackend>().unwrap())
}

#[test]
fn test_barrier_waits_for_both_dependencies() -> Result<()> {
    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0, 1])
        .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0)])
        .add_dependency(Some(0))
        .transfer_d2h_always(1, None, 0, 0)
        .add_dependency(Some(0))
        .barrier(Some(0))
        .end()
        .finish();
    let device = device_ref(cpu().with_deferred_completion());
    let mut interpreter = Interpreter::new(context(), program, device.clone(), VmConfig::default())?;
    interpreter.execute(ExecutionMode::Run)?;

    let (barrier, deps) = with_cpu(&device, |cpu| cpu.marker_log()[0].clone());
    assert_eq!(deps.len(), 2);
    let status = |device: &DeviceRef, event: EventHandle| device.read().resolve_event(event).map(|p| p.status);

    assert_eq!(status(&device, barrier)?, EventStatus::Queued);
    with_cpu(&device, |cpu| cpu.complete_event(deps[0]))?;
    assert_eq!(status(&device, barrier)?, EventStatus::Queued);
    with_cpu(&device, |cpu| cpu.complete_event(deps[1]))?;
    assert_eq!(status(&device, barrier)?, EventStatus::Complete);
    Ok(())
}

#[test]
fn test_consumer_waits_on_list_then_resets_it() -> Result<()> {
    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0, 1])
        .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0)])
        .add_dependency(Some(0))
        .barrier(Some(0))
        .barrier(Some(0))
        .end()
        .finish();
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(context(), program, device.clone(), VmConfig::default())?;
    let end = interpreter.execute(ExecutionMode::Run)?;

    let log = with_cpu(&device, |cpu| cpu.marker_log().to_vec());
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].1.len(), 1);
    // the second barrier sees an empty list and covers all prior work
    assert!(log[1].1.contains(&log[0].0));
    assert_eq!(end, Some(log[2].0));
    Ok(())
}

#[test]
fn test_list_is_reset_between_replays() -> Result<()> {
    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0])
        .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0)])
        .add_dependency(Some(0))
        .end()
        .finish();
    let config = VmConfig::default().with_max_events(1);
    let mut interpreter = Interpreter::new(context(), program, device_ref(cpu()), config)?;

    // one slot is enough because every pass starts with empty lists
    for _ in 0..3 {
        interpreter.execute(ExecutionMode::Run)?;
    }
    Ok(())
}

#[test]
fn test_flush_on_end() -> Result<()> {
    let program = BytecodeBuilder::new().context(0).begin().end().finish();
    let device = device_ref(cpu());
    let config = VmConfig::default().with_flush_on_end(true).with_dependencies(false);
    let mut interpreter = Interpreter::new(context(), program, device.clone(), config)?;

    assert_eq!(interpreter.execute(ExecutionMode::Run)?, None);
    let counters = with_cpu(&device, |cpu| cpu.counters());
    assert_eq!((counters.flushes, counters.markers), (1, 0));
    Ok(())
}

fn replay_program() -> BytecodeProgram {
    BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0])
        .transfer_h2d_always(0, None, 0, 0)
        .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0)])
        .add_dependency(Some(0))
        .barrier(Some(0))
        .end()
        .finish()
}

#[test]
fn test_replays_do_not_accumulate_events() -> Result<()> {
    let device = device_ref(cpu());
    let mut interpreter = Interpreter::new(context(), replay_program(), device.clone(), VmConfig::default())?;
    for _ in 0..1000 {
        interpreter.execute(ExecutionMode::Run)?;
    }

    let (live, logged, markers) =
        with_cpu(&device, |cpu| (cpu.live_events(), cpu.marker_log().len(), cpu.counters().markers));
    assert!(live <= 4, "{} live events after 1000 passes", live);
    assert!(logged <= MARKER_LOG_CAPACITY);
    assert_eq!(markers, 2000);
    Ok(())
}

#[test]
fn test_deferred_replays_retire_after_waiting_on_end() -> Result<()> {
    let device = device_ref(cpu().with_deferred_completion());
    let mut interpreter = Interpreter::new(context(), replay_program(), device.clone(), VmConfig::default())?;
    for _ in 0..1000 {
        let end = interpreter.execute(ExecutionMode::Run)?.expect("END marker");
        device.write().wait_events(&[end])?;
        assert_eq!(device.read().resolve_event(end)?.status, EventStatus::Complete);
    }
    assert!(with_cpu(&device, |cpu| cpu.live_events()) <= 4);
    Ok(())
}
