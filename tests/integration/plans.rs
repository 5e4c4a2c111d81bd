//! End-to-end execution plans

use crate::common::{compile_log, counters, cpu, read_i32};
use std::sync::Arc;
use xpuvm::backends::ObjectRef;
use xpuvm::prelude::*;
use xpuvm::{MetricKind, PlanOption, TimerKind};

fn scale_context() -> (Arc<ExecutionContext>, ObjectRef) {
    let input = HostObject::array(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).into_ref();
    let output = HostObject::array(&[0f32; 8]).into_ref();
    let mut builder = ExecutionContext::builder("scale");
    builder.add_object(input, AccessMode::ReadOnly);
    builder.add_object(output.clone(), AccessMode::WriteOnly);
    builder.add_task(TaskMeta::new("s0.t0", "double_into", LaunchConfig::linear(8, 8)));
    (builder.build(), output)
}

fn read_f32(object: &ObjectRef) -> Vec<f32> {
    object.read().as_array().unwrap().to_vec().unwrap()
}

fn scale_program() -> BytecodeProgram {
    BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0, 1])
        .transfer_h2d_once(0, Some(0), 0, 0)
        .add_dependency(Some(1))
        .launch(0, 0, Some(1), 0, 0, &[LaunchArg::Reference(0), LaunchArg::Reference(1)])
        .add_dependency(Some(2))
        .transfer_d2h_blocking(1, Some(2), 0, 0)
        .end()
        .finish()
}

#[test]
fn test_profiled_plan_end_to_end() -> Result<()> {
    let mut runtime = Runtime::new();
    runtime.register_device(cpu());
    let (context, output) = scale_context();

    let mut plan = ExecutionPlan::new(&runtime, context, scale_program())
        .with_warmup()
        .with_profiler();
    plan.execute()?;
    plan.execute()?;

    assert_eq!(read_f32(&output), vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0]);

    let profile = plan.profile().expect("profiler enabled");
    assert_eq!(profile.metric(MetricKind::AllocationBytes, "obj[0]"), 32);
    // ONCE transfer: copied on the first execution only
    assert_eq!(profile.metric(MetricKind::CopyInBytes, "obj[0]"), 32);
    assert_eq!(profile.metric(MetricKind::CopyOutBytes, "obj[1]"), 64);
    assert!(profile.metrics[&MetricKind::KernelTime].contains_key("s0.t0"));

    let json: serde_json::Value = serde_json::from_str(&profile.to_json().expect("serializable"))
        .expect("valid json");
    assert!(json["timers"].get(TimerKind::CompileTime.to_string()).is_some_and(|v| v.is_u64()));
    assert_eq!(json["metrics"]["COPY_IN_BYTES"]["obj[0]"], 32);

    assert_eq!(plan.trace(), "ExecutionPlan[scale] with_warmup -> with_profiler");
    assert_eq!(plan.stats().map(|s| s.invocations), Some(2));
    Ok(())
}

#[test]
fn test_plan_without_profiler_has_no_profile() -> Result<()> {
    let mut runtime = Runtime::new();
    runtime.register_device(cpu());
    let (context, _) = scale_context();

    let mut plan = ExecutionPlan::new(&runtime, context, scale_program());
    plan.execute()?;
    assert!(plan.profile().is_none());
    Ok(())
}

#[test]
fn test_plan_memory_options() -> Result<()> {
    let mut runtime = Runtime::new();
    runtime.register_device(cpu());
    let (context, _) = scale_context();

    let mut plan = ExecutionPlan::new(&runtime, context.clone(), scale_program()).with_memory_limit("48B")?;
    let err = plan.execute().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhaustion);
    assert_eq!(plan.current_device_memory_usage(), 0);

    let mut plan = plan.without_memory_limit();
    plan.execute()?;
    assert_eq!(plan.current_device_memory_usage(), 64);
    assert_eq!(plan.free_device_memory()?, 64);
    assert_eq!(plan.current_device_memory_usage(), 0);

    assert_eq!(
        plan.options(),
        &[PlanOption::WithMemoryLimit("48B".into()), PlanOption::WithoutMemoryLimit]
    );
    assert_eq!(
        ExecutionPlan::new(&runtime, context, scale_program())
            .with_memory_limit("lots")
            .unwrap_err()
            .kind(),
        ErrorKind::Configuration
    );
    Ok(())
}

#[test]
fn test_plan_moves_between_devices() -> Result<()> {
    let mut runtime = Runtime::new();
    runtime.register_device(cpu());
    runtime.register_device(cpu().with_name("cpu-1").with_device_index(1));
    let (context, output) = scale_context();

    let program = |device: u32| {
        BytecodeBuilder::new()
            .context(device)
            .begin()
            .alloc(0, &[0, 1])
            .transfer_h2d_always(0, None, 0, 0)
            .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0), LaunchArg::Reference(1)])
            .transfer_d2h_blocking(1, None, 0, 0)
            .end()
            .finish()
    };

    let mut plan = ExecutionPlan::new(&runtime, context.clone(), program(0));
    plan.execute()?;
    assert_eq!(plan.current_device_memory_usage(), 64);

    let device0 = runtime.device(0)?;
    let mut plan = ExecutionPlan::new(&runtime, context, program(1)).with_device(1)?;
    plan.execute()?;
    assert_eq!(plan.device_index(), 1);
    assert_eq!(counters(&runtime.device(1)?).launches, 1);
    assert_eq!(counters(&device0).launches, 1);
    assert_eq!(read_f32(&output)[7], 16.0);
    Ok(())
}

#[test]
fn test_plan_reset_device_requires_warmup() -> Result<()> {
    let mut runtime = Runtime::new();
    runtime.register_device(cpu());
    let (context, _) = scale_context();

    let mut plan = ExecutionPlan::new(&runtime, context, scale_program()).with_warmup();
    plan.execute()?;
    plan.reset_device()?;
    assert_eq!(plan.current_device_memory_usage(), 0);
    assert_eq!(plan.execute().unwrap_err().kind(), ErrorKind::DeviceInconsistency);

    plan.warmup()?;
    plan.execute()?;
    Ok(())
}

#[test]
fn test_unknown_device() {
    let runtime = Runtime::new();
    let (context, _) = scale_context();
    let err = ExecutionPlan::new(&runtime, context, scale_program()).execute().unwrap_err();
    assert!(matches!(err, Error::UnknownDevice(0)));
}

#[test]
fn test_grid_scheduler_limits_launched_threads() -> Result<()> {
    let mut runtime = Runtime::new();
    runtime.register_device(cpu());
    let mut builder = ExecutionContext::builder("grid");
    builder.add_object(HostObject::array(&[0i32; 8]).into_ref(), AccessMode::ReadWrite);
    builder.add_task(TaskMeta::new("s0.t0", "add_index", LaunchConfig::linear(8, 8)));
    let context = builder.build();
    let program = BytecodeBuilder::new()
        .context(0)
        .begin()
        .alloc(0, &[0])
        .transfer_h2d_always(0, None, 0, 0)
        .launch(0, 0, None, 0, 0, &[LaunchArg::Reference(0)])
        .transfer_d2h_blocking(0, None, 0, 0)
        .end()
        .finish();

    let scheduler = GridScheduler::new().with_grid("s0.t0", LaunchConfig::linear(4, 4));
    let mut plan =
        ExecutionPlan::new(&runtime, Arc::clone(&context), program).with_grid_scheduler(scheduler.clone());
    plan.execute()?;

    assert_eq!(read_i32(&context, 0), vec![0, 1, 2, 3, 0, 0, 0, 0]);
    assert_eq!(plan.options(), &[PlanOption::WithGridScheduler(scheduler)]);
    assert_eq!(plan.trace(), "ExecutionPlan[grid] with_grid_scheduler(s0.t0)");

    // dropping the override on a live plan rebuilds the task with its own grid
    let mut plan = plan.with_grid_scheduler(GridScheduler::new());
    plan.execute()?;
    assert_eq!(read_i32(&context, 0), vec![0, 2, 4, 6, 4, 5, 6, 7]);
    let device = runtime.device(0)?;
    let log = compile_log(&device);
    assert_eq!(log.len(), 2);
    assert_eq!((log[0].grid, log[1].grid), (Some(LaunchConfig::linear(4, 4)), None));
    Ok(())
}
