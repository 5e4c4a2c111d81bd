//! Convenience macros for performance tracing

/// Create a performance span, optionally with extra fields.
///
/// ```rust
/// use xpuvm_tracing::perf_span;
///
/// {
///     let _span = perf_span!("execute", invocation = 3);
///     // ... interpreter pass ...
/// }
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        tracing::debug!(name = $name, $($field = $value),+, "performance_span_start");
        $crate::performance::PerformanceSpan::new($name, None)
    }};
}

/// Emit a debug-level performance event.
///
/// ```rust
/// use xpuvm_tracing::perf_event;
///
/// perf_event!("event_list_reset", list = 2, cursor = 0);
/// ```
#[macro_export]
macro_rules! perf_event {
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {
        tracing::debug!(
            event = $name,
            $($field = $value),+
        );
    };
}

/// Time a block, returning `(result, elapsed)`.
///
/// ```rust
/// use xpuvm_tracing::timed_block;
///
/// let (sum, _elapsed) = timed_block!("sum", { (1..=10).sum::<i32>() });
/// assert_eq!(sum, 55);
/// ```
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let elapsed = start.elapsed();
        tracing::debug!(
            operation = $name,
            duration_us = elapsed.as_micros() as u64,
            "timed_block_complete"
        );
        (result, elapsed)
    }};
}
