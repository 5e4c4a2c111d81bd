//! Performance-focused tracing utilities
//!
//! Threshold-filtered timing spans plus the standard events the interpreter
//! emits for allocations, transfers, kernel launches and compilations.
//!
//! ## Example
//!
//! ```rust
//! use xpuvm_tracing::performance::{PerformanceSpan, record_transfer, TransferDirection};
//!
//! let span = PerformanceSpan::new("execute", Some(100));
//! drop(span); // Logs only if duration > 100μs
//!
//! record_transfer(4096, TransferDirection::HostToDevice, 250);
//! ```

use std::fmt;
use std::time::Instant;

/// RAII guard that measures span duration and logs it on drop when the
/// duration reaches the optional threshold.
pub struct PerformanceSpan {
    name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Create a new performance span with optional threshold filtering.
    pub fn new(name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = name.into();
        let span = tracing::debug_span!("perf", name = %name);
        Self {
            name,
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Elapsed time since span creation.
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Enter this span's context.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();

        if self.threshold_us.is_none_or(|t| elapsed_us >= t) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Direction of a host/device copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    HostToDevice,
    DeviceToHost,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::HostToDevice => f.write_str("H2D"),
            TransferDirection::DeviceToHost => f.write_str("D2H"),
        }
    }
}

/// Record a device allocation request issued by ALLOC.
pub fn record_allocation(objects: usize, size_bytes: u64, usage_bytes: u64) {
    tracing::debug!(
        event = "allocation",
        objects = objects,
        size_bytes = size_bytes,
        size_kb = size_bytes as f64 / 1024.0,
        device_usage_bytes = usage_bytes,
        "device_allocation"
    );
}

/// Record a host/device transfer with bandwidth derived from its duration.
pub fn record_transfer(bytes: u64, direction: TransferDirection, duration_us: u64) {
    let bandwidth_mbps = if duration_us > 0 {
        (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
    } else {
        0.0
    };

    tracing::debug!(
        event = "transfer",
        bytes = bytes,
        direction = %direction,
        duration_us = duration_us,
        bandwidth_mbps = bandwidth_mbps,
        "data_transfer"
    );
}

/// Record a kernel dispatch.
pub fn record_launch(task: &str, batch_threads: u64, duration_us: u64) {
    tracing::debug!(
        event = "launch",
        task = task,
        batch_threads = batch_threads,
        duration_us = duration_us,
        "kernel_launch"
    );
}

/// Record a kernel compilation; `forced` marks recompilations.
pub fn record_compilation(task: &str, forced: bool, duration_us: u64) {
    tracing::debug!(
        event = "compilation",
        task = task,
        forced = forced,
        duration_us = duration_us,
        duration_ms = duration_us as f64 / 1000.0,
        "kernel_compilation"
    );
}
