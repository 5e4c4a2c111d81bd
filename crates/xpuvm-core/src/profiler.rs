//! Profiler hook
//!
//! The interpreter reports timers (nanoseconds) and per-key metrics to a
//! [`Profiler`]. When [`Profiler::is_enabled`] is false the interpreter
//! skips resolving events altogether, so a disabled profiler costs nothing
//! on the device queue.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Accumulating timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerKind {
    /// Host to device copies
    CopyInTime,
    /// Device to host copies
    CopyOutTime,
    /// Driver overhead of transfers (submit minus queued)
    DispatchDataTransfersTime,
    /// Host-side kernel dispatch
    DispatchTime,
    CompileTime,
}

/// Per-key metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    AllocationBytes,
    CopyInBytes,
    CopyOutBytes,
    KernelTime,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerKind::CopyInTime => "COPY_IN_TIME",
            TimerKind::CopyOutTime => "COPY_OUT_TIME",
            TimerKind::DispatchDataTransfersTime => "DISPATCH_DATA_TRANSFERS_TIME",
            TimerKind::DispatchTime => "DISPATCH_TIME",
            TimerKind::CompileTime => "COMPILE_TIME",
        };
        f.write_str(name)
    }
}

pub trait Profiler: Send + Sync {
    /// Whether the interpreter should measure at all
    fn is_enabled(&self) -> bool {
        true
    }

    fn add_timer(&self, kind: TimerKind, nanos: u64);

    fn add_metric(&self, kind: MetricKind, key: &str, value: u64);

    fn snapshot(&self) -> ProfilerSnapshot;

    fn reset(&self);
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProfiler;

impl Profiler for NoopProfiler {
    fn is_enabled(&self) -> bool {
        false
    }

    fn add_timer(&self, _kind: TimerKind, _nanos: u64) {}

    fn add_metric(&self, _kind: MetricKind, _key: &str, _value: u64) {}

    fn snapshot(&self) -> ProfilerSnapshot {
        ProfilerSnapshot::default()
    }

    fn reset(&self) {}
}

/// Accumulated profiler values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerSnapshot {
    pub timers: BTreeMap<TimerKind, u64>,
    pub metrics: BTreeMap<MetricKind, BTreeMap<String, u64>>,
}

impl ProfilerSnapshot {
    pub fn timer(&self, kind: TimerKind) -> u64 {
        self.timers.get(&kind).copied().unwrap_or(0)
    }

    pub fn metric(&self, kind: MetricKind, key: &str) -> u64 {
        self.metrics
            .get(&kind)
            .and_then(|m| m.get(key))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of a metric over all keys
    pub fn metric_total(&self, kind: MetricKind) -> u64 {
        self.metrics.get(&kind).map(|m| m.values().sum()).unwrap_or(0)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Thread-safe accumulating profiler
#[derive(Debug, Default)]
pub struct TimeProfiler {
    state: Mutex<ProfilerSnapshot>,
}

impl TimeProfiler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Profiler for TimeProfiler {
    fn add_timer(&self, kind: TimerKind, nanos: u64) {
        *self.state.lock().timers.entry(kind).or_insert(0) += nanos;
    }

    fn add_metric(&self, kind: MetricKind, key: &str, value: u64) {
        let mut state = self.state.lock();
        *state
            .metrics
            .entry(kind)
            .or_default()
            .entry(key.to_string())
            .or_insert(0) += value;
    }

    fn snapshot(&self) -> ProfilerSnapshot {
        self.state.lock().clone()
    }

    fn reset(&self) {
        *self.state.lock() = ProfilerSnapshot::default();
    }
}
