//! Execution context: the tables bytecode operands index into
//!
//! An [`ExecutionContext`] is built once per program and shared read-only
//! (`Arc`) between every interpreter running it. Only the memory counter
//! mutates, and it does so atomically.
//!
//! ```text
//! objects   [0] a: f32[1024]   [1] b: f32[1024]   [2] ctx   [3] counter (atomic)
//! constants [0] 1024:i32       [1] 2.5:f32
//! tasks     [0] s0.t0 -> saxpy
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use xpuvm_backends::{AccessMode, HostObject, ObjectRef, ScalarValue, TaskMeta};

/// One entry of the object table
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub object: ObjectRef,
    pub access: AccessMode,
    /// Object lives in the atomics region instead of its own buffer
    pub atomic: bool,
}

const NO_LIMIT: u64 = u64::MAX;

/// Device memory accounting against an optional limit
#[derive(Debug)]
pub struct MemoryTracker {
    limit: AtomicU64,
    usage: AtomicU64,
}

impl MemoryTracker {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit: AtomicU64::new(limit.unwrap_or(NO_LIMIT)),
            usage: AtomicU64::new(0),
        }
    }

    pub fn limit(&self) -> Option<u64> {
        match self.limit.load(Ordering::Acquire) {
            NO_LIMIT => None,
            limit => Some(limit),
        }
    }

    pub fn set_limit(&self, limit: Option<u64>) {
        self.limit.store(limit.unwrap_or(NO_LIMIT), Ordering::Release);
    }

    pub fn usage(&self) -> u64 {
        self.usage.load(Ordering::Acquire)
    }

    pub fn add(&self, bytes: u64) -> u64 {
        self.usage.fetch_add(bytes, Ordering::AcqRel) + bytes
    }

    /// Saturates at zero
    pub fn sub(&self, bytes: u64) -> u64 {
        let previous = self
            .usage
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |u| Some(u.saturating_sub(bytes)))
            .unwrap_or(0);
        previous.saturating_sub(bytes)
    }

    /// Usage already above the limit
    pub fn exceeded(&self) -> bool {
        self.limit().is_some_and(|limit| self.usage() > limit)
    }

    /// Fail with out-of-memory if `requested` more bytes would pass the limit
    pub fn check(&self, requested: u64) -> Result<()> {
        if let Some(limit) = self.limit() {
            let usage = self.usage();
            if usage.saturating_add(requested) > limit {
                return Err(Error::OutOfMemory {
                    usage,
                    requested,
                    limit,
                });
            }
        }
        Ok(())
    }
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Object, constant and task tables of one program
#[derive(Debug)]
pub struct ExecutionContext {
    name: String,
    objects: Vec<ObjectEntry>,
    constants: Vec<ScalarValue>,
    tasks: Vec<TaskMeta>,
    memory: MemoryTracker,
}

impl ExecutionContext {
    pub fn builder(name: impl Into<String>) -> ExecutionContextBuilder {
        ExecutionContextBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object(&self, index: u32) -> Result<&ObjectEntry> {
        self.objects
            .get(index as usize)
            .ok_or_else(|| Error::malformed(format!("object index {} out of range ({} objects)", index, self.objects.len())))
    }

    pub fn objects(&self) -> &[ObjectEntry] {
        &self.objects
    }

    pub fn constant(&self, index: u32) -> Result<ScalarValue> {
        self.constants.get(index as usize).copied().ok_or_else(|| {
            Error::malformed(format!(
                "constant index {} out of range ({} constants)",
                index,
                self.constants.len()
            ))
        })
    }

    pub fn constants(&self) -> &[ScalarValue] {
        &self.constants
    }

    pub fn task(&self, index: u32) -> Result<&TaskMeta> {
        self.tasks
            .get(index as usize)
            .ok_or_else(|| Error::malformed(format!("task index {} out of range ({} tasks)", index, self.tasks.len())))
    }

    pub fn tasks(&self) -> &[TaskMeta] {
        &self.tasks
    }

    pub fn memory(&self) -> &MemoryTracker {
        &self.memory
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} objects, {} constants, {} tasks)",
            self.name,
            self.objects.len(),
            self.constants.len(),
            self.tasks.len()
        )
    }
}

/// Builder for [`ExecutionContext`]
///
/// ```rust
/// use xpuvm_backends::{AccessMode, HostObject, LaunchConfig, ScalarValue, TaskMeta};
/// use xpuvm_core::ExecutionContext;
///
/// let mut builder = ExecutionContext::builder("saxpy");
/// let x = builder.add_object(HostObject::array(&[1.0f32; 8]).into_ref(), AccessMode::ReadOnly);
/// let n = builder.add_constant(ScalarValue::I32(8));
/// let t = builder.add_task(TaskMeta::new("s0.t0", "saxpy", LaunchConfig::linear(8, 8)));
/// let context = builder.build();
///
/// assert_eq!((x, n, t), (0, 0, 0));
/// assert_eq!(context.objects().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ExecutionContextBuilder {
    name: String,
    objects: Vec<ObjectEntry>,
    constants: Vec<ScalarValue>,
    tasks: Vec<TaskMeta>,
    memory_limit: Option<u64>,
}

impl ExecutionContextBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn push_object(&mut self, object: ObjectRef, access: AccessMode, atomic: bool) -> u32 {
        self.objects.push(ObjectEntry { object, access, atomic });
        (self.objects.len() - 1) as u32
    }

    /// Register an object, returning its bytecode index
    pub fn add_object(&mut self, object: ObjectRef, access: AccessMode) -> u32 {
        self.push_object(object, access, false)
    }

    /// Register an `i32` object whose values live in the atomics region
    pub fn add_atomic(&mut self, object: ObjectRef) -> u32 {
        self.push_object(object, AccessMode::ReadWrite, true)
    }

    pub fn add_kernel_context(&mut self) -> u32 {
        self.push_object(HostObject::KernelContext.into_ref(), AccessMode::None, false)
    }

    pub fn add_constant(&mut self, value: ScalarValue) -> u32 {
        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    pub fn add_task(&mut self, task: TaskMeta) -> u32 {
        self.tasks.push(task);
        (self.tasks.len() - 1) as u32
    }

    pub fn memory_limit(&mut self, limit: Option<u64>) -> &mut Self {
        self.memory_limit = limit;
        self
    }

    pub fn build(self) -> Arc<ExecutionContext> {
        Arc::new(ExecutionContext {
            name: self.name,
            objects: self.objects,
            constants: self.constants,
            tasks: self.tasks,
            memory: MemoryTracker::new(self.memory_limit),
        })
    }
}

// ================================================================================================
// Tests
// ================================================================================================
