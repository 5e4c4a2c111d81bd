//! Types for backend configuration and handles

use crate::object::ScalarValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an allocated device buffer
///
/// Buffers are opaque handles managed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferHandle(pub u64);

impl BufferHandle {
    /// Create a new buffer handle
    pub const fn new(id: u64) -> Self {
        BufferHandle(id)
    }

    /// Get the internal ID
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf{}", self.0)
    }
}

/// Handle to an enqueued device command
///
/// Transfers, launches and markers each return one. Event lists in the
/// interpreter collect them to build wait lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventHandle(pub u64);

impl EventHandle {
    pub const fn new(id: u64) -> Self {
        EventHandle(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt{}", self.0)
    }
}

/// A device buffer together with its size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceBuffer {
    pub handle: BufferHandle,
    pub size: u64,
}

impl fmt::Display for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}B)", self.handle, self.size)
    }
}

/// How a kernel uses an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
    None,
}

/// One buffer requested by ALLOC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRequest {
    /// Object table index, for diagnostics
    pub object: usize,
    pub size: u64,
    pub access: AccessMode,
}

/// Host byte range copied by a transfer
///
/// The device side of the copy always starts at byte 0 of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRange {
    pub host_offset: u64,
    pub size: u64,
}

impl TransferRange {
    pub const fn new(host_offset: u64, size: u64) -> Self {
        Self { host_offset, size }
    }

    /// Whole-object range
    pub const fn full(size: u64) -> Self {
        Self { host_offset: 0, size }
    }
}

/// Grid dimensions for kernel launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDim {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridDim {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn linear(size: u32) -> Self {
        Self { x: size, y: 1, z: 1 }
    }

    pub const fn total_blocks(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl Default for GridDim {
    fn default() -> Self {
        Self { x: 1, y: 1, z: 1 }
    }
}

impl fmt::Display for GridDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Block dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockDim {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl BlockDim {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn linear(size: u32) -> Self {
        Self { x: size, y: 1, z: 1 }
    }

    pub const fn total_lanes(&self) -> u32 {
        self.x * self.y * self.z
    }
}

impl Default for BlockDim {
    fn default() -> Self {
        Self { x: 1, y: 1, z: 1 }
    }
}

/// Worker grid of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub grid: GridDim,
    pub block: BlockDim,
}

impl LaunchConfig {
    pub const fn new(grid: GridDim, block: BlockDim) -> Self {
        Self { grid, block }
    }

    /// 1D configuration covering `total_threads`
    pub const fn linear(total_threads: u32, block_size: u32) -> Self {
        let num_blocks = total_threads.div_ceil(block_size);
        Self {
            grid: GridDim::linear(num_blocks),
            block: BlockDim::linear(block_size),
        }
    }

    pub const fn total_threads(&self) -> u64 {
        self.grid.total_blocks() * self.block.total_lanes() as u64
    }

    /// Same block shape resized to `threads` along x
    pub fn with_threads(&self, threads: u64) -> Self {
        let lanes = self.block.x.max(1) as u64;
        let blocks = threads.div_ceil(lanes).min(u32::MAX as u64) as u32;
        Self {
            grid: GridDim::new(blocks, self.grid.y, self.grid.z),
            block: self.block,
        }
    }
}

/// Completion state of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Queued,
    Running,
    Complete,
}

/// Status and timestamps of an event, in nanoseconds since backend creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventProfile {
    pub status: EventStatus,
    pub queued_ns: u64,
    pub submit_ns: u64,
    pub start_ns: u64,
    pub end_ns: u64,
}

impl EventProfile {
    pub fn is_complete(&self) -> bool {
        self.status == EventStatus::Complete
    }

    /// Device execution time
    pub fn elapsed_ns(&self) -> u64 {
        self.end_ns.saturating_sub(self.start_ns)
    }

    /// Driver time between enqueue and submission
    pub fn dispatch_ns(&self) -> u64 {
        self.submit_ns.saturating_sub(self.queued_ns)
    }
}

/// One bound kernel argument
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelArg {
    Constant(ScalarValue),
    Buffer(DeviceBuffer),
    KernelContext,
}

/// Reusable argument frame for one call wrapper
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgsFrame {
    args: Vec<KernelArg>,
}

impl ArgsFrame {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            args: Vec::with_capacity(capacity),
        }
    }

    /// Drop bound arguments, keeping the allocation
    pub fn reset(&mut self) {
        self.args.clear();
    }

    pub fn push(&mut self, arg: KernelArg) {
        self.args.push(arg);
    }

    pub fn get(&self, index: usize) -> Option<&KernelArg> {
        self.args.get(index)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KernelArg> {
        self.args.iter()
    }
}

/// Compiled binary handed back by [`Backend::install_code`](super::Backend::install_code)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledCode {
    pub id: u64,
    pub kernel: String,
    /// Backend reset epoch the binary was built in
    pub epoch: u64,
    pub batch_threads: u64,
    pub batch_size: u64,
    pub batch_number: u64,
    valid: bool,
}

impl InstalledCode {
    pub fn new(id: u64, kernel: impl Into<String>, epoch: u64) -> Self {
        Self {
            id,
            kernel: kernel.into(),
            epoch,
            batch_threads: 0,
            batch_size: 0,
            batch_number: 0,
            valid: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// Static description of the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub index: u32,
    pub supports_fp64: bool,
    pub global_memory: u64,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.index)
    }
}
