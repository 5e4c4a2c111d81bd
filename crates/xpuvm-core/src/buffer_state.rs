//! Per-object device buffer state

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use xpuvm_backends::DeviceBuffer;

/// Device-side state of one object on one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferState {
    buffer: Option<DeviceBuffer>,
    atomic_region: bool,
    has_content: bool,
}

impl BufferState {
    /// A buffer is bound
    pub fn is_valid(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<DeviceBuffer> {
        self.buffer
    }

    pub fn set_buffer(&mut self, buffer: DeviceBuffer) {
        self.buffer = Some(buffer);
        self.has_content = false;
    }

    /// Drop the buffer binding, returning it
    pub fn invalidate(&mut self) -> Option<DeviceBuffer> {
        self.has_content = false;
        self.buffer.take()
    }

    /// The device copy holds the whole object
    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn set_content(&mut self, present: bool) {
        self.has_content = present;
    }

    pub fn is_atomic_region(&self) -> bool {
        self.atomic_region
    }
}

/// Buffer states indexed like the context's object table
#[derive(Debug, Clone, Default)]
pub struct BufferStateTable {
    states: Vec<BufferState>,
}

impl BufferStateTable {
    pub fn from_context(context: &ExecutionContext) -> Self {
        Self {
            states: context
                .objects()
                .iter()
                .map(|entry| BufferState {
                    atomic_region: entry.atomic,
                    ..Default::default()
                })
                .collect(),
        }
    }

    pub fn get(&self, index: u32) -> Result<&BufferState> {
        self.states
            .get(index as usize)
            .ok_or_else(|| Error::malformed(format!("no buffer state for object {}", index)))
    }

    pub fn get_mut(&mut self, index: u32) -> Result<&mut BufferState> {
        self.states
            .get_mut(index as usize)
            .ok_or_else(|| Error::malformed(format!("no buffer state for object {}", index)))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Indices and buffers of every valid state
    pub fn valid_buffers(&self) -> Vec<(u32, DeviceBuffer)> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.buffer.map(|b| (i as u32, b)))
            .collect()
    }

    /// Forget every binding, returning the bytes they held
    pub fn invalidate_all(&mut self) -> u64 {
        self.states
            .iter_mut()
            .filter_map(BufferState::invalidate)
            .map(|b| b.size)
            .sum()
    }
}
