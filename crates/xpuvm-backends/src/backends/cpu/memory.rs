//! Memory manager for the CPU backend
//!
//! Device buffers are heap vectors keyed by handle id. A configurable
//! capacity stands in for the device's global memory.

use crate::backend::BufferHandle;
use crate::error::{BackendError, Result};
use std::collections::HashMap;

/// Buffer storage with a global-memory budget
pub struct MemoryManager {
    /// Buffers storage
    buffers: HashMap<u64, Vec<u8>>,

    /// Next buffer handle ID
    next_buffer_id: u64,

    /// Bytes currently allocated
    allocated: u64,

    /// Maximum bytes that may be allocated at once
    capacity: u64,
}

impl MemoryManager {
    pub fn new(capacity: u64) -> Self {
        Self {
            buffers: HashMap::new(),
            next_buffer_id: 1,
            allocated: 0,
            capacity,
        }
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    pub fn available(&self) -> u64 {
        self.capacity.saturating_sub(self.allocated)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Fail unless `size` more bytes fit
    pub fn reserve(&self, size: u64) -> Result<()> {
        if size > self.available() {
            return Err(BackendError::OutOfDeviceMemory {
                requested: size,
                available: self.available(),
            });
        }
        Ok(())
    }

    /// Allocate a zeroed buffer
    pub fn allocate_buffer(&mut self, size: usize) -> Result<BufferHandle> {
        self.reserve(size as u64)?;
        let handle = BufferHandle::new(self.next_buffer_id);
        self.next_buffer_id += 1;
        self.buffers.insert(handle.id(), vec![0u8; size]);
        self.allocated += size as u64;
        Ok(handle)
    }

    /// Free a buffer, returning its size
    pub fn free_buffer(&mut self, handle: BufferHandle) -> Result<u64> {
        let buffer = self
            .buffers
            .remove(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        let size = buffer.len() as u64;
        self.allocated -= size;
        Ok(size)
    }

    /// Copy `data` into the buffer at `offset`
    pub fn copy_to_buffer(&mut self, handle: BufferHandle, offset: usize, data: &[u8]) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        let end = check_bounds(offset, data.len(), buffer.len())?;
        buffer[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Copy `data.len()` bytes out of the buffer starting at `offset`
    pub fn copy_from_buffer(&self, handle: BufferHandle, offset: usize, data: &mut [u8]) -> Result<()> {
        let buffer = self.buffer(handle)?;
        let end = check_bounds(offset, data.len(), buffer.len())?;
        data.copy_from_slice(&buffer[offset..end]);
        Ok(())
    }

    pub fn buffer(&self, handle: BufferHandle) -> Result<&[u8]> {
        self.buffers
            .get(&handle.id())
            .map(Vec::as_slice)
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    /// Drop every buffer
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.allocated = 0;
    }
}

fn check_bounds(offset: usize, size: usize, buffer_size: usize) -> Result<usize> {
    offset
        .checked_add(size)
        .filter(|&end| end <= buffer_size)
        .ok_or(BackendError::BufferOutOfBounds {
            offset,
            size,
            buffer_size,
        })
}
