//! Bytecode program container with a rewindable cursor
//!
//! The byte sequence lives behind an `Arc<[u8]>`, so cloning a
//! [`BytecodeProgram`] shares the bytes and yields an independent cursor.
//! Interpreters on different threads each clone the program they replay.
//!
//! ```text
//! ┌──────────────┬───────────────┬──────────┬────────────┬───────┬─────┬─────┐
//! │ skip: i64    │ lists: i32    │ reserved │ CONTEXT... │ BEGIN │ ... │ END │
//! └──────────────┴───────────────┴──────────┴────────────┴───────┴─────┴─────┘
//!                                                                ▲
//!                                                               mark
//! ```

use crate::error::{DecodeError, Result};
use std::sync::Arc;

/// Decoded program header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Bytes of reserved area following the header
    pub skip_bytes: u64,
    /// Number of event lists the interpreter must allocate
    pub event_lists: usize,
}

/// Immutable bytecode with a read cursor and a replay mark
#[derive(Debug, Clone)]
pub struct BytecodeProgram {
    bytes: Arc<[u8]>,
    position: usize,
    mark: usize,
}

impl BytecodeProgram {
    /// Wrap assembled bytes; the cursor starts at 0
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            position: 0,
            mark: 0,
        }
    }

    /// Shared byte storage
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Current cursor offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// True while unread bytes remain
    pub fn has_remaining(&self) -> bool {
        self.position < self.bytes.len()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Record the current position as the replay point
    pub fn mark(&mut self) {
        self.mark = self.position;
    }

    /// Offset recorded by the last [`mark`](Self::mark)
    pub fn marked_position(&self) -> usize {
        self.mark
    }

    /// Move the cursor back to the mark
    pub fn reset(&mut self) {
        self.position = self.mark;
    }

    /// Move the cursor and the mark back to the first byte
    pub fn rewind(&mut self) {
        self.position = 0;
        self.mark = 0;
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let available = self.remaining();
        if available < N {
            return Err(DecodeError::Truncated {
                offset: self.position,
                needed: N,
                available,
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.position..self.position + N]);
        self.position += N;
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.take::<1>().map(|b| b[0])
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        self.take::<8>().map(i64::from_le_bytes)
    }

    /// Read an i32 that must be non-negative
    pub fn get_index(&mut self, field: &'static str) -> Result<u32> {
        let offset = self.position;
        let value = self.get_i32()?;
        u32::try_from(value).map_err(|_| DecodeError::NegativeOperand {
            field,
            value: value as i64,
            offset,
        })
    }

    /// Read an i64 that must be non-negative
    pub fn get_size(&mut self, field: &'static str) -> Result<u64> {
        let offset = self.position;
        let value = self.get_i64()?;
        u64::try_from(value).map_err(|_| DecodeError::NegativeOperand { field, value, offset })
    }

    /// Read an event-list operand where -1 means "no list"
    pub fn get_event_list(&mut self) -> Result<Option<u32>> {
        let offset = self.position;
        match self.get_i32()? {
            -1 => Ok(None),
            value if value >= 0 => Ok(Some(value as u32)),
            value => Err(DecodeError::NegativeOperand {
                field: "event list",
                value: value as i64,
                offset,
            }),
        }
    }

    /// Advance the cursor without decoding
    pub fn skip(&mut self, count: usize) -> Result<()> {
        let available = self.remaining();
        if available < count {
            return Err(DecodeError::Truncated {
                offset: self.position,
                needed: count,
                available,
            });
        }
        self.position += count;
        Ok(())
    }

    /// Decode the header at the start of the stream and step over the
    /// reserved area
    pub fn read_header(&mut self) -> Result<Header> {
        self.rewind();
        let skip_bytes = self.get_size("header skip length")?;
        let event_lists = self.get_index("event list count")? as usize;
        let skip = usize::try_from(skip_bytes).map_err(|_| DecodeError::Truncated {
            offset: self.position,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        self.skip(skip)?;
        Ok(Header {
            skip_bytes,
            event_lists,
        })
    }
}

// ================================================================================================
// Tests
// ================================================================================================
