//! Bytecode assembler
//!
//! [`BytecodeBuilder`] encodes instructions handed to it into the binary
//! layout the interpreter replays. It does not decide what to emit.
//!
//! # Example
//!
//! ```
//! use xpuvm_bytecode::{BytecodeBuilder, LaunchArg};
//!
//! let program = BytecodeBuilder::new()
//!     .context(0)
//!     .begin()
//!     .alloc(0, &[0, 1])
//!     .transfer_h2d_once(0, Some(0), 0, 0)
//!     .launch(0, 0, Some(0), 0, 0, &[LaunchArg::Reference(0), LaunchArg::Reference(1)])
//!     .add_dependency(Some(1))
//!     .transfer_d2h_blocking(1, Some(1), 0, 0)
//!     .dealloc(0)
//!     .dealloc(1)
//!     .end()
//!     .finish();
//!
//! assert!(program.len() > 12);
//! ```

use crate::instruction::{Instruction, Launch, LaunchArg, Transfer};
use crate::reader::BytecodeProgram;

/// Builder that accumulates encoded instructions behind a header
#[derive(Debug, Clone, Default)]
pub struct BytecodeBuilder {
    body: Vec<u8>,
    reserved: Vec<u8>,
    event_lists: usize,
    instructions: usize,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare at least `count` event lists in the header
    ///
    /// The header count is also raised automatically to cover every list an
    /// emitted instruction names.
    pub fn event_lists(mut self, count: usize) -> Self {
        self.event_lists = self.event_lists.max(count);
        self
    }

    /// Bytes placed in the reserved area after the header
    pub fn reserved(mut self, bytes: &[u8]) -> Self {
        self.reserved = bytes.to_vec();
        self
    }

    /// Append an already-built instruction
    pub fn push(mut self, instruction: Instruction) -> Self {
        if let Some(list) = instruction.event_list() {
            self.event_lists = self.event_lists.max(list as usize + 1);
        }
        instruction.encode(&mut self.body);
        self.instructions += 1;
        self
    }

    pub fn context(self, device: u32) -> Self {
        self.push(Instruction::Context { device })
    }

    pub fn begin(self) -> Self {
        self.push(Instruction::Begin)
    }

    pub fn end(self) -> Self {
        self.push(Instruction::End)
    }

    pub fn alloc(self, batch_size: u64, objects: &[u32]) -> Self {
        self.push(Instruction::Alloc {
            batch_size,
            objects: objects.to_vec(),
        })
    }

    pub fn dealloc(self, object: u32) -> Self {
        self.push(Instruction::Dealloc { object })
    }

    pub fn transfer_h2d_once(self, object: u32, event_list: Option<u32>, offset: u64, batch_size: u64) -> Self {
        self.push(Instruction::TransferH2dOnce(Transfer {
            object,
            event_list,
            offset,
            batch_size,
        }))
    }

    pub fn transfer_h2d_always(self, object: u32, event_list: Option<u32>, offset: u64, batch_size: u64) -> Self {
        self.push(Instruction::TransferH2dAlways(Transfer {
            object,
            event_list,
            offset,
            batch_size,
        }))
    }

    pub fn transfer_d2h_always(self, object: u32, event_list: Option<u32>, offset: u64, batch_size: u64) -> Self {
        self.push(Instruction::TransferD2hAlways(Transfer {
            object,
            event_list,
            offset,
            batch_size,
        }))
    }

    pub fn transfer_d2h_blocking(self, object: u32, event_list: Option<u32>, offset: u64, batch_size: u64) -> Self {
        self.push(Instruction::TransferD2hAlwaysBlocking(Transfer {
            object,
            event_list,
            offset,
            batch_size,
        }))
    }

    pub fn launch(
        self,
        call_wrapper: u32,
        task: u32,
        event_list: Option<u32>,
        offset: u64,
        batch_threads: u64,
        args: &[LaunchArg],
    ) -> Self {
        self.push(Instruction::Launch(Launch {
            call_wrapper,
            task,
            event_list,
            offset,
            batch_threads,
            args: args.to_vec(),
        }))
    }

    pub fn add_dependency(self, event_list: Option<u32>) -> Self {
        self.push(Instruction::AddDependency { event_list })
    }

    pub fn on_device(self, object: u32) -> Self {
        self.push(Instruction::OnDevice { object })
    }

    pub fn barrier(self, event_list: Option<u32>) -> Self {
        self.push(Instruction::Barrier { event_list })
    }

    /// Number of instructions emitted so far
    pub fn instruction_count(&self) -> usize {
        self.instructions
    }

    /// Header plus body as raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(12 + self.reserved.len() + self.body.len());
        bytes.extend_from_slice(&(self.reserved.len() as i64).to_le_bytes());
        bytes.extend_from_slice(&(self.event_lists as i32).to_le_bytes());
        bytes.extend_from_slice(&self.reserved);
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Finish into a replayable program
    pub fn finish(self) -> BytecodeProgram {
        BytecodeProgram::new(self.into_bytes())
    }
}

// ================================================================================================
// Tests
// ================================================================================================
