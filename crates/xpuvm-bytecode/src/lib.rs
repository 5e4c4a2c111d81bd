//! Device bytecode for the xpuvm interpreter
//!
//! This crate provides:
//! - **Opcodes**: one-byte operation codes and LAUNCH argument tags
//! - **BytecodeProgram**: shared bytes with a rewindable cursor
//! - **Instruction**: fully decoded instruction forms plus a listing format
//! - **BytecodeBuilder**: assembler writing the binary layout
//! - **BatchPlan**: partitioning of oversized transfers
//!
//! # Binary Layout
//!
//! ```text
//! header   skipLength:i64  eventListCount:i32  reserved[skipLength]
//! prologue CONTEXT(deviceIndex:i32)*  BEGIN
//! body     ALLOC | DEALLOC | TRANSFER_* | LAUNCH | ADD_DEPENDENCY | ON_DEVICE | BARRIER
//! epilogue END
//! ```
//!
//! All operands are little-endian. An event-list operand of -1 means
//! "no list".

pub mod batch;
pub mod builder;
pub mod error;
pub mod instruction;
pub mod opcode;
pub mod reader;

pub use batch::{Batch, BatchPlan, Batches};
pub use builder::BytecodeBuilder;
pub use error::{DecodeError, Result};
pub use instruction::{disassemble, Instruction, Launch, LaunchArg, Transfer};
pub use opcode::{ArgumentTag, Opcode};
pub use reader::{BytecodeProgram, Header};
