//! Decoded instruction forms
//!
//! [`Instruction::decode`] consumes exactly one opcode and all of its operands
//! from a [`BytecodeProgram`]; [`Instruction::encode`] writes the same layout
//! back. The `Display` impl produces the one-line listing used when bytecode
//! tracing is enabled.

use crate::error::{DecodeError, Result};
use crate::opcode::{ArgumentTag, Opcode};
use crate::reader::BytecodeProgram;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operands shared by the four transfer opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Object table index
    pub object: u32,
    /// Event list supplying the wait list, `None` for -1
    pub event_list: Option<u32>,
    /// Byte offset into the host object
    pub offset: u64,
    /// Batch size in bytes, 0 for the whole object
    pub batch_size: u64,
}

/// A LAUNCH argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaunchArg {
    /// Index into the constants table
    Constant(u32),
    /// Index into the object table
    Reference(u32),
}

impl LaunchArg {
    pub fn tag(self) -> ArgumentTag {
        match self {
            LaunchArg::Constant(_) => ArgumentTag::PushConstant,
            LaunchArg::Reference(_) => ArgumentTag::PushReference,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            LaunchArg::Constant(i) | LaunchArg::Reference(i) => i,
        }
    }
}

impl fmt::Display for LaunchArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchArg::Constant(i) => write!(f, "const[{}]", i),
            LaunchArg::Reference(i) => write!(f, "obj[{}]", i),
        }
    }
}

/// Operands of a LAUNCH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Launch {
    /// Slot of the cached argument frame
    pub call_wrapper: u32,
    /// Task table index
    pub task: u32,
    pub event_list: Option<u32>,
    /// Global offset of this batch
    pub offset: u64,
    /// Thread count of this batch, 0 when not batched
    pub batch_threads: u64,
    pub args: Vec<LaunchArg>,
}

/// One decoded bytecode instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Alloc { batch_size: u64, objects: Vec<u32> },
    Dealloc { object: u32 },
    TransferH2dOnce(Transfer),
    TransferH2dAlways(Transfer),
    TransferD2hAlways(Transfer),
    TransferD2hAlwaysBlocking(Transfer),
    Launch(Launch),
    AddDependency { event_list: Option<u32> },
    OnDevice { object: u32 },
    Barrier { event_list: Option<u32> },
    Context { device: u32 },
    Begin,
    End,
}

fn read_transfer(program: &mut BytecodeProgram) -> Result<Transfer> {
    Ok(Transfer {
        object: program.get_index("object index")?,
        event_list: program.get_event_list()?,
        offset: program.get_size("offset")?,
        batch_size: program.get_size("batch size")?,
    })
}

fn read_launch(program: &mut BytecodeProgram) -> Result<Launch> {
    let call_wrapper = program.get_index("call wrapper index")?;
    let task = program.get_index("task index")?;
    let num_args = program.get_index("argument count")?;
    let event_list = program.get_event_list()?;
    let offset = program.get_size("offset")?;
    let batch_threads = program.get_size("batch threads")?;

    let mut args = Vec::with_capacity((num_args as usize).min(program.remaining() / 5));
    for _ in 0..num_args {
        let tag_offset = program.position();
        let byte = program.get_u8()?;
        let tag = ArgumentTag::from_byte(byte).ok_or(DecodeError::UnknownArgumentTag {
            byte,
            offset: tag_offset,
        })?;
        let index = program.get_index("argument index")?;
        args.push(match tag {
            ArgumentTag::PushConstant => LaunchArg::Constant(index),
            ArgumentTag::PushReference => LaunchArg::Reference(index),
        });
    }

    Ok(Launch {
        call_wrapper,
        task,
        event_list,
        offset,
        batch_threads,
        args,
    })
}

fn event_list_operand(list: Option<u32>) -> i32 {
    list.map_or(-1, |l| l as i32)
}

impl Instruction {
    /// Decode the instruction at the program cursor
    pub fn decode(program: &mut BytecodeProgram) -> Result<Self> {
        let offset = program.position();
        let byte = program.get_u8()?;
        let opcode = Opcode::from_byte(byte).ok_or(DecodeError::UnknownOpcode { byte, offset })?;

        Ok(match opcode {
            Opcode::Alloc => {
                let batch_size = program.get_size("batch size")?;
                let count = program.get_index("argument count")?;
                let mut objects = Vec::with_capacity((count as usize).min(program.remaining() / 4));
                for _ in 0..count {
                    objects.push(program.get_index("object index")?);
                }
                Instruction::Alloc { batch_size, objects }
            }
            Opcode::Dealloc => Instruction::Dealloc {
                object: program.get_index("object index")?,
            },
            Opcode::TransferH2dOnce => Instruction::TransferH2dOnce(read_transfer(program)?),
            Opcode::TransferH2dAlways => Instruction::TransferH2dAlways(read_transfer(program)?),
            Opcode::TransferD2hAlways => Instruction::TransferD2hAlways(read_transfer(program)?),
            Opcode::TransferD2hAlwaysBlocking => Instruction::TransferD2hAlwaysBlocking(read_transfer(program)?),
            Opcode::Launch => Instruction::Launch(read_launch(program)?),
            Opcode::AddDependency => Instruction::AddDependency {
                event_list: program.get_event_list()?,
            },
            Opcode::OnDevice => Instruction::OnDevice {
                object: program.get_index("object index")?,
            },
            Opcode::Barrier => Instruction::Barrier {
                event_list: program.get_event_list()?,
            },
            Opcode::Context => Instruction::Context {
                device: program.get_index("device index")?,
            },
            Opcode::Begin => Instruction::Begin,
            Opcode::End => Instruction::End,
        })
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Alloc { .. } => Opcode::Alloc,
            Instruction::Dealloc { .. } => Opcode::Dealloc,
            Instruction::TransferH2dOnce(_) => Opcode::TransferH2dOnce,
            Instruction::TransferH2dAlways(_) => Opcode::TransferH2dAlways,
            Instruction::TransferD2hAlways(_) => Opcode::TransferD2hAlways,
            Instruction::TransferD2hAlwaysBlocking(_) => Opcode::TransferD2hAlwaysBlocking,
            Instruction::Launch(_) => Opcode::Launch,
            Instruction::AddDependency { .. } => Opcode::AddDependency,
            Instruction::OnDevice { .. } => Opcode::OnDevice,
            Instruction::Barrier { .. } => Opcode::Barrier,
            Instruction::Context { .. } => Opcode::Context,
            Instruction::Begin => Opcode::Begin,
            Instruction::End => Opcode::End,
        }
    }

    /// Append the binary form to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode().byte());
        match self {
            Instruction::Alloc { batch_size, objects } => {
                out.extend_from_slice(&(*batch_size as i64).to_le_bytes());
                out.extend_from_slice(&(objects.len() as i32).to_le_bytes());
                for object in objects {
                    out.extend_from_slice(&(*object as i32).to_le_bytes());
                }
            }
            Instruction::Dealloc { object } | Instruction::OnDevice { object } => {
                out.extend_from_slice(&(*object as i32).to_le_bytes());
            }
            Instruction::TransferH2dOnce(t)
            | Instruction::TransferH2dAlways(t)
            | Instruction::TransferD2hAlways(t)
            | Instruction::TransferD2hAlwaysBlocking(t) => {
                out.extend_from_slice(&(t.object as i32).to_le_bytes());
                out.extend_from_slice(&event_list_operand(t.event_list).to_le_bytes());
                out.extend_from_slice(&(t.offset as i64).to_le_bytes());
                out.extend_from_slice(&(t.batch_size as i64).to_le_bytes());
            }
            Instruction::Launch(launch) => {
                out.extend_from_slice(&(launch.call_wrapper as i32).to_le_bytes());
                out.extend_from_slice(&(launch.task as i32).to_le_bytes());
                out.extend_from_slice(&(launch.args.len() as i32).to_le_bytes());
                out.extend_from_slice(&event_list_operand(launch.event_list).to_le_bytes());
                out.extend_from_slice(&(launch.offset as i64).to_le_bytes());
                out.extend_from_slice(&(launch.batch_threads as i64).to_le_bytes());
                for arg in &launch.args {
                    out.push(arg.tag().byte());
                    out.extend_from_slice(&(arg.index() as i32).to_le_bytes());
                }
            }
            Instruction::AddDependency { event_list } | Instruction::Barrier { event_list } => {
                out.extend_from_slice(&event_list_operand(*event_list).to_le_bytes());
            }
            Instruction::Context { device } => {
                out.extend_from_slice(&(*device as i32).to_le_bytes());
            }
            Instruction::Begin | Instruction::End => {}
        }
    }

    /// Event list this instruction reads or writes, if any
    pub fn event_list(&self) -> Option<u32> {
        match self {
            Instruction::TransferH2dOnce(t)
            | Instruction::TransferH2dAlways(t)
            | Instruction::TransferD2hAlways(t)
            | Instruction::TransferD2hAlwaysBlocking(t) => t.event_list,
            Instruction::Launch(launch) => launch.event_list,
            Instruction::AddDependency { event_list } | Instruction::Barrier { event_list } => *event_list,
            _ => None,
        }
    }
}

struct ListOperand(Option<u32>);

impl fmt::Display for ListOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(list) => write!(f, "{}", list),
            None => f.write_str("-"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        match self {
            Instruction::Alloc { batch_size, objects } => {
                write!(f, "{} batch={} objects={:?}", op, batch_size, objects)
            }
            Instruction::Dealloc { object } | Instruction::OnDevice { object } => write!(f, "{} obj[{}]", op, object),
            Instruction::TransferH2dOnce(t)
            | Instruction::TransferH2dAlways(t)
            | Instruction::TransferD2hAlways(t)
            | Instruction::TransferD2hAlwaysBlocking(t) => write!(
                f,
                "{} obj[{}] list={} offset={} batch={}",
                op,
                t.object,
                ListOperand(t.event_list),
                t.offset,
                t.batch_size
            ),
            Instruction::Launch(launch) => {
                write!(
                    f,
                    "{} task[{}] wrapper={} list={} offset={} threads={} args=[",
                    op,
                    launch.task,
                    launch.call_wrapper,
                    ListOperand(launch.event_list),
                    launch.offset,
                    launch.batch_threads
                )?;
                for (i, arg) in launch.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str("]")
            }
            Instruction::AddDependency { event_list } | Instruction::Barrier { event_list } => {
                write!(f, "{} list={}", op, ListOperand(*event_list))
            }
            Instruction::Context { device } => write!(f, "{} device={}", op, device),
            Instruction::Begin | Instruction::End => write!(f, "{}", op),
        }
    }
}

/// Decode a whole program into `(offset, instruction)` pairs, header first
///
/// Decoding stops after END. Used for listings; the interpreter decodes
/// incrementally instead.
pub fn disassemble(program: &BytecodeProgram) -> Result<Vec<(usize, Instruction)>> {
    let mut cursor = program.clone();
    cursor.read_header()?;
    let mut listing = Vec::new();
    while cursor.has_remaining() {
        let offset = cursor.position();
        let instruction = Instruction::decode(&mut cursor)?;
        let done = instruction == Instruction::End;
        listing.push((offset, instruction));
        if done {
            break;
        }
    }
    Ok(listing)
}

// ================================================================================================
// Tests
// ================================================================================================
