//! Error types for bytecode decoding

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors raised while reading a bytecode stream
///
/// Every variant carries the byte offset where decoding stopped so callers
/// can point at the offending instruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Operand runs past the end of the stream
    #[error("truncated operand at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Byte is not a known opcode
    #[error("unknown opcode {byte:#04x} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    /// Byte is not a known LAUNCH argument tag
    #[error("unknown argument tag {byte:#04x} at offset {offset}")]
    UnknownArgumentTag { byte: u8, offset: usize },

    /// Index, count or size operand is negative
    #[error("negative {field} operand {value} at offset {offset}")]
    NegativeOperand {
        field: &'static str,
        value: i64,
        offset: usize,
    },
}

impl DecodeError {
    /// Byte offset where the error was detected
    pub fn offset(&self) -> usize {
        match self {
            Self::Truncated { offset, .. }
            | Self::UnknownOpcode { offset, .. }
            | Self::UnknownArgumentTag { offset, .. }
            | Self::NegativeOperand { offset, .. } => *offset,
        }
    }
}
