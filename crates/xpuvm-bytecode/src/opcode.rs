//! Opcode and argument-tag byte values

use serde::{Deserialize, Serialize};
use std::fmt;

/// One-byte operation codes of the device bytecode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Alloc = 0x10,
    Dealloc = 0x11,
    TransferH2dOnce = 0x12,
    TransferH2dAlways = 0x13,
    TransferD2hAlways = 0x14,
    TransferD2hAlwaysBlocking = 0x15,
    Launch = 0x16,
    AddDependency = 0x17,
    OnDevice = 0x18,
    Barrier = 0x19,
    Context = 0x1A,
    Begin = 0x1B,
    End = 0x1C,
}

impl Opcode {
    /// All opcodes in byte order
    pub const ALL: [Opcode; 13] = [
        Opcode::Alloc,
        Opcode::Dealloc,
        Opcode::TransferH2dOnce,
        Opcode::TransferH2dAlways,
        Opcode::TransferD2hAlways,
        Opcode::TransferD2hAlwaysBlocking,
        Opcode::Launch,
        Opcode::AddDependency,
        Opcode::OnDevice,
        Opcode::Barrier,
        Opcode::Context,
        Opcode::Begin,
        Opcode::End,
    ];

    /// Encoded byte
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Decode a byte, `None` when it is not an opcode
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x10 => Opcode::Alloc,
            0x11 => Opcode::Dealloc,
            0x12 => Opcode::TransferH2dOnce,
            0x13 => Opcode::TransferH2dAlways,
            0x14 => Opcode::TransferD2hAlways,
            0x15 => Opcode::TransferD2hAlwaysBlocking,
            0x16 => Opcode::Launch,
            0x17 => Opcode::AddDependency,
            0x18 => Opcode::OnDevice,
            0x19 => Opcode::Barrier,
            0x1A => Opcode::Context,
            0x1B => Opcode::Begin,
            0x1C => Opcode::End,
            _ => return None,
        })
    }

    /// Listing mnemonic
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Alloc => "ALLOC",
            Opcode::Dealloc => "DEALLOC",
            Opcode::TransferH2dOnce => "TRANSFER_HOST_TO_DEVICE_ONCE",
            Opcode::TransferH2dAlways => "TRANSFER_HOST_TO_DEVICE_ALWAYS",
            Opcode::TransferD2hAlways => "TRANSFER_DEVICE_TO_HOST_ALWAYS",
            Opcode::TransferD2hAlwaysBlocking => "TRANSFER_DEVICE_TO_HOST_ALWAYS_BLOCKING",
            Opcode::Launch => "LAUNCH",
            Opcode::AddDependency => "ADD_DEPENDENCY",
            Opcode::OnDevice => "ON_DEVICE",
            Opcode::Barrier => "BARRIER",
            Opcode::Context => "CONTEXT",
            Opcode::Begin => "BEGIN",
            Opcode::End => "END",
        }
    }

    /// True for the four transfer opcodes
    pub const fn is_transfer(self) -> bool {
        matches!(
            self,
            Opcode::TransferH2dOnce
                | Opcode::TransferH2dAlways
                | Opcode::TransferD2hAlways
                | Opcode::TransferD2hAlwaysBlocking
        )
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::from_byte(byte).ok_or(byte)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Tag preceding every LAUNCH argument
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentTag {
    /// Index into the constants table
    PushConstant = 0x20,
    /// Index into the object table
    PushReference = 0x21,
}

impl ArgumentTag {
    pub const fn byte(self) -> u8 {
        self as u8
    }

    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x20 => Some(ArgumentTag::PushConstant),
            0x21 => Some(ArgumentTag::PushReference),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_bytes_are_contiguous() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.byte(), 0x10 + i as u8);
            assert_eq!(Opcode::from_byte(op.byte()), Some(*op));
        }
    }

    #[test]
    fn test_unknown_bytes() {
        assert_eq!(Opcode::from_byte(0x00), None);
        assert_eq!(Opcode::from_byte(0x1D), None);
        assert_eq!(Opcode::try_from(0xFF), Err(0xFF));
        assert_eq!(ArgumentTag::from_byte(0x22), None);
    }

    #[test]
    fn test_argument_tags_do_not_collide_with_opcodes() {
        for tag in [ArgumentTag::PushConstant, ArgumentTag::PushReference] {
            assert!(Opcode::from_byte(tag.byte()).is_none());
        }
    }

    #[test]
    fn test_transfer_classification() {
        assert!(Opcode::TransferD2hAlwaysBlocking.is_transfer());
        assert!(!Opcode::Launch.is_transfer());
        assert_eq!(Opcode::Barrier.to_string(), "BARRIER");
    }
}
