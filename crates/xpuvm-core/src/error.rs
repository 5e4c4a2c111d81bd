//! Error types for xpuvm-core operations

use serde::{Deserialize, Serialize};
use xpuvm_backends::BackendError;
use xpuvm_bytecode::DecodeError;

/// Result type for xpuvm-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of failure callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bytecode or object tables do not describe a runnable program
    MalformedProgram,
    /// Memory limit or device memory exhausted
    ResourceExhaustion,
    /// Kernel could not be compiled ("bailout")
    CompilationFailure,
    /// Device was reset behind a warmed-up interpreter
    DeviceInconsistency,
    /// Device lacks a feature the program needs
    UnsupportedFeature,
    /// Invalid configuration value or device selection
    Configuration,
    /// Any other driver failure
    Backend,
}

/// Errors that can occur while building or running a device program
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Bytecode could not be decoded
    #[error("malformed bytecode: {0}")]
    Decode(#[from] DecodeError),

    /// Program refers to something that does not exist or is out of order
    #[error("malformed program: {0}")]
    MalformedProgram(String),

    /// More events were added to a list than it can hold
    #[error("event list {list} is too small: capacity {capacity}")]
    EventListOverflow { list: usize, capacity: usize },

    /// Memory-limit policy would be violated
    #[error("out of memory: usage {usage} + requested {requested} bytes exceeds the execution plan limit of {limit} bytes")]
    OutOfMemory { usage: u64, requested: u64, limit: u64 },

    /// Device memory exhausted
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    DeviceOutOfMemory { requested: u64, available: u64 },

    /// Kernel compilation or dispatch failed
    #[error("bailout: unable to run task '{task}': {reason}")]
    Bailout { task: String, reason: String },

    /// Device reset after warmup
    #[error("reset() was called after warmup() on device {device}")]
    DeviceReset { device: String },

    /// Missing device feature
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// Bad configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No device at the requested index
    #[error("no device registered at index {0}")]
    UnknownDevice(usize),

    /// Other backend failure
    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl Error {
    /// Create a malformed-program error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedProgram(msg.into())
    }

    /// Create a bailout error
    pub fn bailout(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Bailout {
            task: task.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Decode(_) | Error::MalformedProgram(_) | Error::EventListOverflow { .. } => {
                ErrorKind::MalformedProgram
            }
            Error::OutOfMemory { .. } | Error::DeviceOutOfMemory { .. } => ErrorKind::ResourceExhaustion,
            Error::Bailout { .. } => ErrorKind::CompilationFailure,
            Error::DeviceReset { .. } => ErrorKind::DeviceInconsistency,
            Error::Unsupported(_) => ErrorKind::UnsupportedFeature,
            Error::InvalidConfig(_) | Error::UnknownDevice(_) => ErrorKind::Configuration,
            Error::Backend(_) => ErrorKind::Backend,
        }
    }

    /// True when the same program may succeed on a different device
    pub fn is_recoverable_on_other_device(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CompilationFailure | ErrorKind::UnsupportedFeature
        )
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::CompilationFailed { kernel, reason } => Error::Bailout { task: kernel, reason },
            BackendError::Unsupported(feature) => Error::Unsupported(feature),
            BackendError::OutOfDeviceMemory { requested, available } => {
                Error::DeviceOutOfMemory { requested, available }
            }
            other => Error::Backend(other),
        }
    }
}
