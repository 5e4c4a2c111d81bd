//! Error types for backend operations

use std::fmt;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur during backend execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Invalid buffer handle
    #[error("invalid buffer handle: {0}")]
    InvalidBufferHandle(u64),

    /// Buffer access out of bounds
    #[error("buffer access out of bounds: offset {offset} + size {size} > buffer size {buffer_size}")]
    BufferOutOfBounds {
        offset: usize,
        size: usize,
        buffer_size: usize,
    },

    /// Invalid event handle
    #[error("invalid event handle: {0}")]
    InvalidEvent(u64),

    /// Installed code rejected at launch
    #[error("invalid installed code {id} for kernel '{kernel}'")]
    InvalidCode { id: u64, kernel: String },

    /// Kernel compilation failed
    #[error("compilation of '{kernel}' failed: {reason}")]
    CompilationFailed { kernel: String, reason: String },

    /// Device lacks a required feature
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// Device memory exhausted
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfDeviceMemory { requested: u64, available: u64 },

    /// Type mismatch
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Kernel argument slot does not hold what the kernel asked for
    #[error("invalid kernel argument {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },

    /// Execution error
    #[error("execution error: {0}")]
    ExecutionError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a compilation failure
    pub fn compilation(kernel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            kernel: kernel.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported feature error
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported(feature.into())
    }

    /// Create an execution error
    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::ExecutionError(msg.into())
    }

    pub(crate) fn argument(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            index,
            reason: reason.into(),
        }
    }
}
