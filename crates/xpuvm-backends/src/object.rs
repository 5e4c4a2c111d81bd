//! Host-side logical objects
//!
//! Programs refer to objects by their index in the execution context's
//! object table. An object is one of:
//!
//! - an array ([`HostArray`]): element type plus little-endian bytes
//! - a scalar box ([`ScalarValue`])
//! - the kernel-context marker, which occupies no device memory
//!
//! Objects are shared between the caller and the interpreter as
//! [`ObjectRef`] so results written back by device-to-host transfers are
//! visible to the caller.

use crate::error::{BackendError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Element types with their fixed device sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    I8,
    Char,
    I16,
    I32,
    F32,
    I64,
    F64,
}

impl ElementType {
    /// Size in bytes
    pub const fn size(self) -> usize {
        match self {
            ElementType::I8 => 1,
            ElementType::Char | ElementType::I16 => 2,
            ElementType::I32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::F64 => 8,
        }
    }

    /// True when the device must support double precision
    pub const fn requires_fp64(self) -> bool {
        matches!(self, ElementType::F64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::I8 => "i8",
            ElementType::Char => "char",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::F32 => "f32",
            ElementType::I64 => "i64",
            ElementType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Rust types that can back a [`HostArray`]
pub trait Element: bytemuck::Pod {
    const TYPE: ElementType;
}

impl Element for i8 {
    const TYPE: ElementType = ElementType::I8;
}
impl Element for u16 {
    const TYPE: ElementType = ElementType::Char;
}
impl Element for i16 {
    const TYPE: ElementType = ElementType::I16;
}
impl Element for i32 {
    const TYPE: ElementType = ElementType::I32;
}
impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;
}
impl Element for i64 {
    const TYPE: ElementType = ElementType::I64;
}
impl Element for f64 {
    const TYPE: ElementType = ElementType::F64;
}

/// Typed array stored as little-endian bytes
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray {
    element: ElementType,
    bytes: Vec<u8>,
}

impl HostArray {
    /// Zero-filled array of `len` elements
    pub fn zeroed(element: ElementType, len: usize) -> Self {
        Self {
            element,
            bytes: vec![0; len * element.size()],
        }
    }

    pub fn from_slice<T: Element>(data: &[T]) -> Self {
        Self {
            element: T::TYPE,
            bytes: bytemuck::cast_slice::<T, u8>(data).to_vec(),
        }
    }

    /// Copy the contents out as `T`
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::TYPE != self.element {
            return Err(BackendError::type_mismatch(self.element, T::TYPE));
        }
        Ok(bytemuck::allocation::pod_collect_to_vec::<u8, T>(&self.bytes))
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.bytes.len() / self.element.size()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Boxed scalar value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    I8(i8),
    Char(u16),
    I16(i16),
    I32(i32),
    F32(f32),
    I64(i64),
    F64(f64),
}

impl ScalarValue {
    pub fn element_type(&self) -> ElementType {
        match self {
            ScalarValue::I8(_) => ElementType::I8,
            ScalarValue::Char(_) => ElementType::Char,
            ScalarValue::I16(_) => ElementType::I16,
            ScalarValue::I32(_) => ElementType::I32,
            ScalarValue::F32(_) => ElementType::F32,
            ScalarValue::I64(_) => ElementType::I64,
            ScalarValue::F64(_) => ElementType::F64,
        }
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        match *self {
            ScalarValue::I8(v) => v.to_le_bytes().to_vec(),
            ScalarValue::Char(v) => v.to_le_bytes().to_vec(),
            ScalarValue::I16(v) => v.to_le_bytes().to_vec(),
            ScalarValue::I32(v) => v.to_le_bytes().to_vec(),
            ScalarValue::F32(v) => v.to_le_bytes().to_vec(),
            ScalarValue::I64(v) => v.to_le_bytes().to_vec(),
            ScalarValue::F64(v) => v.to_le_bytes().to_vec(),
        }
    }

    /// Rebuild a scalar of `element` type from its little-endian bytes
    pub fn from_le_bytes(element: ElementType, bytes: &[u8]) -> Option<Self> {
        Some(match element {
            ElementType::I8 => ScalarValue::I8(i8::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::Char => ScalarValue::Char(u16::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::I16 => ScalarValue::I16(i16::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::I32 => ScalarValue::I32(i32::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::F32 => ScalarValue::F32(f32::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::I64 => ScalarValue::I64(i64::from_le_bytes(bytes.try_into().ok()?)),
            ElementType::F64 => ScalarValue::F64(f64::from_le_bytes(bytes.try_into().ok()?)),
        })
    }

    /// Integer view used for thread counts and loop bounds
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ScalarValue::I8(v) => Some(v as i64),
            ScalarValue::Char(v) => Some(v as i64),
            ScalarValue::I16(v) => Some(v as i64),
            ScalarValue::I32(v) => Some(v as i64),
            ScalarValue::I64(v) => Some(v),
            ScalarValue::F32(_) | ScalarValue::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            ScalarValue::I8(v) => v as f64,
            ScalarValue::Char(v) => v as f64,
            ScalarValue::I16(v) => v as f64,
            ScalarValue::I32(v) => v as f64,
            ScalarValue::F32(v) => v as f64,
            ScalarValue::I64(v) => v as f64,
            ScalarValue::F64(v) => v,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::I8(v) => write!(f, "{}:i8", v),
            ScalarValue::Char(v) => write!(f, "{}:char", v),
            ScalarValue::I16(v) => write!(f, "{}:i16", v),
            ScalarValue::I32(v) => write!(f, "{}:i32", v),
            ScalarValue::F32(v) => write!(f, "{}:f32", v),
            ScalarValue::I64(v) => write!(f, "{}:i64", v),
            ScalarValue::F64(v) => write!(f, "{}:f64", v),
        }
    }
}

/// A logical object referenced by bytecode
#[derive(Debug, Clone, PartialEq)]
pub enum HostObject {
    Array(HostArray),
    Scalar(ScalarValue),
    /// Marker standing for the kernel execution context
    KernelContext,
}

/// Shared handle to a host object
pub type ObjectRef = Arc<RwLock<HostObject>>;

impl HostObject {
    pub fn array<T: Element>(data: &[T]) -> Self {
        HostObject::Array(HostArray::from_slice(data))
    }

    /// Wrap into a shareable [`ObjectRef`]
    pub fn into_ref(self) -> ObjectRef {
        Arc::new(RwLock::new(self))
    }

    /// Bytes this object needs on the device
    pub fn byte_size(&self) -> u64 {
        match self {
            HostObject::Array(array) => array.byte_size() as u64,
            HostObject::Scalar(value) => value.element_type().size() as u64,
            HostObject::KernelContext => 0,
        }
    }

    pub fn is_kernel_context(&self) -> bool {
        matches!(self, HostObject::KernelContext)
    }

    pub fn element_type(&self) -> Option<ElementType> {
        match self {
            HostObject::Array(array) => Some(array.element()),
            HostObject::Scalar(value) => Some(value.element_type()),
            HostObject::KernelContext => None,
        }
    }

    pub fn requires_fp64(&self) -> bool {
        self.element_type().is_some_and(ElementType::requires_fp64)
    }

    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            HostObject::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut HostArray> {
        match self {
            HostObject::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Host bytes as they are laid out on the device
    pub fn host_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            HostObject::Array(array) => Cow::Borrowed(array.as_bytes()),
            HostObject::Scalar(value) => Cow::Owned(value.to_le_bytes()),
            HostObject::KernelContext => Cow::Borrowed(&[]),
        }
    }

    /// Copy `size` bytes starting at `offset` out of the object
    pub fn read_range(&self, offset: usize, size: usize) -> Result<Vec<u8>> {
        let bytes = self.host_bytes();
        let end = offset.checked_add(size).filter(|&end| end <= bytes.len()).ok_or(
            BackendError::BufferOutOfBounds {
                offset,
                size,
                buffer_size: bytes.len(),
            },
        )?;
        Ok(bytes[offset..end].to_vec())
    }

    /// Overwrite bytes starting at `offset`
    pub fn write_range(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let buffer_size = self.byte_size() as usize;
        let out_of_bounds = BackendError::BufferOutOfBounds {
            offset,
            size: data.len(),
            buffer_size,
        };
        if offset.checked_add(data.len()).is_none_or(|end| end > buffer_size) {
            return Err(out_of_bounds);
        }
        match self {
            HostObject::Array(array) => {
                array.as_bytes_mut()[offset..offset + data.len()].copy_from_slice(data);
                Ok(())
            }
            HostObject::Scalar(value) => {
                let mut bytes = value.to_le_bytes();
                bytes[offset..offset + data.len()].copy_from_slice(data);
                *value = ScalarValue::from_le_bytes(value.element_type(), &bytes).ok_or(out_of_bounds)?;
                Ok(())
            }
            HostObject::KernelContext => Ok(()),
        }
    }
}

impl fmt::Display for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostObject::Array(array) => write!(f, "{}[{}]", array.element(), array.len()),
            HostObject::Scalar(value) => write!(f, "{}", value),
            HostObject::KernelContext => f.write_str("kernel-context"),
        }
    }
}

// ================================================================================================
// Tests
// ================================================================================================
