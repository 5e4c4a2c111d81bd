//! Backend trait for device execution
//!
//! This trait is the contract the interpreter drives. A backend owns one
//! physical (or simulated) device: its memory, its command queue and its
//! compiled kernels.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Interpreter                         │
//! │   ALLOC / DEALLOC / TRANSFER_* / LAUNCH / BARRIER / END  │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │  Backend trait
//!         ┌─────────────┼─────────────┬─────────────┐
//!         ▼             ▼             ▼             ▼
//!   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐
//!   │   CPU   │  │  OpenCL │  │   PTX   │  │  SPIR-V │
//!   │ Backend │  │ Backend │  │ Backend │  │ Backend │
//!   └─────────┘  └─────────┘  └─────────┘  └─────────┘
//! ```
//!
//! # Event Model
//!
//! Every enqueued command returns an [`EventHandle`]. Commands may run
//! asynchronously; a command waits for the events in its wait list before
//! starting. An empty wait list relies on the queue's FIFO order.

use super::task::{CompileRequest, TaskMeta};
use super::types::{
    AllocationRequest, ArgsFrame, DeviceBuffer, DeviceInfo, EventHandle, EventProfile, InstalledCode, LaunchConfig,
    TransferRange,
};
use crate::error::Result;
use crate::object::HostObject;
use parking_lot::RwLock;
use std::sync::Arc;

/// Device shared between interpreters and execution plans
pub type DeviceRef = Arc<RwLock<Box<dyn Backend + Send + Sync>>>;

/// Backend trait for device execution
///
/// # Usage
///
/// ```rust
/// use xpuvm_backends::{AccessMode, AllocationRequest, Backend, CpuBackend, HostObject, TransferRange};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut backend = CpuBackend::new();
/// backend.ensure_loaded()?;
///
/// let object = HostObject::array(&[1.0f32, 2.0, 3.0, 4.0]);
/// let buffers = backend.allocate(&[AllocationRequest {
///     object: 0,
///     size: object.byte_size(),
///     access: AccessMode::ReadWrite,
/// }])?;
///
/// let events = backend.stream_in(&object, &buffers[0], TransferRange::full(16), &[])?;
/// backend.wait_events(&events)?;
///
/// let mut result = HostObject::array(&[0.0f32; 4]);
/// backend.stream_out_blocking(&mut result, &buffers[0], TransferRange::full(16), &[])?;
/// assert_eq!(result, object);
///
/// backend.deallocate(buffers[0])?;
/// # Ok(())
/// # }
/// ```
pub trait Backend {
    // ============================================================================================
    // Device
    // ============================================================================================

    /// Static description of the device
    fn device_info(&self) -> DeviceInfo;

    /// Initialize the device context if it is not yet initialized
    ///
    /// Called once per CONTEXT declaration of a program.
    fn ensure_loaded(&mut self) -> Result<()>;

    /// Drop every buffer, event and compiled binary
    ///
    /// Increments [`reset_epoch`](Self::reset_epoch).
    fn reset(&mut self) -> Result<()>;

    /// Number of resets performed so far
    fn reset_epoch(&self) -> u64;

    // ============================================================================================
    // Memory
    // ============================================================================================

    /// Allocate one buffer per request in a single device call
    ///
    /// # Errors
    ///
    /// Returns `OutOfDeviceMemory` when the device cannot hold all of them;
    /// nothing is allocated in that case.
    fn allocate(&mut self, requests: &[AllocationRequest]) -> Result<Vec<DeviceBuffer>>;

    /// Free a buffer, returning the number of bytes released
    fn deallocate(&mut self, buffer: DeviceBuffer) -> Result<u64>;

    // ============================================================================================
    // Transfers
    // ============================================================================================

    /// Copy `range` of the host object into the start of `buffer`
    ///
    /// Returns the events of the enqueued copies.
    fn stream_in(
        &mut self,
        object: &HostObject,
        buffer: &DeviceBuffer,
        range: TransferRange,
        wait: &[EventHandle],
    ) -> Result<Vec<EventHandle>>;

    /// Copy the start of `buffer` back into `range` of the host object
    fn stream_out(
        &mut self,
        object: &mut HostObject,
        buffer: &DeviceBuffer,
        range: TransferRange,
        wait: &[EventHandle],
    ) -> Result<EventHandle>;

    /// [`stream_out`](Self::stream_out) followed by a wait on its event
    fn stream_out_blocking(
        &mut self,
        object: &mut HostObject,
        buffer: &DeviceBuffer,
        range: TransferRange,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let event = self.stream_out(object, buffer, range, wait)?;
        self.wait_events(&[event])?;
        Ok(event)
    }

    // ============================================================================================
    // Kernels
    // ============================================================================================

    /// Compile (or fetch) the binary for a task
    ///
    /// # Errors
    ///
    /// - `CompilationFailed` when the kernel cannot be built
    /// - `Unsupported` when the task needs a missing device feature
    fn install_code(&mut self, request: &CompileRequest<'_>) -> Result<InstalledCode>;

    /// Whether the compiled kernel writes the loop index into an output
    fn loop_index_in_write(&self, task: &TaskMeta) -> bool;

    /// Create or reuse the atomics buffer and enqueue a write of `values`
    fn write_atomics(&mut self, values: &[i32], wait: &[EventHandle]) -> Result<(DeviceBuffer, Vec<EventHandle>)>;

    /// Dispatch a compiled kernel
    fn launch(
        &mut self,
        code: &InstalledCode,
        frame: &ArgsFrame,
        atomics: Option<&DeviceBuffer>,
        config: &LaunchConfig,
        global_offset: u64,
        wait: &[EventHandle],
    ) -> Result<EventHandle>;

    // ============================================================================================
    // Synchronization
    // ============================================================================================

    /// Enqueue a marker completing after `wait`, or after all prior work
    /// when `wait` is empty
    fn enqueue_marker(&mut self, wait: &[EventHandle]) -> Result<EventHandle>;

    /// Status and timestamps of an event
    fn resolve_event(&self, event: EventHandle) -> Result<EventProfile>;

    /// Block the host until every event completes
    fn wait_events(&mut self, events: &[EventHandle]) -> Result<()>;

    /// Submit queued commands to the device
    fn flush(&mut self) -> Result<()>;

    // ============================================================================================
    // Type Introspection
    // ============================================================================================

    /// Downcast backend to &dyn Any for type-specific access
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast backend to &mut dyn Any for type-specific access
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
