//! Backend trait and types for device execution

mod task;
mod traits;
mod types;

pub use task::{CompileRequest, TaskMeta};
pub use traits::{Backend, DeviceRef};
pub use types::{
    AccessMode, AllocationRequest, ArgsFrame, BlockDim, BufferHandle, DeviceBuffer, DeviceInfo, EventHandle,
    EventProfile, EventStatus, GridDim, InstalledCode, KernelArg, LaunchConfig, TransferRange,
};
