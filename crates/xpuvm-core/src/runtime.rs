//! Device registry
//!
//! A [`Runtime`] is created once at startup and handed by reference to
//! every [`ExecutionPlan`](crate::ExecutionPlan). Devices keep the index
//! they were registered under.

use crate::error::{Error, Result};
use xpuvm_backends::{device_ref, Backend, DeviceInfo, DeviceRef};

#[derive(Default)]
pub struct Runtime {
    devices: Vec<DeviceRef>,
    default_device: usize,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let devices: Vec<String> = self
            .devices
            .iter()
            .map(|d| d.read().device_info().to_string())
            .collect();
        f.debug_struct("Runtime")
            .field("devices", &devices)
            .field("default_device", &self.default_device)
            .finish()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, returning its device index
    pub fn register_device<B: Backend + Send + Sync + 'static>(&mut self, backend: B) -> usize {
        self.register_device_ref(device_ref(backend))
    }

    /// Register an already shared device
    pub fn register_device_ref(&mut self, device: DeviceRef) -> usize {
        let index = self.devices.len();
        let info = device.read().device_info();
        if info.index as usize != index {
            tracing::warn!(device = %info, index, "device reports a different index than its registry slot");
        }
        tracing::debug!(device = %info, index, "device_registered");
        self.devices.push(device);
        index
    }

    pub fn device(&self, index: usize) -> Result<DeviceRef> {
        self.devices.get(index).cloned().ok_or(Error::UnknownDevice(index))
    }

    pub fn device_info(&self, index: usize) -> Result<DeviceInfo> {
        Ok(self.device(index)?.read().device_info())
    }

    pub fn default_device_index(&self) -> usize {
        self.default_device
    }

    pub fn default_device(&self) -> Result<DeviceRef> {
        self.device(self.default_device)
    }

    pub fn set_default_device(&mut self, index: usize) -> Result<()> {
        if index >= self.devices.len() {
            return Err(Error::UnknownDevice(index));
        }
        self.default_device = index;
        Ok(())
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}
