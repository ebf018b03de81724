//! # OS Idle Framework Interface
//!
//! What the driver needs from the generic idle framework: accepting one
//! driver descriptor and one device per possible CPU. The framework's
//! governor then picks states from the registered devices and calls back
//! into [`CpuIdleDriver::enter`](crate::entry::CpuIdleDriver::enter).

use crate::error::FrameworkError;
use crate::table::CpuIdleDevice;
use crate::DRIVER_NAME;

/// Process-wide driver descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverDescriptor {
    /// Driver name
    pub name: &'static str,
    /// Ownership tag (owning module)
    pub owner: &'static str,
}

impl DriverDescriptor {
    /// Create a descriptor
    pub const fn new(name: &'static str, owner: &'static str) -> Self {
        Self { name, owner }
    }
}

impl Default for DriverDescriptor {
    fn default() -> Self {
        Self::new(DRIVER_NAME, env!("CARGO_PKG_NAME"))
    }
}

/// Registration side of the OS idle framework
pub trait IdleFramework {
    /// Register the driver descriptor
    fn register_driver(&mut self, driver: &DriverDescriptor) -> Result<(), FrameworkError>;

    /// Register one CPU's device
    ///
    /// The framework keeps the reference for the lifetime of the system.
    fn register_device(&mut self, device: &'static CpuIdleDevice) -> Result<(), FrameworkError>;
}

impl<T: IdleFramework + ?Sized> IdleFramework for &mut T {
    fn register_driver(&mut self, driver: &DriverDescriptor) -> Result<(), FrameworkError> {
        (**self).register_driver(driver)
    }

    fn register_device(&mut self, device: &'static CpuIdleDevice) -> Result<(), FrameworkError> {
        (**self).register_device(device)
    }
}
