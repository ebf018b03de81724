//! # Device Registry
//!
//! Boot-time publication of the per-CPU idle devices and their registration
//! with the OS idle framework.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         BOOT (single CPU)                                │
//! │                                                                          │
//! │   build_tables() ──▶ install() ──▶ init()                                │
//! │                         │            ├─ register_driver()  (may fail)    │
//! │                         │            └─ register_device() × possible     │
//! │                         ▼                 (first failure aborts)         │
//! │               ┌───────────────────┐                                      │
//! │               │ DEVICES: Once<..> │  written once, never again           │
//! │               └───────────────────┘                                      │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │                         RUNTIME (every CPU)                              │
//! │                                                                          │
//! │   device(cpu) ──▶ &'static CpuIdleDevice ──▶ CpuIdleDriver::enter()      │
//! │                                                                          │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The arena only hands out shared references once published, so no writer
//! exists after boot and the idle path takes no locks.

use core::sync::atomic::{AtomicBool, Ordering};

use spin::Once;

use crate::cpu::CpuId;
use crate::error::{CpuIdleResult, RegistrationError, RegistrationResult};
use crate::framework::{DriverDescriptor, IdleFramework};
use crate::state::{IdleStateSpec, PowerModeLookup};
use crate::table::{CpuIdleDevice, CpuIdleDevices, TableBuilder};

// =============================================================================
// GLOBAL STATE
// =============================================================================

/// Published idle devices
static DEVICES: Once<CpuIdleDevices> = Once::new();

/// Registration state of the published devices
static INIT: InitGuard = InitGuard::new();

/// One-shot guard for `init()`
///
/// `started` admits a single attempt, `done` is only set once that attempt
/// registered every device. A failed attempt cannot be retried, since the
/// devices it did register stay with the framework.
#[derive(Debug)]
struct InitGuard {
    started: AtomicBool,
    done: AtomicBool,
}

impl InitGuard {
    const fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

// =============================================================================
// DEVICE ARENA
// =============================================================================

/// Publish the built devices
///
/// Must happen before any CPU idles. Fails if devices were already
/// published.
pub fn install(devices: CpuIdleDevices) -> RegistrationResult<&'static CpuIdleDevices> {
    let mut fresh = false;
    let installed = DEVICES.call_once(|| {
        fresh = true;
        devices
    });

    if !fresh {
        return Err(RegistrationError::AlreadyInitialized);
    }

    #[cfg(feature = "debug")]
    installed.dump();

    Ok(installed)
}

/// Published devices, if any
pub fn devices() -> Option<&'static CpuIdleDevices> {
    DEVICES.get()
}

/// Published device of `cpu`
pub fn device(cpu: CpuId) -> Option<&'static CpuIdleDevice> {
    devices().and_then(|devices| devices.get(cpu))
}

/// Log every published state table
pub fn dump_tables() {
    match devices() {
        Some(devices) => devices.dump(),
        None => log::debug!("CpuIdle: no idle-state tables installed"),
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// Register `driver` and every device in `devices` with `framework`
///
/// A rejected driver is logged and ignored. A rejected device aborts
/// registration: devices of lower CPUs stay registered, higher CPUs are not
/// attempted. Returns the number of registered devices.
pub fn register<F>(
    framework: &mut F,
    driver: &DriverDescriptor,
    devices: &'static CpuIdleDevices,
) -> RegistrationResult<usize>
where
    F: IdleFramework + ?Sized,
{
    if let Err(e) = framework.register_driver(driver) {
        log::error!("CpuIdle: {}", RegistrationError::Driver(e));
    }

    let mut registered = 0;
    for device in devices.iter() {
        let cpu = device.cpu();
        framework.register_device(device).map_err(|source| {
            let err = RegistrationError::Device { cpu, source };
            log::error!("CpuIdle: {}", err);
            err
        })?;

        log::debug!(
            "CpuIdle: registered cpu {} with {} states",
            cpu,
            device.state_count()
        );
        registered += 1;
    }

    log::info!(
        "CpuIdle: driver '{}' registered {} devices",
        driver.name,
        registered
    );

    Ok(registered)
}

/// Register the published devices under the default driver descriptor
///
/// Runs once, after [`install`]. A failed run is not retried: later calls
/// return [`RegistrationError::AlreadyInitialized`].
pub fn init<F>(framework: &mut F) -> RegistrationResult<()>
where
    F: IdleFramework + ?Sized,
{
    let devices = devices().ok_or(RegistrationError::NotBuilt)?;
    init_with(&INIT, framework, devices)
}

fn init_with<F>(
    guard: &InitGuard,
    framework: &mut F,
    devices: &'static CpuIdleDevices,
) -> RegistrationResult<()>
where
    F: IdleFramework + ?Sized,
{
    if guard.started.swap(true, Ordering::SeqCst) {
        return Err(RegistrationError::AlreadyInitialized);
    }

    register(framework, &DriverDescriptor::default(), devices)?;
    guard.done.store(true, Ordering::SeqCst);
    Ok(())
}

/// Whether `init()` registered every device
pub fn is_initialized() -> bool {
    INIT.is_done()
}

/// Build, publish and register in one step
pub fn boot<P, F>(
    builder: TableBuilder,
    specs: &[IdleStateSpec],
    params: &P,
    framework: &mut F,
) -> CpuIdleResult<&'static CpuIdleDevices>
where
    P: PowerModeLookup + ?Sized,
    F: IdleFramework + ?Sized,
{
    let devices = install(builder.build(specs, params)?)?;
    init(framework)?;
    Ok(devices)
}

// =============================================================================
// TESTS
// =============================================================================
