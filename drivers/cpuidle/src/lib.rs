//! # Helix CPU Idle Driver
//!
//! Exposes a platform's hardware sleep modes to the OS idle framework as
//! per-CPU idle-state tables, and performs the transition into and out of a
//! chosen mode when a core has nothing to run.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          HELIX CPUIDLE DRIVER                            │
//! │                                                                          │
//! │   Platform catalog           Power-mode params                           │
//! │   [IdleStateSpec]            (cpu, mode) → latency/residency            │
//! │          │                           │                                   │
//! │          └─────────────┬─────────────┘                                   │
//! │                        ▼                                                 │
//! │              ┌───────────────────┐                                       │
//! │              │   TableBuilder    │   once, at boot                       │
//! │              └─────────┬─────────┘                                       │
//! │                        ▼                                                 │
//! │   ┌──────────┐ ┌──────────┐       ┌──────────┐                          │
//! │   │ device 0 │ │ device 1 │  ...  │ device N │   read-only after boot   │
//! │   └────┬─────┘ └────┬─────┘       └────┬─────┘                          │
//! │        │            │                  │                                 │
//! │        ▼            ▼                  ▼                                 │
//! │   ┌────────────────────────────────────────────┐                        │
//! │   │            OS idle framework               │ register_driver()      │
//! │   │    (governor picks state, calls enter)     │ register_device() × N  │
//! │   └─────────────────────┬──────────────────────┘                        │
//! │                         ▼                                                │
//! │   ┌────────────────────────────────────────────┐                        │
//! │   │  CpuIdleDriver::enter  (per CPU, IRQs off) │                        │
//! │   │  pm_enter → sleep → pm_exit → IRQs on      │                        │
//! │   └────────────────────────────────────────────┘                        │
//! │                                                                          │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Boot Sequence
//!
//! ```rust,ignore
//! use helix_cpuidle::{build_tables, install, init, CpuMask};
//!
//! let devices = build_tables(CpuMask::first(4), &PLATFORM_STATES, &PM_DATA)?;
//! install(devices)?;
//! init(&mut framework)?;
//! ```
//!
//! ## Invariants
//!
//! 1. **Build once**: tables are built and published before any CPU idles,
//!    and never written again.
//! 2. **Gap truncation**: a device's `state_count` is the index of its first
//!    empty slot. States after a gap are kept but not offered.
//! 3. **Fixed entry order**: enter notification, sleep, exit notification,
//!    interrupt enable. Always all four, always in this order.
//! 4. **Per-CPU isolation**: a CPU only reads its own table and only writes
//!    its own last residency.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// CPU identifiers and masks
pub mod cpu;

/// Idle entry routine
pub mod entry;

/// Error types
pub mod error;

/// OS idle framework interface
pub mod framework;

/// Power-domain notification
pub mod notifier;

/// Platform sleep backend and interrupt control
pub mod platform;

/// Device publication and registration
pub mod registry;

/// Platform catalog and state descriptors
pub mod state;

/// Per-CPU state tables
pub mod table;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use cpu::{CpuId, CpuMask};
pub use entry::CpuIdleDriver;
pub use error::{
    ConfigError, ConfigResult, CpuIdleError, CpuIdleResult, ErrorKind, FrameworkError,
    RegistrationError, RegistrationResult,
};
pub use framework::{DriverDescriptor, IdleFramework};
pub use notifier::{NoopNotifier, NotifyError, NotifyResult, PowerDomainNotifier};
pub use platform::{ArchIrq, IrqControl, PlatformIdle};
pub use registry::{
    boot, device, devices, dump_tables, init, install, is_initialized, register,
};
pub use state::{
    IdleStateDescriptor, IdleStateSpec, ModeId, PlatformModeTable, PowerModeLookup,
    PowerModeParams, StateFlags,
};
pub use table::{
    build_tables, visible_state_count, CpuIdleDevice, CpuIdleDevices, PrepareHook, TableBuilder,
};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Driver version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name the driver registers under
pub const DRIVER_NAME: &str = "helix_idle";

/// State slots per CPU
pub const MAX_STATES: usize = 10;

/// Highest number of CPUs (width of [`CpuMask`])
pub const MAX_CPUS: usize = 64;

/// Capacity of a state name, terminator included
pub const NAME_LEN: usize = 16;

/// Capacity of a state description, terminator included
pub const DESC_LEN: usize = 32;

static_assertions::const_assert!(MAX_STATES > 0 && MAX_STATES <= u8::MAX as usize);
static_assertions::const_assert_eq!(MAX_CPUS, u64::BITS as usize);
static_assertions::const_assert!(NAME_LEN > 1);
static_assertions::const_assert!(DESC_LEN > 1);

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_constants() {
        assert!(MAX_STATES >= 8);
        assert!(DESC_LEN >= NAME_LEN);
        assert!(!DRIVER_NAME.is_empty());
    }
}
