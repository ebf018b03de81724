//! # Idle Entry
//!
//! The routine the OS idle framework calls, on the idling CPU with local
//! interrupts masked, once its governor has picked a state.
//!
//! ## Entry Sequence
//!
//! ```text
//!   framework (IRQs off)
//!        │
//!        ▼
//!   ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//!   │ cpu_pm_enter()   │──▶│ idle_enter(mode) │──▶│ cpu_pm_exit()    │──▶│ enable_local()   │
//!   │ result ignored   │   │ blocks until     │   │ result ignored   │   │ IRQs back on     │
//!   │                  │   │ wakeup, returns  │   │                  │   │                  │
//!   │                  │   │ residency        │   │                  │   │                  │
//!   └──────────────────┘   └──────────────────┘   └──────────────────┘   └──────────────────┘
//! ```
//!
//! The four steps always run, in this order, whatever the hooks or the
//! backend report. Nothing here logs, allocates or keeps state between calls.

use crate::notifier::{NoopNotifier, PowerDomainNotifier};
use crate::platform::{ArchIrq, IrqControl, PlatformIdle};
use crate::state::IdleStateDescriptor;
use crate::table::CpuIdleDevice;

/// Idle driver: the collaborators the entry routine drives
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuIdleDriver<P, N = NoopNotifier, I = ArchIrq> {
    platform: P,
    notifier: N,
    irq: I,
}

impl<P, N, I> CpuIdleDriver<P, N, I>
where
    P: PlatformIdle,
    N: PowerDomainNotifier,
    I: IrqControl,
{
    /// Create a driver from its backend, notifier and interrupt control
    pub const fn new(platform: P, notifier: N, irq: I) -> Self {
        Self {
            platform,
            notifier,
            irq,
        }
    }

    /// Enter `state` on the calling CPU and return the residency
    ///
    /// Must be called on `device`'s CPU with local interrupts disabled.
    /// Interrupts are enabled on return.
    #[inline]
    pub fn enter(&self, device: &CpuIdleDevice, state: &IdleStateDescriptor) -> u64 {
        // A veto from the domain hooks does not stop entry.
        let _ = self.notifier.cpu_pm_enter();

        let residency_us = self.platform.idle_enter(state.mode);
        device.record_residency(residency_us);

        let _ = self.notifier.cpu_pm_exit();

        self.irq.enable_local();

        residency_us
    }

    /// Enter the governor-visible state at `index`
    ///
    /// Returns `None`, leaving interrupts untouched, if `index` is not below
    /// the device's `state_count`.
    #[inline]
    pub fn enter_index(&self, device: &CpuIdleDevice, index: usize) -> Option<u64> {
        let state = device.state(index)?;
        Some(self.enter(device, state))
    }

    /// Platform backend
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Power-domain notifier
    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

impl<P: PlatformIdle> CpuIdleDriver<P> {
    /// Driver without power-domain hooks, using the target's interrupt control
    pub const fn with_platform(platform: P) -> Self {
        Self::new(platform, NoopNotifier, ArchIrq)
    }
}

// =============================================================================
// TESTS
// =============================================================================
