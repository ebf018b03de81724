//! # Platform Backend
//!
//! The two hardware-facing capabilities the entry routine needs: executing a
//! sleep mode, and unmasking local interrupts afterwards.

use crate::state::ModeId;

// =============================================================================
// SLEEP PRIMITIVE
// =============================================================================

/// Platform power-management backend
pub trait PlatformIdle {
    /// Put the calling core into `mode` and block until it resumes
    ///
    /// Returns the time spent in the mode, in microseconds. Must always
    /// return (0 on failure) rather than diverge.
    fn idle_enter(&self, mode: ModeId) -> u64;
}

impl<T: PlatformIdle + ?Sized> PlatformIdle for &T {
    fn idle_enter(&self, mode: ModeId) -> u64 {
        (**self).idle_enter(mode)
    }
}

// =============================================================================
// LOCAL INTERRUPT CONTROL
// =============================================================================

/// Local interrupt control on the calling core
pub trait IrqControl {
    /// Unmask IRQs on this core
    fn enable_local(&self);
}

impl<T: IrqControl + ?Sized> IrqControl for &T {
    fn enable_local(&self) {
        (**self).enable_local();
    }
}

/// Interrupt control for the build target
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchIrq;

impl IrqControl for ArchIrq {
    // No `nomem`: the unmask must also order the compiler's memory
    // accesses, so nothing written before it can sink past it.
    #[inline]
    fn enable_local(&self) {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "aarch64")] {
                unsafe {
                    core::arch::asm!("msr DAIFClr, #0x2", options(nostack, preserves_flags));
                }
            } else if #[cfg(target_arch = "arm")] {
                unsafe {
                    core::arch::asm!("cpsie i", options(nostack, preserves_flags));
                }
            } else if #[cfg(target_arch = "x86_64")] {
                unsafe {
                    core::arch::asm!("sti", options(nostack));
                }
            } else {
                // No interrupt model to restore
            }
        }
    }
}
