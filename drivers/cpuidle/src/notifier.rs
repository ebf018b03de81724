//! # Power-Domain Notification
//!
//! Hooks that tell the rest of the system a core is leaving (and then
//! re-entering) its normal execution domain, so that domain-wide state such
//! as the interrupt controller or VFP context can be saved and restored.
//!
//! Platforms without domain hooks plug in [`NoopNotifier`]; the entry routine
//! calls both hooks unconditionally either way.

use core::fmt;

/// Refusal or failure reported by a notification hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyError(pub i32);

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "power-domain notifier returned {}", self.0)
    }
}

/// Result of a notification hook
pub type NotifyResult = Result<(), NotifyError>;

/// Power-domain notification capability
///
/// Both hooks run on the idling CPU with local interrupts masked.
pub trait PowerDomainNotifier {
    /// The core is about to enter a low-power state
    fn cpu_pm_enter(&self) -> NotifyResult;

    /// The core has left the low-power state
    fn cpu_pm_exit(&self) -> NotifyResult;
}

impl<T: PowerDomainNotifier + ?Sized> PowerDomainNotifier for &T {
    fn cpu_pm_enter(&self) -> NotifyResult {
        (**self).cpu_pm_enter()
    }

    fn cpu_pm_exit(&self) -> NotifyResult {
        (**self).cpu_pm_exit()
    }
}

/// Notifier for platforms without power-domain hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl PowerDomainNotifier for NoopNotifier {
    #[inline(always)]
    fn cpu_pm_enter(&self) -> NotifyResult {
        Ok(())
    }

    #[inline(always)]
    fn cpu_pm_exit(&self) -> NotifyResult {
        Ok(())
    }
}
