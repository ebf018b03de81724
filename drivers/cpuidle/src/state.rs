//! # Idle States
//!
//! Platform catalog inputs and the per-slot descriptor the framework sees.
//!
//! ```text
//!   IdleStateSpec ──────────┐
//!   (cpu, slot, mode, name) │
//!                           ├──▶ IdleStateDescriptor  (devices[cpu].states[slot])
//!   PowerModeLookup ────────┘    name, desc, mode, flags,
//!   (cpu, mode) → params         exit latency, target residency
//! ```
//!
//! All times are in microseconds.

use core::fmt;

use heapless::String;

use crate::cpu::CpuId;
use crate::error::{ConfigError, ConfigResult};
use crate::{DESC_LEN, NAME_LEN};

use alloc::collections::BTreeMap;

/// Platform-specific sleep mode identifier
pub type ModeId = u32;

// =============================================================================
// PLATFORM CATALOG
// =============================================================================

/// One entry of the platform state catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleStateSpec {
    /// CPU this state belongs to
    pub cpu: CpuId,
    /// Slot in the CPU's state table
    pub slot: usize,
    /// Platform sleep mode backing the state
    pub mode: ModeId,
    /// Short name ("C1", "WFI", ...)
    pub name: &'static str,
    /// Human-readable description
    pub desc: &'static str,
}

impl IdleStateSpec {
    /// Create a catalog entry
    pub const fn new(
        cpu: CpuId,
        slot: usize,
        mode: ModeId,
        name: &'static str,
        desc: &'static str,
    ) -> Self {
        Self {
            cpu,
            slot,
            mode,
            name,
            desc,
        }
    }
}

/// Latency characteristics of one sleep mode on one CPU
///
/// Values are signed because platform tables are not trusted; negative values
/// are rejected when the table is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerModeParams {
    /// Worst-case exit latency
    pub latency_us: i64,
    /// Minimum worthwhile residency
    pub residency_us: i64,
}

impl PowerModeParams {
    /// Create parameters
    pub const fn new(latency_us: i64, residency_us: i64) -> Self {
        Self {
            latency_us,
            residency_us,
        }
    }
}

/// Resolves `(cpu, mode)` to power-mode parameters
pub trait PowerModeLookup {
    /// Parameters for `mode` on `cpu`, if the platform defines them
    fn lookup(&self, cpu: CpuId, mode: ModeId) -> Option<PowerModeParams>;
}

impl PowerModeLookup for BTreeMap<(CpuId, ModeId), PowerModeParams> {
    fn lookup(&self, cpu: CpuId, mode: ModeId) -> Option<PowerModeParams> {
        self.get(&(cpu, mode)).copied()
    }
}

impl<T: PowerModeLookup + ?Sized> PowerModeLookup for &T {
    fn lookup(&self, cpu: CpuId, mode: ModeId) -> Option<PowerModeParams> {
        (**self).lookup(cpu, mode)
    }
}

/// Flat platform table: `entries[cpu * modes_per_cpu + mode]`
#[derive(Debug, Clone, Copy)]
pub struct PlatformModeTable<'a> {
    modes_per_cpu: usize,
    entries: &'a [PowerModeParams],
}

impl<'a> PlatformModeTable<'a> {
    /// Wrap a platform data array with `modes_per_cpu` entries per CPU
    pub const fn new(modes_per_cpu: usize, entries: &'a [PowerModeParams]) -> Self {
        Self {
            modes_per_cpu,
            entries,
        }
    }

    /// Index of `(cpu, mode)` in the flat array, `None` on overflow
    pub fn index(&self, cpu: CpuId, mode: ModeId) -> Option<usize> {
        cpu.index()
            .checked_mul(self.modes_per_cpu)?
            .checked_add(mode as usize)
    }
}

impl PowerModeLookup for PlatformModeTable<'_> {
    fn lookup(&self, cpu: CpuId, mode: ModeId) -> Option<PowerModeParams> {
        if mode as usize >= self.modes_per_cpu {
            return None;
        }
        self.entries.get(self.index(cpu, mode)?).copied()
    }
}

// =============================================================================
// STATE FLAGS
// =============================================================================

bitflags::bitflags! {
    /// Idle state flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateFlags: u32 {
        /// Residency returned by entry is a real measurement
        const TIME_VALID = 1 << 0;
    }
}

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// Bounded state name
pub type StateName = String<NAME_LEN>;

/// Bounded state description
pub type StateDesc = String<DESC_LEN>;

/// A registered idle state, as seen by the framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleStateDescriptor {
    /// Short name
    pub name: StateName,
    /// Description
    pub desc: StateDesc,
    /// Platform sleep mode entered for this state
    pub mode: ModeId,
    /// State flags
    pub flags: StateFlags,
    /// Worst-case exit latency
    pub exit_latency_us: u64,
    /// Minimum worthwhile residency
    pub target_residency_us: u64,
    /// Power draw; always 0 (unmeasured)
    pub power_usage: u32,
    /// State has an entry routine
    pub enabled: bool,
}

impl IdleStateDescriptor {
    /// Build the descriptor for `spec` from its resolved parameters
    pub fn from_spec(spec: &IdleStateSpec, params: PowerModeParams) -> ConfigResult<Self> {
        let exit_latency_us =
            u64::try_from(params.latency_us).map_err(|_| ConfigError::NegativeLatency {
                cpu: spec.cpu,
                slot: spec.slot,
                mode: spec.mode,
                value: params.latency_us,
            })?;
        let target_residency_us =
            u64::try_from(params.residency_us).map_err(|_| ConfigError::NegativeResidency {
                cpu: spec.cpu,
                slot: spec.slot,
                mode: spec.mode,
                value: params.residency_us,
            })?;

        Ok(Self {
            name: bounded(spec.name),
            desc: bounded(spec.desc),
            mode: spec.mode,
            flags: StateFlags::TIME_VALID,
            exit_latency_us,
            target_residency_us,
            power_usage: 0,
            enabled: true,
        })
    }

    /// Name as a string slice
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Description as a string slice
    pub fn desc(&self) -> &str {
        self.desc.as_str()
    }
}

impl fmt::Display for IdleStateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) mode={} latency={}us residency={}us",
            self.name, self.desc, self.mode, self.exit_latency_us, self.target_residency_us
        )
    }
}

/// Copy `s` into a fixed-capacity string, keeping at most `N - 1` bytes
fn bounded<const N: usize>(s: &str) -> String<N> {
    let mut end = s.len().min(N.saturating_sub(1));
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::new();
    // Cannot fail: `end < N`.
    let _ = out.push_str(&s[..end]);
    out
}

// =============================================================================
// TESTS
// =============================================================================
