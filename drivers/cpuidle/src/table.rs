//! # Idle State Tables
//!
//! Builds one [`CpuIdleDevice`] per possible CPU from the platform catalog.
//!
//! ## Table Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       PER-CPU STATE TABLES                            │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                       │
//! │   CPU 0            slot 0   slot 1   slot 2   slot 3   ...  slot N-1  │
//! │   ┌────────────┐  ┌──────┐ ┌──────┐ ┌──────┐ ┌──────┐      ┌──────┐  │
//! │   │ count = 2  │─▶│ WFI  │ │  PC  │ │ ---- │ │ PC-2 │ ...  │ ---- │  │
//! │   └────────────┘  └──────┘ └──────┘ └──────┘ └──────┘      └──────┘  │
//! │                                        ▲                              │
//! │                                        └─ first gap ends the table    │
//! │                                                                       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `state_count` is the index of the first empty (or disabled) slot, not the
//! number of populated slots. States after a gap stay in the table but are
//! never offered to the governor.
//!
//! Tables are built once, single-threaded, before any CPU idles, and are
//! read-only afterwards. The only field that changes later is each device's
//! last residency, written by its own CPU.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::cpu::{CpuId, CpuMask};
use crate::error::{ConfigError, ConfigResult};
use crate::state::{IdleStateDescriptor, IdleStateSpec, PowerModeLookup};
use crate::MAX_STATES;

use alloc::vec::Vec;

/// Hook the framework calls on a CPU before choosing its next idle state
pub type PrepareHook = fn(CpuId);

/// Unpopulated slot
const EMPTY_SLOT: Option<IdleStateDescriptor> = None;

// =============================================================================
// CPU IDLE DEVICE
// =============================================================================

/// Idle device of one CPU
#[derive(Debug)]
pub struct CpuIdleDevice {
    /// Owning CPU
    cpu: CpuId,

    /// State slots
    states: [Option<IdleStateDescriptor>; MAX_STATES],

    /// Number of states visible to the governor
    state_count: usize,

    /// Platform prepare hook
    prepare: Option<PrepareHook>,

    /// Residency of the most recent idle entry (microseconds)
    last_residency_us: AtomicU64,
}

impl CpuIdleDevice {
    /// Create a device with no states
    pub const fn new(cpu: CpuId) -> Self {
        Self {
            cpu,
            states: [EMPTY_SLOT; MAX_STATES],
            state_count: 0,
            prepare: None,
            last_residency_us: AtomicU64::new(0),
        }
    }

    /// Owning CPU
    pub fn cpu(&self) -> CpuId {
        self.cpu
    }

    /// All slots, including ones hidden behind a gap
    pub fn slots(&self) -> &[Option<IdleStateDescriptor>; MAX_STATES] {
        &self.states
    }

    /// Number of states offered to the governor
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Governor-visible state at `index`
    pub fn state(&self, index: usize) -> Option<&IdleStateDescriptor> {
        if index >= self.state_count {
            return None;
        }
        self.states[index].as_ref()
    }

    /// Iterate governor-visible states
    pub fn states(&self) -> impl Iterator<Item = &IdleStateDescriptor> {
        self.states[..self.state_count].iter().flatten()
    }

    /// Run the platform prepare hook, if any
    pub fn prepare(&self) {
        if let Some(hook) = self.prepare {
            hook(self.cpu);
        }
    }

    /// Whether a prepare hook is installed
    pub fn has_prepare_hook(&self) -> bool {
        self.prepare.is_some()
    }

    /// Residency of the most recent idle entry, in microseconds
    pub fn last_residency_us(&self) -> u64 {
        self.last_residency_us.load(Ordering::Relaxed)
    }

    /// Store the residency of an idle entry
    ///
    /// Only the owning CPU writes this, so relaxed ordering suffices.
    #[inline]
    pub(crate) fn record_residency(&self, residency_us: u64) {
        self.last_residency_us.store(residency_us, Ordering::Relaxed);
    }

    /// Write `desc` into `slot`. Returns true if the slot was already taken.
    fn populate(&mut self, slot: usize, desc: IdleStateDescriptor) -> bool {
        self.states[slot].replace(desc).is_some()
    }

    /// Recompute `state_count` from the slots
    fn seal(&mut self) {
        self.state_count = visible_state_count(&self.states);
    }
}

/// Index of the first empty or disabled slot
pub fn visible_state_count(slots: &[Option<IdleStateDescriptor>]) -> usize {
    slots
        .iter()
        .take_while(|slot| matches!(slot, Some(desc) if desc.enabled))
        .count()
}

// =============================================================================
// DEVICE ARENA
// =============================================================================

/// Idle devices of all possible CPUs, indexed by CPU ID
#[derive(Debug)]
pub struct CpuIdleDevices {
    possible: CpuMask,
    devices: Vec<Option<CpuIdleDevice>>,
}

impl CpuIdleDevices {
    fn with_capacity(possible: CpuMask) -> Self {
        let len = possible.last().map_or(0, |cpu| cpu.index() + 1);
        let mut devices = Vec::with_capacity(len);
        devices.resize_with(len, || None);
        Self { possible, devices }
    }

    /// CPUs that own a device
    pub fn possible(&self) -> CpuMask {
        self.possible
    }

    /// Device of `cpu`
    pub fn get(&self, cpu: CpuId) -> Option<&CpuIdleDevice> {
        self.devices.get(cpu.index()).and_then(Option::as_ref)
    }

    /// Devices in ascending CPU order
    pub fn iter(&self) -> impl Iterator<Item = &CpuIdleDevice> {
        self.devices.iter().flatten()
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.possible.count()
    }

    /// True if there are no devices
    pub fn is_empty(&self) -> bool {
        self.possible.is_empty()
    }

    /// Log every device's state table
    pub fn dump(&self) {
        for device in self.iter() {
            log::debug!(
                "CpuIdle: cpu {} has {} visible states",
                device.cpu(),
                device.state_count()
            );
            for (slot, desc) in device.slots().iter().enumerate() {
                if let Some(desc) = desc {
                    let hidden = if slot < device.state_count() {
                        ""
                    } else {
                        " (hidden)"
                    };
                    log::debug!("CpuIdle:   [{}] {}{}", slot, desc, hidden);
                }
            }
        }
    }
}

// =============================================================================
// TABLE BUILDER
// =============================================================================

/// Builds per-CPU idle devices from the platform catalog
#[derive(Debug, Clone, Copy)]
pub struct TableBuilder {
    possible: CpuMask,
    prepare: Option<PrepareHook>,
}

impl TableBuilder {
    /// Builder for the given possible CPUs
    pub const fn new(possible: CpuMask) -> Self {
        Self {
            possible,
            prepare: None,
        }
    }

    /// Install `hook` as every device's prepare hook
    pub fn prepare(mut self, hook: PrepareHook) -> Self {
        self.prepare = Some(hook);
        self
    }

    /// Build one device per possible CPU
    ///
    /// Fails on the first malformed spec of a possible CPU. Specs naming a
    /// CPU outside the possible mask are ignored.
    pub fn build<P>(&self, specs: &[IdleStateSpec], params: &P) -> ConfigResult<CpuIdleDevices>
    where
        P: PowerModeLookup + ?Sized,
    {
        let mut arena = CpuIdleDevices::with_capacity(self.possible);

        for cpu in self.possible.iter() {
            let device = self.build_device(cpu, specs, params)?;
            arena.devices[cpu.index()] = Some(device);
        }

        log::info!(
            "CpuIdle: built idle-state tables for {} CPUs",
            self.possible.count()
        );

        Ok(arena)
    }

    fn build_device<P>(
        &self,
        cpu: CpuId,
        specs: &[IdleStateSpec],
        params: &P,
    ) -> ConfigResult<CpuIdleDevice>
    where
        P: PowerModeLookup + ?Sized,
    {
        let mut device = CpuIdleDevice::new(cpu);
        device.prepare = self.prepare;

        for spec in specs.iter().filter(|spec| spec.cpu == cpu) {
            if spec.slot >= MAX_STATES {
                return Err(ConfigError::SlotOutOfRange {
                    cpu,
                    slot: spec.slot,
                });
            }

            let mode_params =
                params
                    .lookup(cpu, spec.mode)
                    .ok_or(ConfigError::UnresolvedMode {
                        cpu,
                        slot: spec.slot,
                        mode: spec.mode,
                    })?;

            let desc = IdleStateDescriptor::from_spec(spec, mode_params)?;
            if device.populate(spec.slot, desc) {
                log::warn!(
                    "CpuIdle: cpu {} slot {} configured twice, keeping '{}'",
                    cpu,
                    spec.slot,
                    spec.name
                );
            }
        }

        device.seal();
        Ok(device)
    }
}

/// Build the idle devices of every CPU in `possible`
pub fn build_tables<P>(
    possible: CpuMask,
    specs: &[IdleStateSpec],
    params: &P,
) -> ConfigResult<CpuIdleDevices>
where
    P: PowerModeLookup + ?Sized,
{
    TableBuilder::new(possible).build(specs, params)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ModeId, PlatformModeTable, PowerModeParams, StateFlags};
    use alloc::collections::BTreeMap;
    use core::sync::atomic::AtomicUsize;

    const DEEP: ModeId = 0;
    const SHALLOW: ModeId = 1;
    const RETENTION: ModeId = 2;

    fn params_for(cpus: &[u32]) -> BTreeMap<(CpuId, ModeId), PowerModeParams> {
        let mut map = BTreeMap::new();
        for &cpu in cpus {
            map.insert((CpuId(cpu), DEEP), PowerModeParams::new(500, 10000));
            map.insert((CpuId(cpu), SHALLOW), PowerModeParams::new(10, 100));
            map.insert((CpuId(cpu), RETENTION), PowerModeParams::new(50, 1000));
        }
        map
    }

    #[test]
    fn test_example_table() {
        let specs = [
            IdleStateSpec::new(CpuId(0), 0, DEEP, "C2", "power collapse"),
            IdleStateSpec::new(CpuId(0), 1, SHALLOW, "C1", "wfi"),
        ];
        let devices = build_tables(CpuMask::first(1), &specs, &params_for(&[0])).unwrap();
        let dev = devices.get(CpuId(0)).unwrap();

        assert_eq!(dev.state_count(), 2);

        let s0 = dev.state(0).unwrap();
        assert_eq!(s0.name(), "C2");
        assert_eq!(s0.desc(), "power collapse");
        assert_eq!(s0.mode, DEEP);
        assert_eq!(s0.exit_latency_us, 500);
        assert_eq!(s0.target_residency_us, 10000);
        assert_eq!(s0.power_usage, 0);
        assert_eq!(s0.flags, StateFlags::TIME_VALID);

        let s1 = dev.state(1).unwrap();
        assert_eq!(s1.name(), "C1");
        assert_eq!(s1.exit_latency_us, 10);
        assert_eq!(s1.target_residency_us, 100);
    }

    #[test]
    fn test_gap_truncates_state_count() {
        let specs = [
            IdleStateSpec::new(CpuId(0), 0, SHALLOW, "C1", ""),
            IdleStateSpec::new(CpuId(0), 1, RETENTION, "C2", ""),
            IdleStateSpec::new(CpuId(0), 3, DEEP, "C4", ""),
        ];
        let devices = build_tables(CpuMask::first(1), &specs, &params_for(&[0])).unwrap();
        let dev = devices.get(CpuId(0)).unwrap();

        assert_eq!(dev.state_count(), 2);
        assert_eq!(dev.states().count(), 2);
        // Slot 3 is populated but hidden
        assert!(dev.slots()[3].is_some());
        assert!(dev.state(3).is_none());
    }

    #[test]
    fn test_empty_slot_zero_hides_everything() {
        let specs = [IdleStateSpec::new(CpuId(0), 1, SHALLOW, "C1", "")];
        let devices = build_tables(CpuMask::first(1), &specs, &params_for(&[0])).unwrap();
        assert_eq!(devices.get(CpuId(0)).unwrap().state_count(), 0);
    }

    #[test]
    fn test_disabled_slot_ends_table() {
        let mut slots = [EMPTY_SLOT; MAX_STATES];
        let spec = IdleStateSpec::new(CpuId(0), 0, SHALLOW, "C1", "");
        let desc = IdleStateDescriptor::from_spec(&spec, PowerModeParams::new(1, 1)).unwrap();
        slots[0] = Some(desc.clone());
        slots[1] = Some(IdleStateDescriptor {
            enabled: false,
            ..desc.clone()
        });
        slots[2] = Some(desc);
        assert_eq!(visible_state_count(&slots), 1);
    }

    #[test]
    fn test_full_table() {
        let specs: Vec<IdleStateSpec> = (0..MAX_STATES)
            .map(|slot| IdleStateSpec::new(CpuId(0), slot, SHALLOW, "C", ""))
            .collect();
        let devices = build_tables(CpuMask::first(1), &specs, &params_for(&[0])).unwrap();
        assert_eq!(devices.get(CpuId(0)).unwrap().state_count(), MAX_STATES);
    }

    #[test]
    fn test_per_cpu_tables() {
        let specs = [
            IdleStateSpec::new(CpuId(0), 0, SHALLOW, "C1", ""),
            IdleStateSpec::new(CpuId(1), 0, SHALLOW, "C1", ""),
            IdleStateSpec::new(CpuId(1), 1, DEEP, "C2", ""),
            // Not a possible CPU: ignored
            IdleStateSpec::new(CpuId(7), 0, SHALLOW, "C1", ""),
        ];
        let devices = build_tables(CpuMask::first(3), &specs, &params_for(&[0, 1])).unwrap();

        assert_eq!(devices.len(), 3);
        assert_eq!(devices.get(CpuId(0)).unwrap().state_count(), 1);
        assert_eq!(devices.get(CpuId(1)).unwrap().state_count(), 2);
        // Possible but without states
        assert_eq!(devices.get(CpuId(2)).unwrap().state_count(), 0);
        assert!(devices.get(CpuId(7)).is_none());

        let cpus: Vec<CpuId> = devices.iter().map(CpuIdleDevice::cpu).collect();
        assert_eq!(cpus, vec![CpuId(0), CpuId(1), CpuId(2)]);
    }

    #[test]
    fn test_sparse_possible_mask() {
        let possible: CpuMask = [CpuId(1), CpuId(4)].into_iter().collect();
        let specs = [IdleStateSpec::new(CpuId(4), 0, SHALLOW, "C1", "")];
        let devices = build_tables(possible, &specs, &params_for(&[4])).unwrap();

        assert_eq!(devices.len(), 2);
        assert!(devices.get(CpuId(0)).is_none());
        assert_eq!(devices.get(CpuId(1)).unwrap().state_count(), 0);
        assert_eq!(devices.get(CpuId(4)).unwrap().state_count(), 1);
    }

    #[test]
    fn test_slot_out_of_range() {
        let specs = [IdleStateSpec::new(CpuId(1), MAX_STATES, SHALLOW, "C9", "")];
        let err = build_tables(CpuMask::first(2), &specs, &params_for(&[1])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::SlotOutOfRange {
                cpu: CpuId(1),
                slot: MAX_STATES,
            }
        );
    }

    #[test]
    fn test_unresolved_mode() {
        let specs = [
            IdleStateSpec::new(CpuId(0), 0, SHALLOW, "C1", ""),
            IdleStateSpec::new(CpuId(0), 1, 42, "C?", ""),
        ];
        let err = build_tables(CpuMask::first(1), &specs, &params_for(&[0])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnresolvedMode {
                cpu: CpuId(0),
                slot: 1,
                mode: 42,
            }
        );
    }

    #[test]
    fn test_negative_latency_fails_build() {
        let mut params = params_for(&[0]);
        params.insert((CpuId(0), DEEP), PowerModeParams::new(-3, 100));
        let specs = [IdleStateSpec::new(CpuId(0), 0, DEEP, "C2", "")];
        let err = build_tables(CpuMask::first(1), &specs, &params).unwrap_err();
        assert_eq!(err.cpu(), CpuId(0));
        assert_eq!(err.slot(), 0);
    }

    #[test]
    fn test_duplicate_slot_last_wins() {
        let specs = [
            IdleStateSpec::new(CpuId(0), 0, SHALLOW, "first", ""),
            IdleStateSpec::new(CpuId(0), 0, DEEP, "second", ""),
        ];
        let devices = build_tables(CpuMask::first(1), &specs, &params_for(&[0])).unwrap();
        let dev = devices.get(CpuId(0)).unwrap();
        assert_eq!(dev.state_count(), 1);
        assert_eq!(dev.state(0).unwrap().name(), "second");
        assert_eq!(dev.state(0).unwrap().mode, DEEP);
    }

    #[test]
    fn test_build_is_deterministic() {
        let specs = [
            IdleStateSpec::new(CpuId(0), 0, SHALLOW, "C1", "wfi"),
            IdleStateSpec::new(CpuId(0), 1, DEEP, "C2", "power collapse"),
            IdleStateSpec::new(CpuId(1), 0, RETENTION, "C1R", "retention"),
        ];
        let params = params_for(&[0, 1]);
        let a = build_tables(CpuMask::first(2), &specs, &params).unwrap();
        let b = build_tables(CpuMask::first(2), &specs, &params).unwrap();

        for (da, db) in a.iter().zip(b.iter()) {
            assert_eq!(da.cpu(), db.cpu());
            assert_eq!(da.slots(), db.slots());
            assert_eq!(da.state_count(), db.state_count());
        }
    }

    #[test]
    fn test_flat_platform_table() {
        // Two modes per CPU, laid out cpu-major
        let data = [
            PowerModeParams::new(500, 10000),
            PowerModeParams::new(10, 100),
            PowerModeParams::new(600, 12000),
            PowerModeParams::new(20, 200),
        ];
        let table = PlatformModeTable::new(2, &data);
        let specs = [
            IdleStateSpec::new(CpuId(1), 0, SHALLOW, "C1", ""),
            IdleStateSpec::new(CpuId(1), 1, DEEP, "C2", ""),
        ];
        let devices = build_tables(CpuMask::first(2), &specs, &table).unwrap();
        let dev = devices.get(CpuId(1)).unwrap();
        assert_eq!(dev.state(0).unwrap().exit_latency_us, 20);
        assert_eq!(dev.state(1).unwrap().target_residency_us, 12000);
    }

    static PREPARED: AtomicUsize = AtomicUsize::new(0);

    fn count_prepare(cpu: CpuId) {
        PREPARED.fetch_add(cpu.index() + 1, Ordering::SeqCst);
    }

    #[test]
    fn test_prepare_hook() {
        let devices = TableBuilder::new(CpuMask::first(2))
            .prepare(count_prepare)
            .build(&[], &params_for(&[]))
            .unwrap();

        let dev = devices.get(CpuId(1)).unwrap();
        assert!(dev.has_prepare_hook());
        dev.prepare();
        assert_eq!(PREPARED.load(Ordering::SeqCst), 2);

        let plain = build_tables(CpuMask::first(1), &[], &params_for(&[])).unwrap();
        assert!(!plain.get(CpuId(0)).unwrap().has_prepare_hook());
        plain.get(CpuId(0)).unwrap().prepare();
    }

    #[test]
    fn test_last_residency_starts_at_zero() {
        let dev = CpuIdleDevice::new(CpuId(0));
        assert_eq!(dev.last_residency_us(), 0);
        dev.record_residency(1234);
        assert_eq!(dev.last_residency_us(), 1234);
    }
}
