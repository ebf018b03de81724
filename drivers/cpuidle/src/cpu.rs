//! # CPU Identifiers and Masks
//!
//! Logical CPU numbering used by the idle driver, and the mask of CPUs
//! that may ever come online ("possible" CPUs).
//!
//! Every possible CPU gets an idle device at boot, including cores that are
//! still offline, so the mask is supplied by the platform rather than read
//! from the set of running cores.

use core::fmt;

use crate::MAX_CPUS;

// =============================================================================
// CPU ID
// =============================================================================

/// Logical CPU number (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct CpuId(pub u32);

impl CpuId {
    /// Create a CPU ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Value as an arena index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for CpuId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CPU MASK
// =============================================================================

/// Set of CPUs, one bit per logical CPU
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuMask(u64);

impl CpuMask {
    /// Empty mask
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Mask containing CPUs `0..count`
    pub const fn first(count: usize) -> Self {
        if count >= MAX_CPUS {
            Self(u64::MAX)
        } else {
            Self((1u64 << count) - 1)
        }
    }

    /// Build from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Add a CPU. Returns false if the CPU does not fit in the mask.
    pub fn set(&mut self, cpu: CpuId) -> bool {
        if cpu.index() >= MAX_CPUS {
            return false;
        }
        self.0 |= 1 << cpu.index();
        true
    }

    /// Check membership
    pub const fn contains(&self, cpu: CpuId) -> bool {
        cpu.index() < MAX_CPUS && (self.0 >> cpu.index()) & 1 == 1
    }

    /// Number of CPUs in the mask
    pub const fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// True if no CPU is set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Highest CPU in the mask
    pub fn last(&self) -> Option<CpuId> {
        if self.0 == 0 {
            None
        } else {
            Some(CpuId(63 - self.0.leading_zeros()))
        }
    }

    /// Iterate CPUs in ascending order
    pub fn iter(&self) -> CpuMaskIter {
        CpuMaskIter { remaining: self.0 }
    }
}

impl fmt::Debug for CpuMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<CpuId> for CpuMask {
    fn from_iter<I: IntoIterator<Item = CpuId>>(iter: I) -> Self {
        let mut mask = Self::empty();
        for cpu in iter {
            mask.set(cpu);
        }
        mask
    }
}

impl IntoIterator for CpuMask {
    type IntoIter = CpuMaskIter;
    type Item = CpuId;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over a [`CpuMask`]
#[derive(Debug, Clone)]
pub struct CpuMaskIter {
    remaining: u64,
}

impl Iterator for CpuMaskIter {
    type Item = CpuId;

    fn next(&mut self) -> Option<CpuId> {
        if self.remaining == 0 {
            return None;
        }
        let bit = self.remaining.trailing_zeros();
        self.remaining &= self.remaining - 1;
        Some(CpuId(bit))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.count_ones() as usize;
        (n, Some(n))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_id() {
        let cpu = CpuId::new(7);
        assert_eq!(cpu.value(), 7);
        assert_eq!(cpu.index(), 7);
        assert_eq!(CpuId::from(7), cpu);
    }

    #[test]
    fn test_mask_bits() {
        let mask = CpuMask::from_bits(0b1010_0001);
        assert_eq!(mask.bits(), 0b1010_0001);
        assert_eq!(
            mask.iter().collect::<Vec<_>>(),
            vec![CpuId(0), CpuId(5), CpuId(7)]
        );
        assert_eq!(CpuMask::first(3).bits(), 0b111);
    }

    #[test]
    fn test_mask_first() {
        let mask = CpuMask::first(4);
        assert_eq!(mask.count(), 4);
        assert!(mask.contains(CpuId(0)));
        assert!(mask.contains(CpuId(3)));
        assert!(!mask.contains(CpuId(4)));
        assert_eq!(mask.last(), Some(CpuId(3)));
    }

    #[test]
    fn test_mask_full() {
        let mask = CpuMask::first(MAX_CPUS);
        assert_eq!(mask.count(), MAX_CPUS);
        assert_eq!(mask.last(), Some(CpuId(MAX_CPUS as u32 - 1)));
    }

    #[test]
    fn test_mask_iter_ascending() {
        let mask: CpuMask = [CpuId(5), CpuId(1), CpuId(9)].into_iter().collect();
        let cpus: Vec<CpuId> = mask.iter().collect();
        assert_eq!(cpus, vec![CpuId(1), CpuId(5), CpuId(9)]);
    }

    #[test]
    fn test_mask_rejects_out_of_range() {
        let mut mask = CpuMask::empty();
        assert!(!mask.set(CpuId(MAX_CPUS as u32)));
        assert!(mask.is_empty());
        assert!(!mask.contains(CpuId(200)));
        assert_eq!(mask.last(), None);
    }
}
