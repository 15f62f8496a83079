//! # Direct-map `PhysMapper`
//!
//! Both paging modes map physical memory linearly at `KERNEL_BASE`, so
//! reaching a physical address from kernel code is a single addition.

use crate::PhysMapper;
use kernel_info::memory::{long, short};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// [`PhysMapper`] for a kernel whose page tables map physical memory at a
/// fixed virtual offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DirectMapper {
    offset: u64,
}

impl DirectMapper {
    /// # Safety
    /// The active page tables must map all frames the kernel touches at
    /// `offset + physical address`.
    #[must_use]
    pub const unsafe fn with_offset(offset: u64) -> Self {
        Self { offset }
    }

    /// Direct map of the 32-bit mode.
    ///
    /// # Safety
    /// The short-mode kernel region must be active.
    #[must_use]
    pub const unsafe fn short_mode() -> Self {
        unsafe { Self::with_offset(short::KERNEL_BASE) }
    }

    /// Direct map of long mode.
    ///
    /// # Safety
    /// The long-mode kernel region must be active.
    #[must_use]
    pub const unsafe fn long_mode() -> Self {
        unsafe { Self::with_offset(long::KERNEL_BASE) }
    }

    /// Inverse of [`PhysMapper::phys_to_virt`] for addresses inside the direct map.
    #[must_use]
    pub const fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64().wrapping_sub(self.offset))
    }
}

unsafe impl PhysMapper for DirectMapper {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u64().wrapping_add(self.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_match_the_layout() {
        let short = unsafe { DirectMapper::short_mode() };
        let long = unsafe { DirectMapper::long_mode() };
        let pa = PhysicalAddress::new(0x0012_3000);
        assert_eq!(short.phys_to_virt(pa).as_u64(), 0x8012_3000);
        assert_eq!(long.phys_to_virt(pa).as_u64(), 0xFFFF_FFFF_8012_3000);
        assert_eq!(long.virt_to_phys(long.phys_to_virt(pa)), pa);
    }
}
