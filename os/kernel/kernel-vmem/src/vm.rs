//! The address-space operations, written once over [`PagingMode`].

mod lifecycle;
mod load;
mod resize;
mod switch;
mod user;

pub use load::FileRead;

use crate::address_space::AddressSpace;
use crate::entry::EntryFlags;
use crate::error::VmError;
use crate::map::map_pages;
use crate::mode::PagingMode;
use crate::walk::{EntrySlot, walk};
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_cpu::{CpuInitError, CpuSetup, PerCpu, Segmentation};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_registers::Processor;

/// The virtual-memory subsystem: the kernel half of one paging mode plus
/// the way to reach physical memory.
pub struct Vm<'m, S: PagingMode, M: PhysMapper> {
    mode: S,
    mapper: &'m M,
}

impl<'m, S: PagingMode, M: PhysMapper> Vm<'m, S, M> {
    /// Build the kernel hierarchy. Call once at boot, before any process
    /// exists; activate it on every CPU with
    /// [`activate_kernel`](Self::activate_kernel).
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] if the kernel tables do not fit.
    pub fn boot<A: FrameAlloc>(
        layout: S::Layout,
        mapper: &'m M,
        alloc: &mut A,
    ) -> Result<Self, VmError> {
        let mode = S::build_kernel(layout, mapper, alloc)?;
        Ok(Self { mode, mapper })
    }

    #[must_use]
    pub const fn mode(&self) -> &S {
        &self.mode
    }

    #[must_use]
    pub const fn mapper(&self) -> &'m M {
        self.mapper
    }

    /// Build and load the descriptor set of the calling CPU.
    ///
    /// # Errors
    /// [`CpuInitError::OutOfMemory`] if the per-CPU pages cannot be allocated.
    pub fn init_cpu<A: FrameAlloc, P: Processor>(
        &self,
        setup: &CpuSetup<'_>,
        alloc: &mut A,
        cpu: &mut P,
    ) -> Result<PerCpu, CpuInitError> {
        <S::Segmentation as Segmentation>::init_cpu(setup, self.mapper, alloc, cpu)
    }

    /// The leaf slot for `va` in `space`, if a table covers it.
    ///
    /// # Panics
    /// If `space` has no root.
    #[must_use]
    pub fn walk(&self, space: &AddressSpace, va: VirtualAddress) -> Option<EntrySlot<S::Entry>> {
        walk::<S, M>(self.mapper, space.require_root("walk"), va)
    }

    /// The leaf entry for `va` in `space`, if a table covers it.
    #[must_use]
    pub fn entry(&self, space: &AddressSpace, va: VirtualAddress) -> Option<S::Entry> {
        self.walk(space, va).map(|slot| slot.read(self.mapper))
    }

    /// Map `[va, va + size)` of `space` to frames starting at `pa`.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] if a table cannot be allocated.
    ///
    /// # Panics
    /// If a page in the range is already mapped, or the range reaches past
    /// the user limit.
    pub fn map_pages<A: FrameAlloc>(
        &self,
        space: &AddressSpace,
        va: VirtualAddress,
        size: u64,
        pa: PhysicalAddress,
        perm: EntryFlags,
        alloc: &mut A,
    ) -> Result<(), VmError> {
        let root = space.require_root("map_pages");
        assert!(
            va.as_u64().checked_add(size).is_some_and(|end| end <= S::USER_LIMIT),
            "map_pages: [{va}, +{size:#x}) reaches past the user limit {:#x}",
            S::USER_LIMIT
        );
        map_pages::<S, M, A>(self.mapper, root, va, size, pa, perm, alloc)
    }
}

impl<S: PagingMode + core::fmt::Debug, M: PhysMapper> core::fmt::Debug for Vm<'_, S, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vm").field("mode", &self.mode).finish_non_exhaustive()
    }
}
