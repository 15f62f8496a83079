use super::Vm;
use crate::address_space::AddressSpace;
use crate::entry::{EntryFlags, TableEntry};
use crate::error::VmError;
use crate::map::map_pages;
use crate::mode::{PagingMode, RootPage};
use crate::walk::{EntrySlot, table_is_empty, walk};
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{Size4K, VirtualAddress};

impl<S: PagingMode, M: PhysMapper> Vm<'_, S, M> {
    /// Grow `space` to `new_size` bytes with zeroed, user-writable pages and
    /// return the new size. A `new_size` below the current size changes
    /// nothing and returns the current size.
    ///
    /// # Errors
    /// - [`VmError::BeyondUserLimit`] if `new_size` reaches the user limit.
    /// - [`VmError::OutOfMemory`]; pages mapped by this call are released
    ///   and the size is unchanged.
    ///
    /// # Panics
    /// If `space` has no root.
    pub fn grow<A: FrameAlloc>(
        &self,
        space: &mut AddressSpace,
        new_size: u64,
        alloc: &mut A,
    ) -> Result<u64, VmError> {
        let root = space.require_root("grow");
        if new_size >= S::USER_LIMIT {
            return Err(VmError::BeyondUserLimit {
                requested: new_size,
                limit: S::USER_LIMIT,
            });
        }
        let old_size = space.size();
        if new_size < old_size {
            return Ok(old_size);
        }

        let mut va = VirtualAddress::new(old_size).align_up::<Size4K>();
        while va.as_u64() < new_size {
            if let Err(err) = self.map_zeroed_page(root, va, alloc) {
                log::warn!("grow: {err} at {va}, rolling back to {old_size:#x}");
                self.release_range(root, old_size, new_size, alloc);
                return Err(err);
            }
            va += PAGE_SIZE;
        }

        space.set_size(new_size);
        Ok(new_size)
    }

    /// Shrink `space` to `new_size` bytes, freeing the pages above it, and
    /// return the new size. A `new_size` at or above the current size
    /// changes nothing and returns the current size.
    ///
    /// # Panics
    /// If `space` has no root.
    pub fn shrink<A: FrameAlloc>(
        &self,
        space: &mut AddressSpace,
        new_size: u64,
        alloc: &mut A,
    ) -> u64 {
        let root = space.require_root("shrink");
        let old_size = space.size();
        if new_size >= old_size {
            return old_size;
        }

        self.release_range(root, new_size, old_size, alloc);
        space.set_size(new_size);
        new_size
    }

    fn map_zeroed_page<A: FrameAlloc>(
        &self,
        root: RootPage,
        va: VirtualAddress,
        alloc: &mut A,
    ) -> Result<(), VmError> {
        let frame = alloc.alloc_4k().ok_or(VmError::OutOfMemory)?;
        // SAFETY: freshly allocated.
        unsafe { self.mapper.zero_frame(frame) };
        map_pages::<S, M, A>(
            self.mapper,
            root,
            va,
            PAGE_SIZE,
            frame.base(),
            EntryFlags::user_rw(),
            alloc,
        )
        .inspect_err(|_| alloc.free_4k(frame))
    }

    /// Unmap and free every page in `[align_up(from), to)`, then free the
    /// tables the range left empty. Holes are skipped a whole table at a
    /// time.
    ///
    /// # Panics
    /// If a present entry has no frame.
    pub(crate) fn release_range<A: FrameAlloc>(
        &self,
        root: RootPage,
        from: u64,
        to: u64,
        alloc: &mut A,
    ) {
        let start = VirtualAddress::new(from).align_up::<Size4K>();
        let end = VirtualAddress::new(to);

        let mut va = start;
        while va < end {
            let Some(slot) = walk::<S, M>(self.mapper, root, va) else {
                va = VirtualAddress::new((va.as_u64() & !(S::TABLE_SPAN - 1)) + S::TABLE_SPAN);
                continue;
            };
            let entry = slot.read(self.mapper);
            if entry.is_present() {
                let frame = entry.frame();
                assert!(
                    !frame.base().is_null(),
                    "present entry without a frame at {va}"
                );
                alloc.free_4k(frame);
                slot.write(self.mapper, S::Entry::EMPTY);
            }
            va += PAGE_SIZE;
        }

        self.reclaim_tables(root, start, end, alloc);
    }

    fn reclaim_tables<A: FrameAlloc>(
        &self,
        root: RootPage,
        start: VirtualAddress,
        end: VirtualAddress,
        alloc: &mut A,
    ) {
        if start >= end {
            return;
        }
        let first = S::directory_index(start);
        let last = S::directory_index(VirtualAddress::new(end.as_u64() - 1));
        for index in first..=last {
            let slot = EntrySlot::<S::Entry>::new(root, index);
            let link = slot.read(self.mapper);
            if link.is_present() && table_is_empty::<S::Entry, M>(self.mapper, link.frame()) {
                alloc.free_4k(link.frame());
                slot.write(self.mapper, S::Entry::EMPTY);
            }
        }
    }
}
