use super::Vm;
use crate::address_space::AddressSpace;
use crate::entry::TableEntry;
use crate::error::VmError;
use crate::map::map_pages;
use crate::mode::{PagingMode, RootPage};
use crate::walk::{free_tables, walk};
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::VirtualAddress;

impl<S: PagingMode, M: PhysMapper> Vm<'_, S, M> {
    /// A new address space with the kernel half attached and no user pages.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`], or [`VmError::RootTableFull`] in long mode.
    pub fn create<A: FrameAlloc>(&self, alloc: &mut A) -> Result<AddressSpace, VmError> {
        let root = self.mode.new_root(self.mapper, alloc)?;
        log::debug!("{} mode: created address space at {}", S::NAME, root.base());
        Ok(AddressSpace::with_root(root))
    }

    /// Deep-copy the first `size` bytes of `src` into a new address space
    /// with the same permissions and distinct frames.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] or [`VmError::RootTableFull`]; the partial
    /// copy is destroyed first.
    ///
    /// # Panics
    /// If a page below `size` is not mapped in `src`, or `src` has no root.
    pub fn duplicate<A: FrameAlloc>(
        &self,
        src: &AddressSpace,
        size: u64,
        alloc: &mut A,
    ) -> Result<AddressSpace, VmError> {
        let src_root = src.require_root("duplicate");
        let mut copy = self.create(alloc)?;
        let copy_root = copy.require_root("duplicate");

        if let Err(err) = self.copy_pages(src_root, copy_root, size, alloc) {
            log::warn!("duplicate: {err} after partial copy, releasing it");
            self.destroy(copy, alloc);
            return Err(err);
        }

        copy.set_size(size);
        Ok(copy)
    }

    fn copy_pages<A: FrameAlloc>(
        &self,
        src: RootPage,
        dst: RootPage,
        size: u64,
        alloc: &mut A,
    ) -> Result<(), VmError> {
        let mut va = VirtualAddress::zero();
        while va.as_u64() < size {
            let entry = walk::<S, M>(self.mapper, src, va)
                .unwrap_or_else(|| panic!("duplicate: entry should exist for {va}"))
                .read(self.mapper);
            assert!(entry.is_present(), "duplicate: page not present at {va}");

            let frame = alloc.alloc_4k().ok_or(VmError::OutOfMemory)?;
            // SAFETY: `frame` is fresh and the source frame belongs to `src`;
            // the two never alias.
            unsafe {
                self.mapper
                    .frame_bytes(frame)
                    .copy_from_slice(self.mapper.frame_bytes(entry.frame()));
            }
            map_pages::<S, M, A>(
                self.mapper,
                dst,
                va,
                PAGE_SIZE,
                frame.base(),
                entry.flags(),
                alloc,
            )
            .inspect_err(|_| alloc.free_4k(frame))?;

            va += PAGE_SIZE;
        }
        Ok(())
    }

    /// Free every user page, every owned table and the root of `space`.
    ///
    /// # Panics
    /// If `space` has no root.
    pub fn destroy<A: FrameAlloc>(&self, mut space: AddressSpace, alloc: &mut A) {
        let Some(root) = space.take_root() else {
            panic!("destroy: no translation root");
        };

        self.release_range(root, 0, S::USER_LIMIT, alloc);
        free_tables::<S, M, A>(self.mapper, root, S::OWNED_SLOTS, alloc);
        self.mode.release_root(root, alloc);
        log::debug!("{} mode: destroyed address space at {}", S::NAME, root.base());
    }

    /// Make the page at `va` inaccessible from user mode, keeping it mapped.
    /// Used for the guard page below a user stack.
    ///
    /// # Panics
    /// If no entry exists for `va`, or `space` has no root.
    pub fn clear_user_accessible(&self, space: &AddressSpace, va: VirtualAddress) {
        let root = space.require_root("clear_user_accessible");
        let slot = walk::<S, M>(self.mapper, root, va)
            .unwrap_or_else(|| panic!("clear_user_accessible: entry should exist for {va}"));
        let entry = slot.read(self.mapper);
        slot.write(self.mapper, entry.with_flags(entry.flags().with_user(false)));
    }
}
