use super::Vm;
use crate::address_space::AddressSpace;
use crate::entry::TableEntry;
use crate::error::VmError;
use crate::mode::PagingMode;
use crate::walk::walk;
use kernel_alloc::PhysMapper;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{Size4K, VirtualAddress};

impl<S: PagingMode, M: PhysMapper> Vm<'_, S, M> {
    /// The kernel address of the frame behind the user page at `va`.
    ///
    /// `None` unless the page is below the user limit, present and user
    /// accessible. The result is the page base; the offset of `va` is not
    /// applied.
    #[must_use]
    pub fn translate(&self, space: &AddressSpace, va: VirtualAddress) -> Option<VirtualAddress> {
        if va.as_u64() >= S::USER_LIMIT {
            return None;
        }
        let entry = walk::<S, M>(self.mapper, space.root()?, va)?.read(self.mapper);
        let flags = entry.flags();
        (flags.present() && flags.user()).then(|| self.mapper.phys_to_virt(entry.frame().base()))
    }

    /// Copy `src` to user address `dst` of `space`, page by page.
    ///
    /// # Errors
    /// [`VmError::BadUserAddress`] with the first page that does not
    /// translate. Pages before it have been written.
    pub fn copy_out(
        &self,
        space: &AddressSpace,
        dst: VirtualAddress,
        src: &[u8],
    ) -> Result<(), VmError> {
        self.for_each_user_chunk(space, dst, src.len(), |frame, offset, done, len| {
            // SAFETY: `frame` is the kernel view of a user frame; the chunk
            // stays inside it.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    src[done..].as_ptr(),
                    (frame + offset).as_mut_ptr::<u8>(),
                    len,
                );
            }
        })
    }

    /// Copy user memory at `src` of `space` into `dst`.
    ///
    /// # Errors
    /// [`VmError::BadUserAddress`] with the first page that does not
    /// translate.
    pub fn copy_in(
        &self,
        space: &AddressSpace,
        src: VirtualAddress,
        dst: &mut [u8],
    ) -> Result<(), VmError> {
        let len = dst.len();
        self.for_each_user_chunk(space, src, len, |frame, offset, done, n| {
            // SAFETY: see `copy_out`.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    (frame + offset).as_mut_ptr::<u8>().cast_const(),
                    dst[done..].as_mut_ptr(),
                    n,
                );
            }
        })
    }

    /// Split `[va, va + len)` at page boundaries and call `f` with the
    /// kernel address of each page, the offset into it, the bytes handled
    /// so far and the chunk length.
    fn for_each_user_chunk(
        &self,
        space: &AddressSpace,
        va: VirtualAddress,
        len: usize,
        mut f: impl FnMut(VirtualAddress, u64, usize, usize),
    ) -> Result<(), VmError> {
        let mut done = 0;
        let mut va = va;
        while done < len {
            let page = va.align_down::<Size4K>();
            let frame = self
                .translate(space, page)
                .ok_or(VmError::BadUserAddress(page))?;
            let offset = va.offset_in::<Size4K>();
            #[allow(clippy::cast_possible_truncation)]
            let n = ((PAGE_SIZE - offset) as usize).min(len - done);

            f(frame, offset, done, n);

            done += n;
            va = page + PAGE_SIZE;
        }
        Ok(())
    }
}
