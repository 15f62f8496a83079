use crate::entry::{EntryFlags, TableEntry};
use crate::error::VmError;
use crate::mode::{PagingMode, RootPage};
use crate::walk::walk_or_create;
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// Map every page touching `[va, va + size)` to consecutive frames starting
/// at the frame containing `pa`, with `perm` plus present.
///
/// Tables are created on demand. Pages mapped before an allocation failure
/// stay mapped; the caller unwinds them.
///
/// # Errors
/// [`VmError::OutOfMemory`] if a table cannot be allocated.
///
/// # Panics
/// If any page in the range is already mapped, or `size` is zero.
pub fn map_pages<S: PagingMode, M: PhysMapper, A: FrameAlloc>(
    mapper: &M,
    root: RootPage,
    va: VirtualAddress,
    size: u64,
    pa: PhysicalAddress,
    perm: EntryFlags,
    alloc: &mut A,
) -> Result<(), VmError> {
    assert!(size > 0, "map_pages: empty range at {va}");

    let flags = perm.with_present(true);
    let last = VirtualAddress::new(va.as_u64() + size - 1).align_down::<Size4K>();
    let mut page = va.align_down::<Size4K>();
    let mut frame = PhysicalPage::<Size4K>::containing(pa);

    loop {
        let slot = walk_or_create::<S, _, _>(mapper, root, page, alloc).ok_or(VmError::OutOfMemory)?;
        assert!(
            !slot.read(mapper).is_present(),
            "remap: {page} is already mapped"
        );
        slot.write(mapper, S::Entry::new(frame, flags));

        if page == last {
            return Ok(());
        }
        page += PAGE_SIZE;
        frame = PhysicalPage::from_number(frame.number() + 1);
    }
}
