//! Locating and creating leaf entries.
//!
//! Every process-owned hierarchy seen by the walker has exactly two levels:
//! a directory (the translation root) and leaf tables. Long mode hangs its
//! upper levels above the directory, so the walker never sees them.

use crate::entry::{EntryFlags, TableEntry};
use crate::mode::{PagingMode, RootPage};
use core::marker::PhantomData;
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};

/// One entry of a table page, addressed by table frame and index.
///
/// Reads and writes go through a [`PhysMapper`], so a slot stays valid only
/// as long as its table is not freed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EntrySlot<E> {
    table: PhysicalPage<Size4K>,
    index: usize,
    _entry: PhantomData<E>,
}

impl<E: TableEntry> EntrySlot<E> {
    pub(crate) fn new(table: PhysicalPage<Size4K>, index: usize) -> Self {
        debug_assert!(index < E::PER_TABLE);
        Self {
            table,
            index,
            _entry: PhantomData,
        }
    }

    #[must_use]
    pub const fn table(self) -> PhysicalPage<Size4K> {
        self.table
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    #[must_use]
    pub fn read<M: PhysMapper>(self, mapper: &M) -> E {
        // SAFETY: table pages are mapped by the mapper contract and the index
        // is below `PER_TABLE`, so the pointer stays inside the frame.
        unsafe { self.ptr(mapper).read_volatile() }
    }

    pub fn write<M: PhysMapper>(self, mapper: &M, entry: E) {
        // SAFETY: see `read`.
        unsafe { self.ptr(mapper).write_volatile(entry) }
    }

    fn ptr<M: PhysMapper>(self, mapper: &M) -> *mut E {
        let offset = (self.index * core::mem::size_of::<E>()) as u64;
        (mapper.phys_to_virt(self.table.base()) + offset).as_mut_ptr()
    }
}

/// The leaf slot for `va`, or `None` if no table covers it. Addresses at or
/// above [`PagingMode::WALK_SPAN`] are never covered.
#[must_use]
pub fn walk<S: PagingMode, M: PhysMapper>(
    mapper: &M,
    root: RootPage,
    va: VirtualAddress,
) -> Option<EntrySlot<S::Entry>> {
    if va.as_u64() >= S::WALK_SPAN {
        return None;
    }
    let link = EntrySlot::<S::Entry>::new(root, S::directory_index(va)).read(mapper);
    if !link.is_present() {
        return None;
    }
    debug_assert!(!link.flags().large_page(), "walk: {va} lies in a large page");
    Some(EntrySlot::new(link.frame(), S::table_index(va)))
}

/// Like [`walk`], but allocates and links a zeroed table when none covers
/// `va`. Returns `None` only if that allocation fails.
///
/// # Panics
/// If `va` lies at or above [`PagingMode::WALK_SPAN`].
#[must_use]
pub fn walk_or_create<S: PagingMode, M: PhysMapper, A: FrameAlloc>(
    mapper: &M,
    root: RootPage,
    va: VirtualAddress,
    alloc: &mut A,
) -> Option<EntrySlot<S::Entry>> {
    assert!(
        va.as_u64() < S::WALK_SPAN,
        "walk: {va} is beyond the reach of a {} root",
        S::NAME
    );
    let slot = EntrySlot::<S::Entry>::new(root, S::directory_index(va));
    let link = slot.read(mapper);
    let table = if link.is_present() {
        debug_assert!(!link.flags().large_page(), "walk: {va} lies in a large page");
        link.frame()
    } else {
        let table = alloc.alloc_4k()?;
        // SAFETY: freshly allocated, nothing else refers to it.
        unsafe { mapper.zero_frame(table) };
        slot.write(mapper, S::Entry::new(table, EntryFlags::table_link()));
        table
    };
    Some(EntrySlot::new(table, S::table_index(va)))
}

/// True if no entry of `table` is present.
pub(crate) fn table_is_empty<E: TableEntry, M: PhysMapper>(
    mapper: &M,
    table: PhysicalPage<Size4K>,
) -> bool {
    (0..E::PER_TABLE).all(|index| !EntrySlot::<E>::new(table, index).read(mapper).is_present())
}

/// Free the tables linked from directory slots `0..slots` of `root` and
/// clear those slots. Leaf frames are left alone.
pub(crate) fn free_tables<S: PagingMode, M: PhysMapper, A: FrameAlloc>(
    mapper: &M,
    root: RootPage,
    slots: usize,
    alloc: &mut A,
) {
    for index in 0..slots {
        let slot = EntrySlot::<S::Entry>::new(root, index);
        let link = slot.read(mapper);
        if link.is_present() {
            alloc.free_4k(link.frame());
            slot.write(mapper, S::Entry::EMPTY);
        }
    }
}
