use super::{PagingMode, RootPage};
use crate::entry::{EntryFlags, LongEntry, TableEntry};
use crate::error::VmError;
use crate::walk::EntrySlot;
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_cpu::LongSegmentation;
use kernel_info::memory::{DEVICE_SPACE, long};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_sync::SpinLock;

/// Process roots that can exist at the same time.
pub const MAX_ROOTS: usize = 64;

const PML4_SHIFT: u32 = 39;
const PDPT_SHIFT: u32 = 30;
const HUGE_SHIFT: u32 = 21;

#[allow(clippy::cast_possible_truncation)]
const DEVICE_PAGES: usize = (long::DEVICE_WINDOW_SIZE / long::HUGE_PAGE_SIZE) as usize;

#[allow(clippy::cast_possible_truncation)]
const fn level_index(va: u64, shift: u32) -> usize {
    ((va >> shift) & 0x1FF) as usize
}

/// Where the long-mode kernel lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LongLayout {
    /// Physical memory `0..LINEAR_MAP_SIZE` is mapped from here.
    pub kernel_base: u64,
    /// The device window is mapped from here.
    pub device_base: u64,
    /// Physical start of the device window.
    pub device_space: u64,
}

impl LongLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kernel_base: long::KERNEL_BASE,
            device_base: long::DEVICE_BASE,
            device_space: DEVICE_SPACE,
        }
    }
}

impl Default for LongLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared kernel hierarchy: one pml4, one pdpt, two directories of
/// 2 MiB pages for the linear map and one for devices.
#[derive(Debug, Copy, Clone)]
struct KernelTables {
    pml4: PhysicalPage<Size4K>,
    pdpt: PhysicalPage<Size4K>,
}

/// The two upper levels a process root hangs from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct UpperTables {
    root: RootPage,
    pml4: PhysicalPage<Size4K>,
    pdpt: PhysicalPage<Size4K>,
}

/// Four-level 64-bit paging.
///
/// The kernel half is a single pdpt shared by every address space. A process
/// owns a pml4 and a pdpt of its own that lead to its directory; those are
/// recorded in a side table keyed by the directory.
pub struct LongMode {
    layout: LongLayout,
    kernel: KernelTables,
    upper: SpinLock<[Option<UpperTables>; MAX_ROOTS]>,
}

impl LongMode {
    #[must_use]
    pub const fn layout(&self) -> &LongLayout {
        &self.layout
    }

    /// Number of process roots currently registered.
    #[must_use]
    pub fn live_roots(&self) -> usize {
        self.upper.with_lock(|slots| slots.iter().flatten().count())
    }

    fn link<M: PhysMapper>(
        mapper: &M,
        table: PhysicalPage<Size4K>,
        index: usize,
        target: PhysicalPage<Size4K>,
        flags: EntryFlags,
    ) {
        EntrySlot::<LongEntry>::new(table, index)
            .write(mapper, <LongEntry as TableEntry>::new(target, flags));
    }

    fn huge_page(pa: u64) -> PhysicalPage<Size4K> {
        PhysicalPage::containing(PhysicalAddress::new(pa))
    }

    fn upper_of(&self, root: RootPage) -> Option<UpperTables> {
        self.upper
            .with_lock(|slots| slots.iter().flatten().find(|upper| upper.root == root).copied())
    }
}

/// Allocate `N` zeroed frames, or none at all.
fn alloc_zeroed<const N: usize, M: PhysMapper, A: FrameAlloc>(
    mapper: &M,
    alloc: &mut A,
) -> Option<[PhysicalPage<Size4K>; N]> {
    let mut frames = [None; N];
    for n in 0..N {
        let Some(frame) = alloc.alloc_4k() else {
            frames[..n].iter().flatten().for_each(|&frame| alloc.free_4k(frame));
            return None;
        };
        // SAFETY: freshly allocated.
        unsafe { mapper.zero_frame(frame) };
        frames[n] = Some(frame);
    }
    Some(frames.map(|frame| frame.unwrap_or_else(|| unreachable!())))
}

impl PagingMode for LongMode {
    type Entry = LongEntry;
    type Segmentation = LongSegmentation;
    type Layout = LongLayout;

    const NAME: &'static str = "long";
    const DIRECTORY_SHIFT: u32 = HUGE_SHIFT;
    const USER_LIMIT: u64 = long::USER_LIMIT;
    #[allow(clippy::cast_possible_truncation)]
    const OWNED_SLOTS: usize = long::USER_DIRECTORY_SLOTS as usize;

    fn build_kernel<M: PhysMapper, A: FrameAlloc>(
        layout: LongLayout,
        mapper: &M,
        alloc: &mut A,
    ) -> Result<Self, VmError> {
        let [pml4, pdpt, linear_low, linear_high, devices] =
            alloc_zeroed::<5, _, _>(mapper, alloc).ok_or(VmError::OutOfMemory)?;

        let link = EntryFlags::kernel_rw().with_present(true);
        let large = link.with_large_page(true);
        let uncached = large.with_write_through(true).with_cache_disabled(true);

        Self::link(mapper, pml4, level_index(layout.kernel_base, PML4_SHIFT), pdpt, link);

        let linear_slot = level_index(layout.kernel_base, PDPT_SHIFT);
        for (n, directory) in [linear_low, linear_high].into_iter().enumerate() {
            Self::link(mapper, pdpt, linear_slot + n, directory, link);
            for i in 0..LongEntry::PER_TABLE {
                let pa = ((n * LongEntry::PER_TABLE + i) as u64) << HUGE_SHIFT;
                Self::link(mapper, directory, i, Self::huge_page(pa), large);
            }
        }

        Self::link(mapper, pdpt, level_index(layout.device_base, PDPT_SHIFT), devices, link);
        for i in 0..DEVICE_PAGES {
            let pa = layout.device_space + ((i as u64) << HUGE_SHIFT);
            Self::link(mapper, devices, i, Self::huge_page(pa), uncached);
        }

        log::info!(
            "long mode: kernel pml4 at {}, linear map at {:#x}, devices at {:#x}",
            pml4.base(),
            layout.kernel_base,
            layout.device_base
        );
        Ok(Self {
            layout,
            kernel: KernelTables { pml4, pdpt },
            upper: SpinLock::new([None; MAX_ROOTS]),
        })
    }

    fn kernel_root(&self) -> PhysicalPage<Size4K> {
        self.kernel.pml4
    }

    fn new_root<M: PhysMapper, A: FrameAlloc>(
        &self,
        mapper: &M,
        alloc: &mut A,
    ) -> Result<RootPage, VmError> {
        let [pml4, pdpt, root] =
            alloc_zeroed::<3, _, _>(mapper, alloc).ok_or(VmError::OutOfMemory)?;

        let registered = self.upper.with_lock(|slots| {
            let free = slots.iter_mut().find(|slot| slot.is_none())?;
            *free = Some(UpperTables { root, pml4, pdpt });
            Some(())
        });
        if registered.is_none() {
            log::warn!("long mode: all {MAX_ROOTS} root slots in use");
            [pml4, pdpt, root].into_iter().for_each(|frame| alloc.free_4k(frame));
            return Err(VmError::RootTableFull);
        }

        let link = EntryFlags::table_link();
        Self::link(mapper, pml4, 0, pdpt, link);
        Self::link(
            mapper,
            pml4,
            level_index(self.layout.kernel_base, PML4_SHIFT),
            self.kernel.pdpt,
            link,
        );
        Self::link(mapper, pdpt, 0, root, link);
        Ok(root)
    }

    /// # Panics
    /// If `root` was not created by [`new_root`](PagingMode::new_root).
    fn release_root<A: FrameAlloc>(&self, root: RootPage, alloc: &mut A) {
        let upper = self.upper.with_lock(|slots| {
            slots
                .iter_mut()
                .find(|slot| slot.is_some_and(|upper| upper.root == root))
                .and_then(Option::take)
        });
        let Some(upper) = upper else {
            panic!("release_root: {root} has no upper tables");
        };
        alloc.free_4k(upper.pml4);
        alloc.free_4k(upper.pdpt);
        alloc.free_4k(root);
    }

    /// # Panics
    /// If `root` was not created by [`new_root`](PagingMode::new_root).
    fn activation_root(&self, root: RootPage) -> PhysicalPage<Size4K> {
        self.upper_of(root)
            .unwrap_or_else(|| panic!("activation_root: {root} has no upper tables"))
            .pml4
    }
}

impl core::fmt::Debug for LongMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LongMode")
            .field("layout", &self.layout)
            .field("kernel_pml4", &self.kernel.pml4)
            .field("live_roots", &self.live_roots())
            .finish_non_exhaustive()
    }
}
