use super::{PagingMode, RootPage};
use crate::entry::{EntryFlags, ShortEntry};
use crate::error::VmError;
use crate::map::map_pages;
use crate::walk::free_tables;
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_cpu::ShortSegmentation;
use kernel_info::memory::{DEVICE_SPACE, EXTENDED_MEMORY, PHYS_TOP, short};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// One range of the kernel half of every short-mode address space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KernelRegion {
    pub virt: VirtualAddress,
    pub phys_start: PhysicalAddress,
    pub phys_end: PhysicalAddress,
    pub perm: EntryFlags,
}

impl KernelRegion {
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.phys_end.as_u64() - self.phys_start.as_u64()
    }
}

/// Where the short-mode kernel lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShortLayout {
    /// Physical memory is mapped from here.
    pub kernel_base: u64,
    /// Start of the kernel text.
    pub kernel_link: u64,
    /// Start of the kernel data; text ends here.
    pub data: VirtualAddress,
    /// Top of usable physical memory.
    pub phys_top: u64,
    /// Physical start of device space, mapped at the same virtual address.
    pub device_space: u64,
}

impl ShortLayout {
    /// The standard layout with kernel data starting at `data`.
    #[must_use]
    pub const fn new(data: VirtualAddress) -> Self {
        Self {
            kernel_base: short::KERNEL_BASE,
            kernel_link: short::KERNEL_LINK,
            data,
            phys_top: PHYS_TOP,
            device_space: DEVICE_SPACE,
        }
    }

    const fn virt_to_phys(&self, va: u64) -> PhysicalAddress {
        PhysicalAddress::new(va - self.kernel_base)
    }

    /// The kernel mappings: low memory, read-only text, data plus the rest
    /// of physical memory, device space.
    #[must_use]
    pub const fn regions(&self) -> [KernelRegion; 4] {
        [
            KernelRegion {
                virt: VirtualAddress::new(self.kernel_base),
                phys_start: PhysicalAddress::zero(),
                phys_end: PhysicalAddress::new(EXTENDED_MEMORY),
                perm: EntryFlags::kernel_rw(),
            },
            KernelRegion {
                virt: VirtualAddress::new(self.kernel_link),
                phys_start: self.virt_to_phys(self.kernel_link),
                phys_end: self.virt_to_phys(self.data.as_u64()),
                perm: EntryFlags::new(),
            },
            KernelRegion {
                virt: self.data,
                phys_start: self.virt_to_phys(self.data.as_u64()),
                phys_end: PhysicalAddress::new(self.phys_top),
                perm: EntryFlags::kernel_rw(),
            },
            KernelRegion {
                virt: VirtualAddress::new(self.device_space),
                phys_start: PhysicalAddress::new(self.device_space),
                phys_end: PhysicalAddress::new(short::ADDRESS_SPACE_END),
                perm: EntryFlags::kernel_rw(),
            },
        ]
    }
}

/// Two-level 32-bit paging.
///
/// There is no shared kernel table: every directory, the kernel's own
/// included, gets a private copy of the kernel mappings.
#[derive(Debug)]
pub struct ShortMode {
    layout: ShortLayout,
    kernel_root: RootPage,
}

impl ShortMode {
    #[must_use]
    pub const fn layout(&self) -> &ShortLayout {
        &self.layout
    }

    fn build_root<M: PhysMapper, A: FrameAlloc>(
        layout: &ShortLayout,
        mapper: &M,
        alloc: &mut A,
    ) -> Result<RootPage, VmError> {
        let root = alloc.alloc_4k().ok_or(VmError::OutOfMemory)?;
        // SAFETY: freshly allocated.
        unsafe { mapper.zero_frame(root) };

        for region in layout.regions() {
            if let Err(err) = map_pages::<Self, _, _>(
                mapper,
                root,
                region.virt,
                region.size(),
                region.phys_start,
                region.perm,
                alloc,
            ) {
                log::warn!("short mode: kernel mappings at {} failed: {err}", region.virt);
                free_tables::<Self, _, _>(mapper, root, Self::OWNED_SLOTS, alloc);
                alloc.free_4k(root);
                return Err(err);
            }
        }
        Ok(root)
    }
}

impl PagingMode for ShortMode {
    type Entry = ShortEntry;
    type Segmentation = ShortSegmentation;
    type Layout = ShortLayout;

    const NAME: &'static str = "short";
    const DIRECTORY_SHIFT: u32 = 22;
    const USER_LIMIT: u64 = short::USER_LIMIT;
    const OWNED_SLOTS: usize = 1024;

    /// # Panics
    /// If physical memory would run into the device window, or the data
    /// start is not a page inside the kernel image range.
    fn build_kernel<M: PhysMapper, A: FrameAlloc>(
        layout: ShortLayout,
        mapper: &M,
        alloc: &mut A,
    ) -> Result<Self, VmError> {
        assert!(
            layout.kernel_base + layout.phys_top <= layout.device_space,
            "physical top overlaps device space: {:#x} > {:#x}",
            layout.kernel_base + layout.phys_top,
            layout.device_space
        );
        assert!(
            layout.data.is_aligned::<Size4K>()
                && layout.data.as_u64() > layout.kernel_link
                && layout.data.as_u64() < layout.kernel_base + layout.phys_top,
            "kernel data start {} outside the kernel image",
            layout.data
        );

        let kernel_root = Self::build_root(&layout, mapper, alloc)?;
        log::info!(
            "short mode: kernel directory at {}, data at {}",
            kernel_root.base(),
            layout.data
        );
        Ok(Self {
            layout,
            kernel_root,
        })
    }

    fn kernel_root(&self) -> PhysicalPage<Size4K> {
        self.kernel_root
    }

    fn new_root<M: PhysMapper, A: FrameAlloc>(
        &self,
        mapper: &M,
        alloc: &mut A,
    ) -> Result<RootPage, VmError> {
        Self::build_root(&self.layout, mapper, alloc)
    }

    fn release_root<A: FrameAlloc>(&self, root: RootPage, alloc: &mut A) {
        alloc.free_4k(root);
    }

    fn activation_root(&self, root: RootPage) -> PhysicalPage<Size4K> {
        root
    }
}
