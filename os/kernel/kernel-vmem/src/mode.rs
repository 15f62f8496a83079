//! The two hardware paging modes behind one strategy trait.
//!
//! Everything mode-specific lives here: entry width, table fan-out, the
//! user limit, how the shared kernel half is built and how a process root
//! becomes something the CPU can load. The address-space operations in
//! [`Vm`](crate::Vm) are written once against [`PagingMode`].
//!
//! ```text
//!            short mode                          long mode
//!   CR3 ─► directory (1024 × u32)     CR3 ─► pml4 ─[0]──► pdpt ─[0]──► directory (512 × u64)
//!            │ 0..512   user tables                  └[511]► kernel pdpt (shared)
//!            │ 512..    private copy of kernel tables
//! ```

mod long;
mod short;

pub use long::{LongLayout, LongMode, MAX_ROOTS};
pub use short::{KernelRegion, ShortLayout, ShortMode};

use crate::entry::TableEntry;
use crate::error::VmError;
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_cpu::Segmentation;
use kernel_memory_addresses::{PageSize, PhysicalPage, Size4K, VirtualAddress};

/// The directory page of an address space: the only table the
/// mode-independent code ever walks from.
pub type RootPage = PhysicalPage<Size4K>;

/// A paging mode: table geometry plus the kernel half it shares with every
/// process.
pub trait PagingMode: Sized {
    type Entry: TableEntry;
    type Segmentation: Segmentation;
    /// Addresses the kernel half is built from.
    type Layout;

    const NAME: &'static str;

    /// Bit position of the directory index in a virtual address.
    const DIRECTORY_SHIFT: u32;

    /// Bytes covered by one leaf table.
    const TABLE_SPAN: u64 = 1 << Self::DIRECTORY_SHIFT;

    /// Exclusive upper bound of user addresses.
    const USER_LIMIT: u64;

    /// Directory slots `0..OWNED_SLOTS` link tables owned by the address
    /// space and freed with it.
    const OWNED_SLOTS: usize;

    /// Exclusive upper bound of addresses a translation root can reach.
    const WALK_SPAN: u64 = (Self::Entry::PER_TABLE as u64) << Self::DIRECTORY_SHIFT;

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    fn directory_index(va: VirtualAddress) -> usize {
        ((va.as_u64() >> Self::DIRECTORY_SHIFT) as usize) % Self::Entry::PER_TABLE
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    fn table_index(va: VirtualAddress) -> usize {
        ((va.as_u64() >> Size4K::SHIFT) as usize) % Self::Entry::PER_TABLE
    }

    /// Build the kernel-only translation hierarchy.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`]; everything allocated so far is returned.
    fn build_kernel<M: PhysMapper, A: FrameAlloc>(
        layout: Self::Layout,
        mapper: &M,
        alloc: &mut A,
    ) -> Result<Self, VmError>;

    /// What the CPU loads while no process runs.
    fn kernel_root(&self) -> PhysicalPage<Size4K>;

    /// A new process directory with the kernel half reachable through it and
    /// no user mappings.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] or [`VmError::RootTableFull`]; nothing is
    /// leaked.
    fn new_root<M: PhysMapper, A: FrameAlloc>(
        &self,
        mapper: &M,
        alloc: &mut A,
    ) -> Result<RootPage, VmError>;

    /// Free the frames [`new_root`](Self::new_root) allocated beyond the
    /// owned tables. The owned tables must already be gone.
    fn release_root<A: FrameAlloc>(&self, root: RootPage, alloc: &mut A);

    /// The frame to load into CR3 to run on `root`.
    fn activation_root(&self, root: RootPage) -> PhysicalPage<Size4K>;
}
