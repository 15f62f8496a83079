use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalPage, Size4K};

/// CR3: the translation-root register.
///
/// Holds the physical base of the top-level paging structure: the page
/// directory in 32-bit paging, the PML4 in long mode. PCID is not used, so
/// bits 0..12 only carry the two cache-control flags. In 32-bit mode the upper
/// half is simply never set.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Cr3 {
    /// Bits 0–2: reserved.
    #[bits(3)]
    __: u8,

    /// Bit 3: page-level write-through for the root table.
    pub pwt: bool,

    /// Bit 4: page-level cache disable for the root table.
    pub pcd: bool,

    /// Bits 5–11: reserved.
    #[bits(7)]
    __: u8,

    /// Bits 12–51: root table physical base >> 12.
    #[bits(40)]
    root_number: u64,

    /// Bits 52–63: reserved.
    #[bits(12)]
    __: u16,
}

impl Cr3 {
    /// CR3 value selecting `root`, write-back cached.
    #[must_use]
    pub const fn from_root(root: PhysicalPage<Size4K>) -> Self {
        Self::new().with_root_number(root.number())
    }

    /// The physical page holding the root table.
    #[must_use]
    pub const fn root(&self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_number(self.root_number())
    }
}
