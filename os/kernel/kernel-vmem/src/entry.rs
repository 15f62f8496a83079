//! Table entries of both paging modes.
//!
//! Both formats keep the same hardware flags in their low 12 bits and the
//! frame number above them, so [`EntryFlags`] is shared and each mode only
//! decides the entry width:
//!
//! | Bits   | Flag | Meaning                          |
//! |--------|------|----------------------------------|
//! | 0      | P    | Present                          |
//! | 1      | W    | Writable                         |
//! | 2      | U    | User accessible                  |
//! | 3      | PWT  | Write-through                    |
//! | 4      | PCD  | Cache disabled                   |
//! | 5      | A    | Accessed                         |
//! | 6      | D    | Dirty (leaf only)                |
//! | 7      | PS   | Large page (directory level)     |
//! | 8      | G    | Global (leaf only)               |
//! | 9..=11 | AVL  | Ignored by hardware              |

mod long;
mod short;

pub use long::LongEntry;
pub use short::ShortEntry;

use bitfield_struct::bitfield;
use core::fmt;
use kernel_memory_addresses::{PhysicalPage, Size4K};

/// The flag bits (0..=11) of a table entry.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct EntryFlags {
    pub present: bool,
    pub writable: bool,
    pub user: bool,
    pub write_through: bool,
    pub cache_disabled: bool,
    pub accessed: bool,
    pub dirty: bool,
    /// PS: a directory entry that maps a large page instead of a table.
    pub large_page: bool,
    pub global: bool,
    #[bits(3)]
    pub os_available: u8,
    #[bits(4)]
    __: u8,
}

impl EntryFlags {
    /// Width of the flag field inside an entry.
    pub const BITS: u32 = 12;

    /// Permissions of ordinary user memory.
    #[must_use]
    pub const fn user_rw() -> Self {
        Self::new().with_writable(true).with_user(true)
    }

    /// Permissions of writable kernel memory.
    #[must_use]
    pub const fn kernel_rw() -> Self {
        Self::new().with_writable(true)
    }

    /// Flags of a directory entry that links a process-owned table.
    ///
    /// Links are permissive; the leaf entries decide the effective access.
    #[must_use]
    pub const fn table_link() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user(true)
    }

    /// Bitwise union of two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() | other.into_bits())
    }
}

/// One slot of a 4 KiB translation table.
pub trait TableEntry: Copy + Eq + fmt::Debug {
    /// Slots in one table page.
    const PER_TABLE: usize;

    /// The non-present, all-zero entry.
    const EMPTY: Self;

    /// An entry pointing at `frame` with exactly `flags`.
    fn new(frame: PhysicalPage<Size4K>, flags: EntryFlags) -> Self;

    /// The frame (or table) this entry points at.
    fn frame(self) -> PhysicalPage<Size4K>;

    fn flags(self) -> EntryFlags;

    /// This entry with its flag bits replaced and its frame kept.
    #[must_use]
    fn with_flags(self, flags: EntryFlags) -> Self;

    #[inline]
    fn is_present(self) -> bool {
        self.flags().present()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_match_the_hardware_layout() {
        assert_eq!(EntryFlags::new().with_present(true).into_bits(), 0x001);
        assert_eq!(EntryFlags::user_rw().into_bits(), 0x006);
        assert_eq!(EntryFlags::kernel_rw().into_bits(), 0x002);
        assert_eq!(EntryFlags::table_link().into_bits(), 0x007);
        assert_eq!(EntryFlags::new().with_write_through(true).into_bits(), 0x008);
        assert_eq!(EntryFlags::new().with_cache_disabled(true).into_bits(), 0x010);
        assert_eq!(EntryFlags::new().with_large_page(true).into_bits(), 0x080);
        assert_eq!(EntryFlags::new().with_global(true).into_bits(), 0x100);
    }

    #[test]
    fn union_combines() {
        let flags = EntryFlags::kernel_rw().union(EntryFlags::new().with_present(true));
        assert!(flags.present());
        assert!(flags.writable());
        assert!(!flags.user());
    }
}
