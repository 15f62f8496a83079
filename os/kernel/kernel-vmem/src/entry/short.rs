use super::{EntryFlags, TableEntry};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalPage, Size4K};

/// A 32-bit entry of the two-level short-mode tables.
///
/// Directory and table entries share the format: flags in bits 0..=11, the
/// frame number in bits 12..=31.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct ShortEntry {
    #[bits(12)]
    flag_bits: u16,
    #[bits(20)]
    frame_number: u32,
}

impl TableEntry for ShortEntry {
    const PER_TABLE: usize = 1024;
    const EMPTY: Self = Self::new();

    #[allow(clippy::cast_possible_truncation)]
    fn new(frame: PhysicalPage<Size4K>, flags: EntryFlags) -> Self {
        debug_assert!(frame.number() < (1 << 20), "{frame} is out of reach");
        Self::new()
            .with_flag_bits(flags.into_bits())
            .with_frame_number(frame.number() as u32)
    }

    fn frame(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_number(u64::from(self.frame_number()))
    }

    fn flags(self) -> EntryFlags {
        EntryFlags::from_bits(self.flag_bits())
    }

    fn with_flags(self, flags: EntryFlags) -> Self {
        self.with_flag_bits(flags.into_bits())
    }
}
