use super::{EntryFlags, TableEntry};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalPage, Size4K};

/// A 64-bit entry of the four-level long-mode tables.
///
/// | Bits    | Field                            |
/// |---------|----------------------------------|
/// | 0..=11  | [`EntryFlags`]                   |
/// | 12..=51 | physical frame number            |
/// | 52..=62 | ignored by hardware              |
/// | 63      | `NX`, execute disable            |
///
/// The frame field is shared between table links and large pages; a 2 MiB
/// leaf must carry a 2 MiB aligned frame.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct LongEntry {
    #[bits(12)]
    flag_bits: u16,
    #[bits(40)]
    frame_number: u64,
    #[bits(11)]
    pub os_available_high: u16,
    pub no_execute: bool,
}

impl TableEntry for LongEntry {
    const PER_TABLE: usize = 512;
    const EMPTY: Self = Self::new();

    fn new(frame: PhysicalPage<Size4K>, flags: EntryFlags) -> Self {
        Self::new()
            .with_flag_bits(flags.into_bits())
            .with_frame_number(frame.number())
    }

    fn frame(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_number(self.frame_number())
    }

    fn flags(self) -> EntryFlags {
        EntryFlags::from_bits(self.flag_bits())
    }

    fn with_flags(self, flags: EntryFlags) -> Self {
        self.with_flag_bits(flags.into_bits())
    }
}
