//! # Segment selectors
//!
//! ```text
//!  15            3 2  1  0
//! +----------------+--+----+
//! |   Index[12:0]  |TI| RPL|
//! +----------------+--+----+
//! ```
//!
//! Both modes use the same descriptor-table layout, so the indexes are shared.

use crate::privilege::Dpl;
use bitfield_struct::bitfield;

/// Descriptor-table slots, identical in both modes.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u16)]
pub enum SegmentIndex {
    KernelCode = 1,
    KernelData = 2,
    /// CPU-local storage (GS in short mode; unused slot in long mode).
    CpuLocal = 3,
    UserCode = 4,
    UserData = 5,
    /// Task state; occupies slots 6 and 7 in long mode.
    TaskState = 6,
}

impl SegmentIndex {
    #[inline]
    #[must_use]
    pub const fn slot(self) -> usize {
        self as usize
    }
}

/// A 16-bit segment selector.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct Selector {
    #[bits(2)]
    pub rpl: Dpl,
    /// Table indicator: `false` selects the GDT.
    pub ldt: bool,
    #[bits(13)]
    pub index: u16,
}

impl Selector {
    /// GDT selector for `index` requested at `rpl`.
    #[inline]
    #[must_use]
    pub const fn gdt(index: SegmentIndex, rpl: Dpl) -> Self {
        Self::new().with_index(index as u16).with_rpl(rpl)
    }
}
