//! # Segment descriptor encodings
//!
//! One 8-byte layout covers code, data and (32-bit) system descriptors:
//!
//! ```text
//! 63      56 55 54 53 52 51   48 47 46 45 44 43  40 39             16 15        0
//! +---------+--+--+--+--+-------+--+-----+--+------+-----------------+-----------+
//! | base_hi | G|DB| L|AV|lim_hi | P| DPL | S| type |   base[23:0]    | lim[15:0] |
//! +---------+--+--+--+--+-------+--+-----+--+------+-----------------+-----------+
//! ```
//!
//! In 32-bit mode base and limit are live and the four flat segments span the
//! whole 4 GiB. In long mode base and limit of code/data segments are ignored;
//! only type, S, DPL, P and L matter.

use crate::privilege::Dpl;
use bitfield_struct::bitfield;
use kernel_memory_addresses::VirtualAddress;

/// Values of the 4-bit `type` field.
pub mod segment_type {
    /// Code segment (executable).
    pub const EXECUTE: u8 = 0x8;
    /// Code: readable.
    pub const READABLE: u8 = 0x2;
    /// Data: writable.
    pub const WRITABLE: u8 = 0x2;
    /// System: available 32-bit TSS (also the 64-bit TSS type in long mode).
    pub const TSS_AVAILABLE: u8 = 0x9;
}

#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub limit_lo: u16,
    #[bits(24)]
    pub base_lo: u32,
    #[bits(4)]
    pub typ: u8,
    /// Code/data (`true`) or system (`false`).
    pub s: bool,
    #[bits(2)]
    pub dpl: Dpl,
    pub p: bool,
    #[bits(4)]
    pub limit_hi: u8,
    pub avl: bool,
    /// 64-bit code.
    pub l: bool,
    /// 32-bit operand size.
    pub db: bool,
    /// Limit counts 4 KiB units.
    pub g: bool,
    pub base_hi: u8,
}

impl SegmentDescriptor {
    pub const NULL: Self = Self::new();

    /// Page-granular segment covering `[base, base + limit]`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn segment(typ: u8, base: u32, limit: u32, dpl: Dpl) -> Self {
        let limit = limit >> 12;
        Self::new()
            .with_limit_lo(limit as u16)
            .with_base_lo(base & 0xFF_FFFF)
            .with_typ(typ)
            .with_s(true)
            .with_dpl(dpl)
            .with_p(true)
            .with_limit_hi((limit >> 16) as u8 & 0xF)
            .with_db(true)
            .with_g(true)
            .with_base_hi((base >> 24) as u8)
    }

    /// Byte-granular segment covering `[base, base + limit]`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn segment16(typ: u8, base: u32, limit: u32, dpl: Dpl) -> Self {
        Self::segment(typ, base, 0, dpl)
            .with_limit_lo(limit as u16)
            .with_limit_hi((limit >> 16) as u8 & 0xF)
            .with_g(false)
    }

    /// 32-bit segment spanning all 4 GiB from address zero.
    #[must_use]
    pub const fn flat(typ: u8, dpl: Dpl) -> Self {
        Self::segment(typ, 0, 0xFFFF_FFFF, dpl)
    }

    /// Long-mode code segment.
    #[must_use]
    pub const fn long_code(dpl: Dpl) -> Self {
        Self::new()
            .with_typ(segment_type::EXECUTE)
            .with_s(true)
            .with_dpl(dpl)
            .with_p(true)
            .with_l(true)
    }

    /// Long-mode data segment.
    #[must_use]
    pub const fn long_data(dpl: Dpl) -> Self {
        Self::new()
            .with_typ(segment_type::WRITABLE)
            .with_s(true)
            .with_dpl(dpl)
            .with_p(true)
    }

    /// The 32-bit base address.
    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base_lo() | (self.base_hi() as u32) << 24
    }
}

/// 16-byte long-mode TSS descriptor: two consecutive GDT slots.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TssDescriptor64 {
    pub low: SegmentDescriptor,
    /// `base[63:32]`; the upper half is reserved.
    pub high: u64,
}

impl TssDescriptor64 {
    /// Available TSS of `limit + 1` bytes at `base`, reachable with DPL 3.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(base: VirtualAddress, limit: u16) -> Self {
        let base = base.as_u64();
        let low = SegmentDescriptor::new()
            .with_limit_lo(limit)
            .with_base_lo((base & 0xFF_FFFF) as u32)
            .with_typ(segment_type::TSS_AVAILABLE)
            .with_dpl(Dpl::Ring3)
            .with_p(true)
            .with_base_hi((base >> 24) as u8);
        Self {
            low,
            high: base >> 32,
        }
    }
}

const _: () = {
    assert!(size_of::<SegmentDescriptor>() == 8);
    assert!(size_of::<TssDescriptor64>() == 16);
};
