//! # Long-mode gate table
//!
//! 256 gates of 16 bytes each fill exactly one page. Every vector points at its
//! entry stub in kernel code; only the system-call vector may be raised from
//! user mode with `int`.

use crate::privilege::Dpl;
use crate::selectors::{SegmentIndex, Selector};
use bitfield_struct::bitfield;
use kernel_memory_addresses::VirtualAddress;

/// Number of vectors.
pub const GATE_COUNT: usize = 256;

/// Vector user programs raise to enter the kernel.
pub const SYSCALL_VECTOR: usize = 64;

/// Attribute half-word of a gate: IST index, type, DPL and present bit.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct GateAttr {
    #[bits(3)]
    pub ist: u8,
    #[bits(5)]
    __: u8,
    /// 0xE interrupt gate (clears IF on entry), 0xF trap gate.
    #[bits(4)]
    pub typ: u8,
    /// Must be zero for interrupt and trap gates.
    pub s: bool,
    #[bits(2)]
    pub dpl: Dpl,
    pub present: bool,
}

impl GateAttr {
    #[must_use]
    pub const fn interrupt_gate(dpl: Dpl) -> Self {
        Self::new().with_typ(0xE).with_dpl(dpl).with_present(true)
    }

    #[must_use]
    pub const fn trap_gate(dpl: Dpl) -> Self {
        Self::new().with_typ(0xF).with_dpl(dpl).with_present(true)
    }
}

/// One 16-byte long-mode gate descriptor.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Gate {
    offset_lo: u16,
    selector: u16,
    attr: u16,
    offset_mid: u16,
    offset_hi: u32,
    _zero: u32,
}

impl Gate {
    /// Gate into kernel code at `handler`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(handler: VirtualAddress, attr: GateAttr) -> Self {
        let addr = handler.as_u64();
        Self {
            offset_lo: addr as u16,
            selector: Selector::gdt(SegmentIndex::KernelCode, Dpl::Ring0).into_bits(),
            attr: attr.into_bits(),
            offset_mid: (addr >> 16) as u16,
            offset_hi: (addr >> 32) as u32,
            _zero: 0,
        }
    }

    /// The gate for `vector`: interrupt gate at DPL 0, except the system-call
    /// vector which is a trap gate reachable from ring 3.
    #[must_use]
    pub const fn for_vector(vector: usize, handler: VirtualAddress) -> Self {
        let attr = if vector == SYSCALL_VECTOR {
            GateAttr::trap_gate(Dpl::Ring3)
        } else {
            GateAttr::interrupt_gate(Dpl::Ring0)
        };
        Self::new(handler, attr)
    }

    #[must_use]
    pub const fn handler(&self) -> VirtualAddress {
        VirtualAddress::new(
            self.offset_lo as u64 | (self.offset_mid as u64) << 16 | (self.offset_hi as u64) << 32,
        )
    }

    #[must_use]
    pub const fn attr(&self) -> GateAttr {
        GateAttr::from_bits(self.attr)
    }

    #[must_use]
    pub const fn selector(&self) -> u16 {
        self.selector
    }
}

const _: () = assert!(size_of::<Gate>() == 16);
const _: () = assert!(size_of::<Gate>() * GATE_COUNT == 4096);
