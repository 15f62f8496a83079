#![allow(dead_code)]

use kernel_alloc::{BitmapFrameAlloc, HostMemory};
use kernel_info::memory::short;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_registers::{Cr3, DescriptorTablePointer, Msr, Processor, Rflags};
use kernel_vmem::{FileRead, LongLayout, LongMode, PagingMode, ShortLayout, ShortMode, Vm};

pub const PAGE: u64 = 4096;

/// Frames of fake physical memory per test. Short mode spends 65 frames on
/// every root, so this leaves room for a kernel, a few processes and a
/// table's worth of user pages.
pub const FRAMES: usize = 2048;

pub type Frames = BitmapFrameAlloc<{ FRAMES / 64 }>;

pub fn memory() -> HostMemory {
    HostMemory::new(PhysicalPage::containing(PhysicalAddress::new(0x0010_0000)), FRAMES)
}

/// A mode plus the layout tests boot it with.
pub trait TestMode: PagingMode {
    fn layout() -> Self::Layout;
}

impl TestMode for ShortMode {
    fn layout() -> ShortLayout {
        ShortLayout::new(VirtualAddress::new(short::KERNEL_LINK + 0x2_0000))
    }
}

impl TestMode for LongMode {
    fn layout() -> LongLayout {
        LongLayout::new()
    }
}

pub fn boot<'m, S: TestMode>(ram: &'m HostMemory, frames: &mut Frames) -> Vm<'m, S, HostMemory> {
    Vm::boot(S::layout(), ram, frames).unwrap()
}

/// Run the generic test function `name::<S>` once per paging mode.
macro_rules! in_both_modes {
    ($($name:ident),* $(,)?) => {
        $(
            mod $name {
                #[test]
                fn short_mode() {
                    super::$name::<kernel_vmem::ShortMode>();
                }

                #[test]
                fn long_mode() {
                    super::$name::<kernel_vmem::LongMode>();
                }
            }
        )*
    };
}

/// Like `in_both_modes!`, for generic functions expected to panic.
macro_rules! panics_in_both_modes {
    ($($name:ident => $message:literal),* $(,)?) => {
        $(
            mod $name {
                #[test]
                #[should_panic(expected = $message)]
                fn short_mode() {
                    super::$name::<kernel_vmem::ShortMode>();
                }

                #[test]
                #[should_panic(expected = $message)]
                fn long_mode() {
                    super::$name::<kernel_vmem::LongMode>();
                }
            }
        )*
    };
}

/// Deterministic test bytes.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// An in-memory file that counts its reads.
pub struct MemFile {
    pub data: Vec<u8>,
    pub reads: usize,
}

impl MemFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, reads: 0 }
    }
}

impl FileRead for MemFile {
    fn read_at(&mut self, dst: &mut [u8], offset: u64) -> usize {
        self.reads += 1;
        let mut bytes = self.data.as_slice();
        bytes.read_at(dst, offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Cli,
    Sti,
    Cr3(Cr3),
    Gdt(DescriptorTablePointer),
    Idt(DescriptorTablePointer),
    Ltr(u16),
    Gs(u16),
    Msr(Msr, u64),
}

/// A processor that records every privileged operation in order.
#[derive(Default)]
pub struct RecordingCpu {
    pub interrupts: bool,
    pub ops: Vec<Op>,
}

impl RecordingCpu {
    pub fn with_interrupts() -> Self {
        Self {
            interrupts: true,
            ops: Vec::new(),
        }
    }
}

impl Processor for RecordingCpu {
    fn load_translation_root(&mut self, cr3: Cr3) {
        self.ops.push(Op::Cr3(cr3));
    }
    fn load_gdt(&mut self, gdt: DescriptorTablePointer) {
        self.ops.push(Op::Gdt(gdt));
    }
    fn load_idt(&mut self, idt: DescriptorTablePointer) {
        self.ops.push(Op::Idt(idt));
    }
    fn load_task_register(&mut self, selector: u16) {
        self.ops.push(Op::Ltr(selector));
    }
    fn load_gs(&mut self, selector: u16) {
        self.ops.push(Op::Gs(selector));
    }
    fn write_msr(&mut self, msr: Msr, value: u64) {
        self.ops.push(Op::Msr(msr, value));
    }

    fn rflags(&self) -> Rflags {
        Rflags::new().with_interrupt_enable(self.interrupts)
    }

    fn disable_interrupts(&mut self) {
        self.interrupts = false;
        self.ops.push(Op::Cli);
    }

    fn enable_interrupts(&mut self) {
        self.interrupts = true;
        self.ops.push(Op::Sti);
    }
}
