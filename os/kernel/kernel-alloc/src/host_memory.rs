//! Heap-backed stand-in for physical RAM.

extern crate alloc;

use crate::{BitmapFrameAlloc, FRAME_SIZE, PhysMapper};
use alloc::boxed::Box;
use alloc::vec;
use core::ptr::NonNull;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

#[repr(C, align(4096))]
#[derive(Clone)]
struct Frame([u8; FRAME_SIZE]);

/// A window of zero-initialized, page-aligned host memory posing as the
/// physical range `[base, base + frames * 4096)`.
///
/// Lets the paging code run unmodified in hosted tests: page tables built
/// here carry the fake physical addresses, and the mapper resolves them to
/// the heap.
pub struct HostMemory {
    base: PhysicalPage<Size4K>,
    frames: usize,
    ram: NonNull<Frame>,
}

impl HostMemory {
    #[must_use]
    pub fn new(base: PhysicalPage<Size4K>, frames: usize) -> Self {
        let ram = Box::into_raw(vec![Frame([0; FRAME_SIZE]); frames].into_boxed_slice());
        Self {
            base,
            frames,
            ram: NonNull::new(ram.cast::<Frame>()).unwrap_or(NonNull::dangling()),
        }
    }

    #[must_use]
    pub const fn first_frame(&self) -> PhysicalPage<Size4K> {
        self.base
    }

    #[must_use]
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// An allocator owning every frame of this memory.
    #[must_use]
    pub fn allocator<const WORDS: usize>(&self) -> BitmapFrameAlloc<WORDS> {
        BitmapFrameAlloc::new(self.base, self.frames)
    }

    /// Reverse lookup for a host pointer into this memory.
    #[must_use]
    pub fn virt_to_phys(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let start = VirtualAddress::from_ptr(self.ram.as_ptr());
        let offset = va.as_u64().checked_sub(start.as_u64())?;
        (offset < (self.frames * FRAME_SIZE) as u64).then(|| self.base.base() + offset)
    }
}

unsafe impl PhysMapper for HostMemory {
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        let offset = pa.as_u64().wrapping_sub(self.base.base().as_u64());
        assert!(
            offset < (self.frames * FRAME_SIZE) as u64,
            "physical address {pa} is outside host memory"
        );
        VirtualAddress::from_ptr(self.ram.as_ptr()) + offset
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        let slice = core::ptr::slice_from_raw_parts_mut(self.ram.as_ptr(), self.frames);
        // SAFETY: `ram` came from `Box::into_raw` on a slice of `frames` frames.
        drop(unsafe { Box::from_raw(slice) });
    }
}
