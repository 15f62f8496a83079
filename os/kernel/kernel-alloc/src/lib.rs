//! # Physical Frames
//!
//! The two contracts every paging structure is built on, and their kernel
//! implementations:
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │ FrameAlloc                   │   │ PhysMapper                   │
//! │  • alloc_4k / free_4k        │   │  • physical → kernel virtual │
//! │  BitmapFrameAlloc            │   │  DirectMapper, HostMemory    │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Frame allocation
//!
//! [`FrameAlloc`] hands out single 4 KiB frames and takes them back. Frames
//! are **not** zeroed on allocation; callers that need zeroed memory clear it
//! through the mapper. [`BitmapFrameAlloc`] is a no-heap, first-fit bitmap
//! over one contiguous physical range.
//!
//! ```rust
//! use kernel_alloc::{BitmapFrameAlloc, FrameAlloc};
//! use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};
//!
//! let first = PhysicalPage::containing(PhysicalAddress::new(0x0010_0000));
//! let mut frames = BitmapFrameAlloc::<2>::new(first, 100);
//! let frame = frames.alloc_4k().unwrap();
//! assert_eq!(frames.free_frames(), 99);
//! frames.free_4k(frame);
//! assert_eq!(frames.free_frames(), 100);
//! ```
//!
//! ## Reaching physical memory
//!
//! Code can only dereference virtual addresses. [`PhysMapper`] says where a
//! physical frame is visible in the current address space: the kernel uses
//! [`DirectMapper`] (physical memory is mapped 1:1 at `KERNEL_BASE`), hosted
//! tests use [`HostMemory`] (frames on the heap).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod frame_alloc;
#[cfg(feature = "host")]
mod host_memory;
mod phys_mapper;

pub use frame_alloc::BitmapFrameAlloc;
#[cfg(feature = "host")]
pub use host_memory::HostMemory;
pub use phys_mapper::DirectMapper;

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// Bytes in one frame.
pub const FRAME_SIZE: usize = 4096;

/// Source of 4 KiB physical frames.
pub trait FrameAlloc {
    /// Allocate one frame, or `None` when memory is exhausted.
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>>;

    /// Return a frame previously obtained from [`alloc_4k`](Self::alloc_4k).
    fn free_4k(&mut self, frame: PhysicalPage<Size4K>);
}

/// Converts physical addresses to usable addresses in the current virtual
/// address space (e.g., via a direct map at a fixed offset).
///
/// # Safety
/// Implementors guarantee that for every frame the paired allocator hands
/// out, and every page-table page in use, [`phys_to_virt`](Self::phys_to_virt)
/// returns an address that is mapped, writable and 4 KiB aligned for the whole
/// frame, and stays so while the mapper is alive.
pub unsafe trait PhysMapper {
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress;

    /// View the memory at `pa` as a `T`.
    ///
    /// # Safety
    /// - The bytes at `pa` must be a valid `T`.
    /// - No other reference to those bytes may be live for `'a`.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        // SAFETY: upheld by the trait contract and the caller.
        unsafe { &mut *self.phys_to_virt(pa).as_mut_ptr::<T>() }
    }

    /// The bytes of `frame`.
    ///
    /// # Safety
    /// No other reference into the frame may be live for `'a`.
    #[inline]
    unsafe fn frame_bytes<'a>(&self, frame: PhysicalPage<Size4K>) -> &'a mut [u8; FRAME_SIZE] {
        // SAFETY: a frame is a valid byte array; exclusivity is the caller's.
        unsafe { self.phys_to_mut(frame.base()) }
    }

    /// Fill `frame` with zeros.
    ///
    /// # Safety
    /// The caller must own `frame`; nothing else may be using it.
    #[inline]
    unsafe fn zero_frame(&self, frame: PhysicalPage<Size4K>) {
        // SAFETY: the caller owns `frame`.
        unsafe { self.frame_bytes(frame).fill(0) }
    }
}
