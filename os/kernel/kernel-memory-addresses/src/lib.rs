//! # Physical and Virtual Addresses
//!
//! Zero-cost typed wrappers that keep physical and virtual addresses apart at
//! compile time, plus page-size markers and page-aligned page handles.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address in physical memory (RAM or MMIO). |
//! | [`VirtualAddress`] | A byte address as seen through the page tables. |
//! | [`PhysicalPage<S>`] | The aligned base of a physical frame of size `S`. |
//! | [`VirtualPage<S>`] | The aligned base of a virtual page of size `S`. |
//!
//! Addresses are always carried as `u64`, also for the 32-bit paging mode;
//! code that programs 32-bit hardware structures truncates explicitly.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x1234);
//! assert_eq!(va.page::<Size4K>().base().as_u64(), 0x1000);
//! assert_eq!(va.offset_in::<Size4K>(), 0x234);
//! assert_eq!(va.align_up::<Size4K>().as_u64(), 0x2000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod address;
mod page;
mod page_size;

pub use address::{PhysicalAddress, VirtualAddress};
pub use page::{PhysicalPage, VirtualPage};
pub use page_size::{PageSize, Size2M, Size4K};
