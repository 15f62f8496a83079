//! # Virtual Memory
//!
//! Per-process address spaces on top of x86 paging, in either of two
//! hardware modes:
//!
//! | Mode                 | Entry  | Fan-out | Kernel half                            | User limit |
//! |----------------------|--------|---------|----------------------------------------|------------|
//! | [`ShortMode`] 32-bit | `u32`  | 1024    | private copy of the region table       | 2 GiB      |
//! | [`LongMode`] 64-bit  | `u64`  | 512     | one shared pdpt of 2 MiB pages         | 1020 MiB   |
//!
//! The build picks one with the `short-mode` feature ([`SelectedMode`]); both
//! always compile.
//!
//! ## Ownership
//!
//! - The kernel hierarchy is built once by [`Vm::boot`] and never freed.
//! - An [`AddressSpace`] owns its directory, every table linked from its
//!   owned directory slots and every user frame below its size. All of them
//!   go back to the allocator in [`Vm::destroy`].
//! - Frames come from a [`FrameAlloc`](kernel_alloc::FrameAlloc) and are
//!   reached through a [`PhysMapper`](kernel_alloc::PhysMapper).
//!
//! ## Failures
//!
//! Running out of frames, short file reads, oversized growth and bad user
//! pointers are [`VmError`]s and leave the address space as it was.
//! Broken invariants, such as mapping a page twice or destroying a space
//! without a root, panic.
//!
//! ## Example
//!
//! ```ignore
//! let vm = Vm::<SelectedMode, _>::boot(LongLayout::new(), &mapper, &mut frames)?;
//! let mut space = vm.create(&mut frames)?;
//! vm.load_initial_image(&mut space, INIT_CODE, &mut frames)?;
//! vm.grow(&mut space, 3 * 4096, &mut frames)?;
//! vm.activate_process(&percpu, &mut cpu, &space, kernel_stack);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod address_space;
pub mod entry;
mod error;
mod map;
pub mod mode;
mod vm;
mod walk;

pub use address_space::AddressSpace;
pub use entry::{EntryFlags, LongEntry, ShortEntry, TableEntry};
pub use error::VmError;
pub use map::map_pages;
pub use mode::{
    KernelRegion, LongLayout, LongMode, MAX_ROOTS, PagingMode, RootPage, ShortLayout, ShortMode,
};
pub use vm::{FileRead, Vm};
pub use walk::{EntrySlot, walk, walk_or_create};

/// The paging mode this kernel is built for.
#[cfg(not(feature = "short-mode"))]
pub type SelectedMode = LongMode;

/// The paging mode this kernel is built for.
#[cfg(feature = "short-mode")]
pub type SelectedMode = ShortMode;
