//! # Kernel Memory Layout
//!
//! Single source of truth for the fixed addresses the paging code is built
//! around. The kernel runs in one of two hardware modes, chosen per build, and
//! each mode has its own split between user and kernel space.
//!
//! ## Short (32-bit) mode
//!
//! ```text
//! 0x0000_0000 ┌──────────────────────────────┐
//!             │ User space (grows upward)    │
//! KERNEL_BASE ├──────────────────────────────┤ 0x8000_0000
//!             │ Low 1 MiB (I/O space)        │
//! KERNEL_LINK ├──────────────────────────────┤ 0x8010_0000
//!             │ Kernel text + rodata (RO)    │
//!             │ Kernel data + free memory    │
//!  + PHYS_TOP ├──────────────────────────────┤ 0x8E00_0000
//!             │ (unmapped)                   │
//! DEVICE_BASE ├──────────────────────────────┤ 0xFE00_0000
//!             │ Memory-mapped devices        │
//! 0xFFFF_FFFF └──────────────────────────────┘
//! ```
//!
//! ## Long (64-bit) mode
//!
//! ```text
//! 0x0000_0000_0000_0000 ┌──────────────────────────────┐
//!                       │ User space, 510 × 2 MiB       │
//!            USER_LIMIT ├──────────────────────────────┤ 0x3FC0_0000
//!                       │ (unmapped)                   │
//! DEVICE_BASE           ├──────────────────────────────┤ 0xFFFF_FFFF_4000_0000
//!                       │ Device window, 16 × 2 MiB    │
//! KERNEL_BASE           ├──────────────────────────────┤ 0xFFFF_FFFF_8000_0000
//!                       │ Physical 0..2 GiB, 2 MiB pages│
//! 0xFFFF_FFFF_FFFF_FFFF └──────────────────────────────┘
//! ```
//!
//! All values are compile-time constants and checked by `const` assertions.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
