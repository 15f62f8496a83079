//! # Kernel synchronization primitives
//!
//! - [`IrqGuard`] / [`without_interrupts`]: per-CPU critical sections with
//!   interrupt delivery suppressed, nesting-safe.
//! - [`SpinLock`]: cross-CPU mutual exclusion for small shared tables.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod irq;
mod spin_lock;

pub use irq::{IrqGuard, without_interrupts};
pub use spin_lock::{SpinLock, SpinLockGuard};
