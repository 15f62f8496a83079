//! # Per-CPU Segmentation and Privilege State
//!
//! Paging does the memory protection, but the CPU still needs segment
//! descriptors to know which code runs at which privilege level, a task-state
//! record to find the kernel stack on a user→kernel transition, and (in long
//! mode) a gate table to find the entry vectors.
//!
//! Every CPU gets one page holding its descriptor table, its task-state record
//! and a small CPU-local storage area:
//!
//! ```text
//! per-CPU page
//! +0x000 ┌──────────────────────────────┐
//!        │ GDT: null, kcode, kdata,     │
//!        │      kcpu, ucode, udata, tss │
//! +0x400 ├──────────────────────────────┤
//!        │ TSS (32- or 64-bit layout)   │
//! +0x800 ├──────────────────────────────┤
//!        │ CpuLocal { cpu_id, current } │
//!        └──────────────────────────────┘
//! ```
//!
//! The two hardware modes fill this page differently; see
//! [`ShortSegmentation`] and [`LongSegmentation`]. Both return a [`PerCpu`],
//! the explicit per-CPU context the address-space switcher is handed on every
//! context switch.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod descriptors;
mod idt;
mod per_cpu;
mod privilege;
mod segmentation;
mod selectors;
mod tss;

pub use descriptors::{SegmentDescriptor, TssDescriptor64, segment_type};
pub use idt::{GATE_COUNT, Gate, GateAttr, SYSCALL_VECTOR};
pub use per_cpu::{CpuLocal, PerCpu};
pub use privilege::Dpl;
pub use segmentation::{
    CpuInitError, CpuSetup, LongSegmentation, Segmentation, ShortSegmentation,
};
pub use selectors::{SegmentIndex, Selector};
pub use tss::{Tss32, Tss64};
