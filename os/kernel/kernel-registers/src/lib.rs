//! # Typed x86 Registers
//!
//! Bitfield models of the control registers the paging and segmentation code
//! programs, and the [`Processor`] seam through which that code reaches the
//! hardware. The kernel uses [`X86Processor`]; tests substitute a recorder.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod cr3;
mod descriptor_table;
mod msr;
mod processor;
mod rflags;

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
mod x86;

pub use cr3::Cr3;
pub use descriptor_table::DescriptorTablePointer;
pub use msr::Msr;
pub use processor::Processor;
pub use rflags::Rflags;

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
pub use x86::X86Processor;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}

pub trait LoadRegister {
    /// Reading this register is allowed at any privilege level.
    fn load() -> Self;
}
