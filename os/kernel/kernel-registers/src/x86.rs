use crate::{
    Cr3, DescriptorTablePointer, LoadRegister, LoadRegisterUnsafe, Msr, Processor, Rflags,
    StoreRegisterUnsafe,
};
use core::arch::asm;

/// The CPU the code is executing on, driven with inline assembly.
pub struct X86Processor {
    _private: (),
}

impl X86Processor {
    /// # Safety
    /// Must only be used at CPL 0, and only by the CPU it was created on.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "x86_64")]
#[repr(C, packed)]
struct RawTablePointer {
    limit: u16,
    base: u64,
}

#[cfg(target_arch = "x86")]
#[repr(C, packed)]
struct RawTablePointer {
    limit: u16,
    base: u32,
}

impl From<DescriptorTablePointer> for RawTablePointer {
    #[allow(clippy::cast_possible_truncation)]
    fn from(value: DescriptorTablePointer) -> Self {
        Self {
            limit: value.limit,
            base: value.base.as_u64() as _,
        }
    }
}

impl LoadRegisterUnsafe for Cr3 {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn load_unsafe() -> Self {
        let cr3: usize;
        // SAFETY: reading CR3 has no side effects.
        unsafe {
            asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3 as u64)
    }
}

impl StoreRegisterUnsafe for Cr3 {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits() as usize;
        // SAFETY: the caller guarantees the root maps the running code.
        unsafe {
            asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

impl LoadRegister for Rflags {
    fn load() -> Self {
        let flags: usize;
        // SAFETY: push then pop leaves the stack balanced.
        #[cfg(target_arch = "x86_64")]
        unsafe {
            asm!("pushfq", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        // SAFETY: push then pop leaves the stack balanced.
        #[cfg(target_arch = "x86")]
        unsafe {
            asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        Self::from_bits(flags as u64)
    }
}

impl Processor for X86Processor {
    fn load_translation_root(&mut self, cr3: Cr3) {
        // SAFETY: roots handed to the processor always carry the kernel mappings.
        unsafe { cr3.store_unsafe() }
    }

    fn load_gdt(&mut self, gdt: DescriptorTablePointer) {
        let raw = RawTablePointer::from(gdt);
        // SAFETY: the table lives in a per-CPU page that is never freed.
        unsafe {
            asm!("lgdt [{}]", in(reg) &raw, options(readonly, nostack, preserves_flags));
        }
    }

    fn load_idt(&mut self, idt: DescriptorTablePointer) {
        let raw = RawTablePointer::from(idt);
        // SAFETY: the gate table lives in a page that is never freed.
        unsafe {
            asm!("lidt [{}]", in(reg) &raw, options(readonly, nostack, preserves_flags));
        }
    }

    fn load_task_register(&mut self, selector: u16) {
        // SAFETY: the selector names the task-state descriptor just installed.
        unsafe {
            asm!("ltr {0:x}", in(reg) selector, options(nostack, preserves_flags));
        }
    }

    fn load_gs(&mut self, selector: u16) {
        // SAFETY: the selector names the CPU-local data descriptor.
        unsafe {
            asm!("mov gs, {0:x}", in(reg) selector, options(nostack, preserves_flags));
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_msr(&mut self, msr: Msr, value: u64) {
        let lo = value as u32;
        let hi = (value >> 32) as u32;
        // SAFETY: `Msr` only names registers this CPU implements.
        unsafe {
            asm!(
                "wrmsr",
                in("ecx") msr.raw(),
                in("eax") lo,
                in("edx") hi,
                options(nostack, preserves_flags)
            );
        }
    }

    fn rflags(&self) -> Rflags {
        Rflags::load()
    }

    fn disable_interrupts(&mut self) {
        // SAFETY: masking interrupts cannot break memory safety.
        unsafe { asm!("cli", options(nomem, nostack)) }
    }

    fn enable_interrupts(&mut self) {
        // SAFETY: callers only unmask once the gate table is loaded.
        unsafe { asm!("sti", options(nomem, nostack)) }
    }
}
