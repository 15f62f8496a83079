use crate::{Cr3, DescriptorTablePointer, Msr, Rflags};

/// Privileged CPU state the kernel programs during address-space switches and
/// per-CPU bring-up.
///
/// Each call corresponds to one instruction on real hardware. Implementations
/// are per CPU; a value of this type stands for "the CPU we are running on".
pub trait Processor {
    /// `mov cr3`: switch to the translation root in `cr3`. Flushes non-global TLB entries.
    fn load_translation_root(&mut self, cr3: Cr3);

    /// `lgdt`
    fn load_gdt(&mut self, gdt: DescriptorTablePointer);

    /// `lidt`
    fn load_idt(&mut self, idt: DescriptorTablePointer);

    /// `ltr`: mark the task-state descriptor at `selector` busy and make it current.
    fn load_task_register(&mut self, selector: u16);

    /// `mov gs`
    fn load_gs(&mut self, selector: u16);

    /// `wrmsr`
    fn write_msr(&mut self, msr: Msr, value: u64);

    /// Current flags register.
    fn rflags(&self) -> Rflags;

    /// `cli`
    fn disable_interrupts(&mut self);

    /// `sti`
    fn enable_interrupts(&mut self);

    #[inline]
    fn interrupts_enabled(&self) -> bool {
        self.rflags().interrupt_enable()
    }
}
