use core::ops::{Deref, DerefMut};
use kernel_registers::Processor;

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// The guard borrows the CPU handle and derefs to it, so code inside the
/// critical section keeps programming the same CPU through the guard.
/// Interrupts are re-enabled on drop **only** if they were enabled when the
/// guard was created; nested guards therefore behave like a
/// push/pop pair.
///
/// ```
/// # use kernel_registers::{Cr3, DescriptorTablePointer, Msr, Processor, Rflags};
/// # struct Cpu(bool);
/// # impl Processor for Cpu {
/// #     fn load_translation_root(&mut self, _: Cr3) {}
/// #     fn load_gdt(&mut self, _: DescriptorTablePointer) {}
/// #     fn load_idt(&mut self, _: DescriptorTablePointer) {}
/// #     fn load_task_register(&mut self, _: u16) {}
/// #     fn load_gs(&mut self, _: u16) {}
/// #     fn write_msr(&mut self, _: Msr, _: u64) {}
/// #     fn rflags(&self) -> Rflags { Rflags::new().with_interrupt_enable(self.0) }
/// #     fn disable_interrupts(&mut self) { self.0 = false; }
/// #     fn enable_interrupts(&mut self) { self.0 = true; }
/// # }
/// use kernel_sync::IrqGuard;
///
/// let mut cpu = Cpu(true);
/// {
///     let guard = IrqGuard::new(&mut cpu);
///     assert!(!guard.interrupts_enabled());
/// }
/// assert!(cpu.interrupts_enabled());
/// ```
pub struct IrqGuard<'a, P: Processor> {
    cpu: &'a mut P,
    /// Whether interrupts were enabled (IF=1) when the guard was created.
    were_enabled: bool,
}

impl<'a, P: Processor> IrqGuard<'a, P> {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    #[must_use]
    pub fn new(cpu: &'a mut P) -> Self {
        let were_enabled = cpu.interrupts_enabled();
        if were_enabled {
            cpu.disable_interrupts();
        }
        Self { cpu, were_enabled }
    }
}

impl<P: Processor> Deref for IrqGuard<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.cpu
    }
}

impl<P: Processor> DerefMut for IrqGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        self.cpu
    }
}

impl<P: Processor> Drop for IrqGuard<'_, P> {
    fn drop(&mut self) {
        if self.were_enabled {
            self.cpu.enable_interrupts();
        }
    }
}

/// Runs `f` on `cpu` with interrupt delivery suppressed.
#[inline]
pub fn without_interrupts<P: Processor, R>(cpu: &mut P, f: impl FnOnce(&mut P) -> R) -> R {
    let mut guard = IrqGuard::new(cpu);
    f(&mut guard)
}
