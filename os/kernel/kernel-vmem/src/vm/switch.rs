use super::Vm;
use crate::address_space::AddressSpace;
use crate::mode::PagingMode;
use kernel_alloc::PhysMapper;
use kernel_cpu::{PerCpu, Segmentation};
use kernel_info::memory::KERNEL_STACK_SIZE;
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::{Cr3, Processor};
use kernel_sync::without_interrupts;

impl<S: PagingMode, M: PhysMapper> Vm<'_, S, M> {
    /// Run on the kernel-only hierarchy, e.g. while the scheduler idles.
    pub fn activate_kernel<P: Processor>(&self, cpu: &mut P) {
        cpu.load_translation_root(Cr3::from_root(self.mode.kernel_root()));
    }

    /// Switch `cpu` to `space`, with user→kernel transitions landing on the
    /// stack whose lowest address is `kernel_stack`.
    ///
    /// Interrupts are off for the whole switch and the task state is updated
    /// before the root is loaded.
    ///
    /// # Panics
    /// If `space` has no root.
    pub fn activate_process<P: Processor>(
        &self,
        percpu: &PerCpu,
        cpu: &mut P,
        space: &AddressSpace,
        kernel_stack: VirtualAddress,
    ) {
        let root = space.require_root("activate_process");
        let translation_root = self.mode.activation_root(root);
        without_interrupts(cpu, |cpu| {
            <S::Segmentation as Segmentation>::install_kernel_stack(
                percpu,
                cpu,
                kernel_stack + KERNEL_STACK_SIZE,
            );
            cpu.load_translation_root(Cr3::from_root(translation_root));
        });
    }
}
