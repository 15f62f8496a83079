use super::{CpuInitError, CpuSetup, Segmentation};
use crate::descriptors::{SegmentDescriptor, TssDescriptor64};
use crate::idt::{GATE_COUNT, Gate};
use crate::per_cpu::PerCpu;
use crate::privilege::Dpl;
use crate::selectors::{SegmentIndex, Selector};
use crate::tss::Tss64;
use kernel_alloc::{FRAME_SIZE, FrameAlloc, PhysMapper};
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::{DescriptorTablePointer, Msr, Processor};

/// Segmentation of the 64-bit long mode.
///
/// A page of 256 gates, flat code/data descriptors, a 16-byte TSS descriptor
/// loaded once with `ltr`, and FS based at the CPU-local storage.
pub struct LongSegmentation;

impl Segmentation for LongSegmentation {
    const GDT_ENTRIES: usize = 8;

    fn init_cpu<M: PhysMapper, A: FrameAlloc, P: Processor>(
        setup: &CpuSetup<'_>,
        mapper: &M,
        alloc: &mut A,
        cpu: &mut P,
    ) -> Result<PerCpu, CpuInitError> {
        let gates = alloc.alloc_4k().ok_or(CpuInitError::OutOfMemory)?;
        let Some(mut percpu) = PerCpu::allocate(setup.cpu_id, mapper, alloc) else {
            alloc.free_4k(gates);
            return Err(CpuInitError::OutOfMemory);
        };
        percpu.set_gate_table(gates);

        // SAFETY: the gate page was just allocated and is owned by `percpu`.
        let table = unsafe { mapper.phys_to_mut::<[Gate; GATE_COUNT]>(gates.base()) };
        for (vector, (gate, &handler)) in table.iter_mut().zip(setup.vectors).enumerate() {
            *gate = Gate::for_vector(vector, handler);
        }
        cpu.load_idt(DescriptorTablePointer::new(
            mapper.phys_to_virt(gates.base()),
            FRAME_SIZE,
        ));

        percpu.update_tss64(|tss| *tss = Tss64::new());

        percpu.set_descriptor(SegmentIndex::KernelCode.slot(), SegmentDescriptor::long_code(Dpl::Ring0));
        percpu.set_descriptor(SegmentIndex::KernelData.slot(), SegmentDescriptor::long_data(Dpl::Ring0));
        percpu.set_descriptor(SegmentIndex::CpuLocal.slot(), SegmentDescriptor::NULL);
        percpu.set_descriptor(SegmentIndex::UserCode.slot(), SegmentDescriptor::long_code(Dpl::Ring3));
        percpu.set_descriptor(SegmentIndex::UserData.slot(), SegmentDescriptor::long_data(Dpl::Ring3));
        #[allow(clippy::cast_possible_truncation)]
        let tss = TssDescriptor64::new(percpu.tss_base(), size_of::<Tss64>() as u16 - 1);
        percpu.set_descriptor(SegmentIndex::TaskState.slot(), tss.low);
        percpu.set_raw_descriptor(SegmentIndex::TaskState.slot() + 1, tss.high);

        cpu.load_gdt(DescriptorTablePointer::new(
            percpu.gdt_base(),
            Self::GDT_ENTRIES * size_of::<SegmentDescriptor>(),
        ));
        cpu.load_task_register(Selector::gdt(SegmentIndex::TaskState, Dpl::Ring0).into_bits());
        cpu.write_msr(Msr::FS_BASE, percpu.local_base().as_u64());

        log::info!("cpu {}: descriptor tables loaded (64-bit)", setup.cpu_id);
        Ok(percpu)
    }

    fn install_kernel_stack<P: Processor>(percpu: &PerCpu, _cpu: &mut P, kstack_top: VirtualAddress) {
        percpu.update_tss64(|tss| tss.rsp0 = kstack_top.as_u64());
    }

    fn kernel_stack(percpu: &PerCpu) -> VirtualAddress {
        VirtualAddress::new(percpu.tss64().rsp0)
    }
}
