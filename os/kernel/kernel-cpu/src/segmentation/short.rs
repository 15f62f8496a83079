use super::{CpuInitError, CpuSetup, Segmentation};
use crate::descriptors::{SegmentDescriptor, segment_type};
use crate::per_cpu::{CpuLocal, PerCpu};
use crate::privilege::Dpl;
use crate::selectors::{SegmentIndex, Selector};
use crate::tss::Tss32;
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::{DescriptorTablePointer, Processor};

/// Segmentation of the 32-bit paged mode.
///
/// Four flat segments that differ only in privilege, a data segment over the
/// CPU-local storage loaded into GS, and a task-state descriptor that the
/// switcher rebuilds on every process switch.
pub struct ShortSegmentation;

/// Truncate a kernel address to the 32 bits a short-mode descriptor holds.
#[allow(clippy::cast_possible_truncation)]
const fn low32(va: VirtualAddress) -> u32 {
    va.as_u64() as u32
}

impl Segmentation for ShortSegmentation {
    const GDT_ENTRIES: usize = 7;

    #[allow(clippy::cast_possible_truncation)]
    fn init_cpu<M: PhysMapper, A: FrameAlloc, P: Processor>(
        setup: &CpuSetup<'_>,
        mapper: &M,
        alloc: &mut A,
        cpu: &mut P,
    ) -> Result<PerCpu, CpuInitError> {
        use segment_type::{EXECUTE, READABLE, WRITABLE};

        let percpu =
            PerCpu::allocate(setup.cpu_id, mapper, alloc).ok_or(CpuInitError::OutOfMemory)?;

        let code = EXECUTE | READABLE;
        percpu.set_descriptor(SegmentIndex::KernelCode.slot(), SegmentDescriptor::flat(code, Dpl::Ring0));
        percpu.set_descriptor(SegmentIndex::KernelData.slot(), SegmentDescriptor::flat(WRITABLE, Dpl::Ring0));
        percpu.set_descriptor(SegmentIndex::UserCode.slot(), SegmentDescriptor::flat(code, Dpl::Ring3));
        percpu.set_descriptor(SegmentIndex::UserData.slot(), SegmentDescriptor::flat(WRITABLE, Dpl::Ring3));
        percpu.set_descriptor(
            SegmentIndex::CpuLocal.slot(),
            SegmentDescriptor::segment(
                WRITABLE,
                low32(percpu.local_base()),
                size_of::<CpuLocal>() as u32,
                Dpl::Ring0,
            ),
        );

        cpu.load_gdt(DescriptorTablePointer::new(
            percpu.gdt_base(),
            Self::GDT_ENTRIES * size_of::<SegmentDescriptor>(),
        ));
        cpu.load_gs(Selector::gdt(SegmentIndex::CpuLocal, Dpl::Ring0).into_bits());

        log::info!("cpu {}: descriptor tables loaded (32-bit)", setup.cpu_id);
        Ok(percpu)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn install_kernel_stack<P: Processor>(percpu: &PerCpu, cpu: &mut P, kstack_top: VirtualAddress) {
        // Rebuilt each time: `ltr` marks the descriptor busy.
        let tss = SegmentDescriptor::segment16(
            segment_type::TSS_AVAILABLE,
            low32(percpu.tss_base()),
            size_of::<Tss32>() as u32 - 1,
            Dpl::Ring0,
        )
        .with_s(false);
        percpu.set_descriptor(SegmentIndex::TaskState.slot(), tss);
        percpu.update_tss32(|tss| {
            tss.ss0 = Selector::gdt(SegmentIndex::KernelData, Dpl::Ring0).into_bits();
            tss.esp0 = low32(kstack_top);
        });
        cpu.load_task_register(Selector::gdt(SegmentIndex::TaskState, Dpl::Ring0).into_bits());
    }

    fn kernel_stack(percpu: &PerCpu) -> VirtualAddress {
        VirtualAddress::new(u64::from(percpu.tss32().esp0))
    }
}
