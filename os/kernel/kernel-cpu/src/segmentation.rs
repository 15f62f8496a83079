mod long;
mod short;

pub use long::LongSegmentation;
pub use short::ShortSegmentation;

use crate::idt::GATE_COUNT;
use crate::per_cpu::PerCpu;
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::Processor;

/// What a CPU needs to know about itself to build its descriptor set.
#[derive(Debug, Copy, Clone)]
pub struct CpuSetup<'a> {
    pub cpu_id: u32,
    /// Entry stub of every vector, installed into the long-mode gate table.
    /// Short mode registers its gates elsewhere and ignores this.
    pub vectors: &'a [VirtualAddress; GATE_COUNT],
}

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum CpuInitError {
    #[error("no frame left for the per-CPU descriptor pages")]
    OutOfMemory,
}

/// Builds and maintains the per-CPU segmentation and privilege state of one
/// hardware mode.
pub trait Segmentation {
    /// Descriptor-table slots loaded with `lgdt`.
    const GDT_ENTRIES: usize;

    /// Build this CPU's descriptor tables and load them. Runs once per CPU,
    /// before any process runs on it.
    ///
    /// # Errors
    /// [`CpuInitError::OutOfMemory`] if a descriptor page cannot be allocated;
    /// nothing has been loaded in that case.
    fn init_cpu<M: PhysMapper, A: FrameAlloc, P: Processor>(
        setup: &CpuSetup<'_>,
        mapper: &M,
        alloc: &mut A,
        cpu: &mut P,
    ) -> Result<PerCpu, CpuInitError>;

    /// Make `kstack_top` the stack a user→kernel transition lands on.
    fn install_kernel_stack<P: Processor>(percpu: &PerCpu, cpu: &mut P, kstack_top: VirtualAddress);

    /// The kernel stack currently installed in the task-state record.
    fn kernel_stack(percpu: &PerCpu) -> VirtualAddress;
}
