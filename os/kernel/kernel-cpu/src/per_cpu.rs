use crate::descriptors::SegmentDescriptor;
use crate::tss::{Tss32, Tss64};
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};

/// Data reachable through the CPU-local segment base (GS in 32-bit mode,
/// FS in long mode).
#[repr(C)]
#[derive(Debug)]
pub struct CpuLocal {
    pub cpu_id: AtomicU64,
    /// Identity of the process running on this CPU, 0 when none.
    pub current: AtomicU64,
}

/// Per-CPU execution context: where this CPU's descriptor table, task state
/// and local storage live.
///
/// Built once by [`Segmentation::init_cpu`](crate::Segmentation::init_cpu) and
/// never freed. Passed explicitly to everything that needs "this CPU".
#[derive(Debug)]
pub struct PerCpu {
    cpu_id: u32,
    page: PhysicalPage<Size4K>,
    base: VirtualAddress,
    gates: Option<PhysicalPage<Size4K>>,
}

impl PerCpu {
    /// Offset of the descriptor table in the per-CPU page.
    pub const GDT_OFFSET: u64 = 0;
    /// Offset of the task-state record.
    pub const TSS_OFFSET: u64 = 1024;
    /// Offset of [`CpuLocal`].
    pub const LOCAL_OFFSET: u64 = 2048;
    /// Descriptor slots that fit before the task-state record.
    #[allow(clippy::cast_possible_truncation)]
    pub const MAX_DESCRIPTORS: usize = (Self::TSS_OFFSET / 8) as usize;

    /// Allocate and zero the per-CPU page and stamp the CPU id into it.
    pub(crate) fn allocate<M: PhysMapper, A: FrameAlloc>(
        cpu_id: u32,
        mapper: &M,
        alloc: &mut A,
    ) -> Option<Self> {
        let page = alloc.alloc_4k()?;
        // SAFETY: freshly allocated, nothing else refers to it.
        unsafe { mapper.zero_frame(page) };
        let this = Self {
            cpu_id,
            page,
            base: mapper.phys_to_virt(page.base()),
            gates: None,
        };
        this.local().cpu_id.store(u64::from(cpu_id), Ordering::Relaxed);
        Some(this)
    }

    pub(crate) const fn set_gate_table(&mut self, gates: PhysicalPage<Size4K>) {
        self.gates = Some(gates);
    }

    #[must_use]
    pub const fn cpu_id(&self) -> u32 {
        self.cpu_id
    }

    /// The physical page holding descriptor table, task state and local storage.
    #[must_use]
    pub const fn page(&self) -> PhysicalPage<Size4K> {
        self.page
    }

    /// The gate-table page (long mode only).
    #[must_use]
    pub const fn gate_table(&self) -> Option<PhysicalPage<Size4K>> {
        self.gates
    }

    #[must_use]
    pub fn gdt_base(&self) -> VirtualAddress {
        self.base + Self::GDT_OFFSET
    }

    #[must_use]
    pub fn tss_base(&self) -> VirtualAddress {
        self.base + Self::TSS_OFFSET
    }

    #[must_use]
    pub fn local_base(&self) -> VirtualAddress {
        self.base + Self::LOCAL_OFFSET
    }

    #[must_use]
    pub fn local(&self) -> &CpuLocal {
        // SAFETY: the per-CPU page lives forever and `CpuLocal` fits at its
        // offset; all fields are atomics, so shared access is sound.
        unsafe { &*self.local_base().as_mut_ptr::<CpuLocal>() }
    }

    pub fn set_current_process(&self, id: u64) {
        self.local().current.store(id, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current_process(&self) -> u64 {
        self.local().current.load(Ordering::Relaxed)
    }

    /// Descriptor in `slot`.
    ///
    /// # Panics
    /// If `slot` is outside the descriptor area.
    #[must_use]
    pub fn descriptor(&self, slot: usize) -> SegmentDescriptor {
        // SAFETY: `descriptor_ptr` bounds the slot to the descriptor area.
        SegmentDescriptor::from_bits(unsafe { self.descriptor_ptr(slot).read() })
    }

    pub(crate) fn set_descriptor(&self, slot: usize, descriptor: SegmentDescriptor) {
        self.set_raw_descriptor(slot, descriptor.into_bits());
    }

    pub(crate) fn set_raw_descriptor(&self, slot: usize, raw: u64) {
        // SAFETY: `descriptor_ptr` bounds the slot to the descriptor area.
        unsafe { self.descriptor_ptr(slot).write(raw) }
    }

    fn descriptor_ptr(&self, slot: usize) -> *mut u64 {
        assert!(slot < Self::MAX_DESCRIPTORS, "descriptor slot {slot}");
        (self.gdt_base() + slot as u64 * 8).as_mut_ptr()
    }

    #[must_use]
    pub fn tss32(&self) -> Tss32 {
        // SAFETY: the task-state area is 8-aligned and large enough for a `Tss32`.
        unsafe { self.tss_base().as_mut_ptr::<Tss32>().read() }
    }

    pub(crate) fn update_tss32(&self, f: impl FnOnce(&mut Tss32)) {
        // SAFETY: as in `tss32`; the borrow ends before this call returns.
        let tss = unsafe { &mut *self.tss_base().as_mut_ptr::<Tss32>() };
        f(tss);
    }

    #[must_use]
    pub fn tss64(&self) -> Tss64 {
        // SAFETY: the task-state area is large enough for a `Tss64`; it is
        // packed, hence the unaligned read.
        unsafe { self.tss_base().as_mut_ptr::<Tss64>().read_unaligned() }
    }

    pub(crate) fn update_tss64(&self, f: impl FnOnce(&mut Tss64)) {
        let ptr = self.tss_base().as_mut_ptr::<Tss64>();
        // SAFETY: as in `tss64`.
        let mut tss = unsafe { ptr.read_unaligned() };
        f(&mut tss);
        // SAFETY: as in `tss64`.
        unsafe { ptr.write_unaligned(tss) };
    }
}

const _: () = {
    assert!(PerCpu::LOCAL_OFFSET + size_of::<CpuLocal>() as u64 <= 4096);
    assert!(size_of::<Tss64>() as u64 <= PerCpu::LOCAL_OFFSET - PerCpu::TSS_OFFSET);
};
