//! # Task-state records
//!
//! Neither mode uses hardware task switching. The CPU only reads the TSS to
//! find the ring-0 stack when an interrupt or system call arrives from user
//! mode: `ss0:esp0` in 32-bit mode, `rsp0` in long mode. The switcher
//! rewrites that field on every process switch.

/// 32-bit task-state segment.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct Tss32 {
    pub link: u32,
    /// Stack pointer loaded on a transition to ring 0.
    pub esp0: u32,
    /// Stack segment loaded on a transition to ring 0.
    pub ss0: u16,
    _pad0: u16,
    pub esp1: u32,
    pub ss1: u16,
    _pad1: u16,
    pub esp2: u32,
    pub ss2: u16,
    _pad2: u16,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u16,
    _pad3: u16,
    pub cs: u16,
    _pad4: u16,
    pub ss: u16,
    _pad5: u16,
    pub ds: u16,
    _pad6: u16,
    pub fs: u16,
    _pad7: u16,
    pub gs: u16,
    _pad8: u16,
    pub ldt: u16,
    _pad9: u16,
    /// Trap on task switch.
    pub t: u16,
    /// I/O map base.
    pub iomb: u16,
}

/// 64-bit task-state segment.
///
/// `rsp0` is the only field the kernel sets; IST stacks are not used and the
/// I/O map base points past the end of the record, so there is no I/O
/// permission bitmap.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug)]
pub struct Tss64 {
    _reserved0: u32,
    /// Ring-0 stack pointer loaded on a privilege transition.
    pub rsp0: u64,
    pub rsp1: u64,
    pub rsp2: u64,
    _reserved1: u64,
    pub ist: [u64; 7],
    _reserved2: u64,
    _reserved3: u16,
    pub iomb: u16,
}

impl Tss64 {
    /// I/O map base that disables the bitmap.
    #[allow(clippy::cast_possible_truncation)]
    pub const NO_IO_BITMAP: u16 = size_of::<Self>() as u16;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            _reserved0: 0,
            rsp0: 0,
            rsp1: 0,
            rsp2: 0,
            _reserved1: 0,
            ist: [0; 7],
            _reserved2: 0,
            _reserved3: 0,
            iomb: Self::NO_IO_BITMAP,
        }
    }
}

impl Default for Tss64 {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = {
    assert!(size_of::<Tss32>() == 104);
    assert!(size_of::<Tss64>() == 104);
    assert!(Tss64::NO_IO_BITMAP == 0x68);
};
