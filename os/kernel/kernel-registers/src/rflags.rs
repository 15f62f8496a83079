use bitfield_struct::bitfield;

/// RFLAGS (EFLAGS in 32-bit mode), reduced to the bits the kernel inspects.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Rflags {
    /// Carry Flag
    pub carry: bool, // 0

    /// Always 1.
    #[bits(default = true)]
    _always1: bool, // 1

    #[bits(7)]
    __: u8, // 2–8

    /// Interrupt Enable Flag
    pub interrupt_enable: bool, // 9

    /// Direction Flag
    pub direction: bool, // 10

    #[bits(53)]
    __: u64, // 11–63
}
