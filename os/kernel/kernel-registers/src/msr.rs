//! Model-specific register identifiers used by the per-CPU setup.

/// A model-specific register, by architectural index.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Msr(pub u32);

impl Msr {
    /// Base of the FS segment in 64-bit mode; points at the CPU-local storage.
    pub const FS_BASE: Self = Self(0xC000_0100);

    /// Base of the GS segment in 64-bit mode.
    pub const GS_BASE: Self = Self(0xC000_0101);

    /// Value exchanged with [`Self::GS_BASE`] by `swapgs`.
    pub const KERNEL_GS_BASE: Self = Self(0xC000_0102);

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}
