use kernel_memory_addresses::VirtualAddress;

/// Operand of `lgdt`/`lidt`: linear base and limit (size in bytes minus one).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: VirtualAddress,
}

impl DescriptorTablePointer {
    /// Pointer to a table of `size` bytes at `base`.
    ///
    /// # Panics
    /// If `size` is zero or exceeds 64 KiB.
    #[must_use]
    pub fn new(base: VirtualAddress, size: usize) -> Self {
        let limit = size
            .checked_sub(1)
            .and_then(|l| u16::try_from(l).ok())
            .unwrap_or_else(|| panic!("descriptor table of {size} bytes"));
        Self { limit, base }
    }
}
