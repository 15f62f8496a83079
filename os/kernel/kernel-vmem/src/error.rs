use kernel_memory_addresses::VirtualAddress;

/// Recoverable failures of address-space operations.
///
/// Violated invariants (double mapping, a missing entry that must exist, an
/// address space without a root) are not errors: they panic.
#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("out of physical frames")]
    OutOfMemory,
    #[error("size {requested:#x} reaches the user limit {limit:#x}")]
    BeyondUserLimit { requested: u64, limit: u64 },
    #[error("short read at file offset {offset:#x}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        offset: u64,
        wanted: usize,
        got: usize,
    },
    #[error("user address {0} is not mapped for user access")]
    BadUserAddress(VirtualAddress),
    #[error("no free slot to register another translation root")]
    RootTableFull,
}
