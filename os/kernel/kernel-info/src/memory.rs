//! # Memory Layout Constants

/// Frame and base page size of both paging modes.
pub const PAGE_SIZE: u64 = 4096;

/// Start of extended memory; the kernel image is loaded here.
pub const EXTENDED_MEMORY: u64 = 0x0010_0000;

/// Top of usable physical memory.
pub const PHYS_TOP: u64 = 0x0E00_0000;

/// Physical start of the memory-mapped device region.
pub const DEVICE_SPACE: u64 = 0xFE00_0000;

/// Size of one per-process kernel stack.
pub const KERNEL_STACK_SIZE: u64 = 4096;

/// Layout of the 32-bit paged mode.
pub mod short {
    use super::{DEVICE_SPACE, EXTENDED_MEMORY, PHYS_TOP};

    /// First kernel virtual address; physical memory is mapped here 1:1.
    pub const KERNEL_BASE: u64 = 0x8000_0000;

    /// Virtual address the kernel image is linked at.
    pub const KERNEL_LINK: u64 = KERNEL_BASE + EXTENDED_MEMORY;

    /// Devices are mapped at their physical addresses.
    pub const DEVICE_BASE: u64 = DEVICE_SPACE;

    /// End of the 32-bit address space, as a 64-bit value.
    pub const ADDRESS_SPACE_END: u64 = 1 << 32;

    /// User space ends where the kernel begins.
    pub const USER_LIMIT: u64 = KERNEL_BASE;

    const _: () = {
        assert!(KERNEL_BASE + PHYS_TOP <= DEVICE_BASE);
        assert!(KERNEL_LINK.is_multiple_of(super::PAGE_SIZE));
        assert!(DEVICE_BASE < ADDRESS_SPACE_END);
    };
}

/// Layout of the 64-bit long mode.
pub mod long {
    /// Physical memory is linearly mapped starting here.
    pub const KERNEL_BASE: u64 = 0xFFFF_FFFF_8000_0000;

    /// The device window starts here.
    pub const DEVICE_BASE: u64 = 0xFFFF_FFFF_4000_0000;

    /// Bytes of physical memory covered by the kernel linear map.
    pub const LINEAR_MAP_SIZE: u64 = 2 * 1024 * 1024 * 1024;

    /// Bytes of device space mapped at [`DEVICE_BASE`].
    pub const DEVICE_WINDOW_SIZE: u64 = 32 * 1024 * 1024;

    /// Bytes covered by one huge page.
    pub const HUGE_PAGE_SIZE: u64 = 2 * 1024 * 1024;

    /// Process page-directory slots available to user space; the top two stay reserved.
    pub const USER_DIRECTORY_SLOTS: u64 = 510;

    /// First address above user space.
    pub const USER_LIMIT: u64 = USER_DIRECTORY_SLOTS * HUGE_PAGE_SIZE;

    const _: () = {
        assert!(DEVICE_BASE + DEVICE_WINDOW_SIZE <= KERNEL_BASE);
        assert!(KERNEL_BASE.is_multiple_of(1 << 30));
        assert!(DEVICE_BASE.is_multiple_of(1 << 30));
        // The linear map and the device window share one top-level slot.
        assert!(KERNEL_BASE >> 39 == DEVICE_BASE >> 39);
        assert!(LINEAR_MAP_SIZE == 2 * 512 * HUGE_PAGE_SIZE);
    };
}

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(KERNEL_STACK_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_TOP.is_multiple_of(PAGE_SIZE));
    assert!(EXTENDED_MEMORY < PHYS_TOP);
};
