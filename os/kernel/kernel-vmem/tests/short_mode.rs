mod common;

use common::{Frames, PAGE, TestMode, boot, memory};
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_info::memory::{DEVICE_SPACE, PHYS_TOP, short};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::{EntryFlags, PagingMode, ShortLayout, ShortMode, TableEntry, Vm, VmError, walk};

/// Every root carries the directory plus 64 private kernel tables.
const ROOT_COST: usize = 65;

fn data_start() -> u64 {
    short::KERNEL_LINK + 0x2_0000
}

#[test]
fn each_root_owns_a_private_copy_of_the_kernel_tables() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<ShortMode>(&ram, &mut frames);
    assert_eq!(frames.total_frames() - frames.free_frames(), ROOT_COST);

    let space = vm.create(&mut frames).unwrap();
    assert_eq!(frames.total_frames() - frames.free_frames(), 2 * ROOT_COST);
    vm.destroy(space, &mut frames);
    assert_eq!(frames.total_frames() - frames.free_frames(), ROOT_COST);
}

#[test]
fn kernel_entries_are_identical_in_every_root() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<ShortMode>(&ram, &mut frames);
    let a = vm.create(&mut frames).unwrap();
    let b = vm.create(&mut frames).unwrap();
    let kernel = vm.mode().kernel_root();

    for raw in [
        short::KERNEL_BASE,
        short::KERNEL_BASE + 0xF_F000,
        short::KERNEL_LINK,
        data_start() - PAGE,
        data_start(),
        short::KERNEL_BASE + PHYS_TOP - PAGE,
        DEVICE_SPACE,
        0xFFFF_F000,
    ] {
        let va = VirtualAddress::new(raw);
        let expected = walk::<ShortMode, _>(&ram, kernel, va).unwrap().read(&ram);
        assert!(expected.is_present(), "{va}");
        assert!(!expected.flags().user(), "{va}");
        assert_eq!(vm.entry(&a, va), Some(expected), "{va}");
        assert_eq!(vm.entry(&b, va), Some(expected), "{va}");
    }
}

#[test]
fn kernel_regions_carry_their_permissions() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<ShortMode>(&ram, &mut frames);
    let space = vm.create(&mut frames).unwrap();

    let entry = |raw: u64| vm.entry(&space, VirtualAddress::new(raw)).unwrap();

    assert_eq!(entry(short::KERNEL_BASE).frame().base().as_u64(), 0);
    assert!(entry(short::KERNEL_BASE).flags().writable());

    let text = entry(short::KERNEL_LINK);
    assert_eq!(text.frame().base().as_u64(), 0x10_0000);
    assert!(!text.flags().writable());
    assert!(!entry(data_start() - PAGE).flags().writable());

    let data = entry(data_start());
    assert!(data.flags().writable());
    assert_eq!(data.frame().base().as_u64(), data_start() - short::KERNEL_BASE);

    let device = entry(0xFFFF_F000);
    assert_eq!(device.frame().base().as_u64(), 0xFFFF_F000);
    assert!(device.flags().writable());

    // Nothing between the top of physical memory and device space.
    assert!(vm.walk(&space, VirtualAddress::new(short::KERNEL_BASE + PHYS_TOP)).is_none());
}

#[test]
fn directory_entries_link_tables_permissively() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<ShortMode>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.grow(&mut space, PAGE, &mut frames).unwrap();

    let root = space.root().unwrap();
    let directory = walk::<ShortMode, _>(&ram, root, VirtualAddress::new(0)).unwrap();
    let entries = unsafe { ram.phys_to_mut::<[u32; 1024]>(root.base()) };
    let link = entries[0];
    assert_eq!(link & 0xFFF, EntryFlags::table_link().into_bits().into());
    assert_eq!(u64::from(link & !0xFFF), directory.table().base().as_u64());
}

#[test]
fn boot_out_of_memory_returns_every_frame() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let mut taken = Vec::new();
    while frames.free_frames() > 10 {
        taken.push(frames.alloc_4k().unwrap());
    }

    let result = Vm::<ShortMode, _>::boot(<ShortMode as TestMode>::layout(), &ram, &mut frames);
    assert_eq!(result.err(), Some(VmError::OutOfMemory));
    assert_eq!(frames.free_frames(), 10);
}

#[test]
#[should_panic(expected = "physical top overlaps device space")]
fn physical_memory_reaching_into_device_space_panics() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let layout = ShortLayout {
        phys_top: 0x7F00_0000,
        ..<ShortMode as TestMode>::layout()
    };
    let _ = Vm::<ShortMode, _>::boot(layout, &ram, &mut frames);
}

#[test]
fn user_limit_is_the_kernel_base() {
    assert_eq!(ShortMode::USER_LIMIT, short::KERNEL_BASE);
    assert_eq!(ShortMode::OWNED_SLOTS, 1024);
}
