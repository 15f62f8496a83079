#[macro_use]
mod common;

use common::{Frames, MemFile, PAGE, TestMode, boot, memory, pattern};
use kernel_alloc::{FrameAlloc, HostMemory, PhysMapper};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_vmem::{AddressSpace, EntryFlags, TableEntry, Vm, VmError};

fn va(raw: u64) -> VirtualAddress {
    VirtualAddress::new(raw)
}

/// The frame behind every page below `size`, `None` where nothing is mapped.
fn user_frames<S: TestMode>(
    vm: &Vm<'_, S, HostMemory>,
    space: &AddressSpace,
    size: u64,
) -> Vec<Option<PhysicalPage<Size4K>>> {
    (0..size.div_ceil(PAGE))
        .map(|n| {
            vm.entry(space, va(n * PAGE))
                .filter(|entry| entry.is_present())
                .map(TableEntry::frame)
        })
        .collect()
}

/// Take frames until only `keep` are left.
fn drain(frames: &mut Frames, keep: usize) -> Vec<PhysicalPage<Size4K>> {
    let mut taken = Vec::new();
    while frames.free_frames() > keep {
        taken.push(frames.alloc_4k().unwrap());
    }
    taken
}

fn refill(frames: &mut Frames, taken: Vec<PhysicalPage<Size4K>>) {
    for frame in taken {
        frames.free_4k(frame);
    }
}

fn read_user<S: TestMode>(
    vm: &Vm<'_, S, HostMemory>,
    space: &AddressSpace,
    at: u64,
    len: usize,
) -> Vec<u8> {
    let mut bytes = vec![0; len];
    vm.copy_in(space, va(at), &mut bytes).unwrap();
    bytes
}

in_both_modes!(
    create_starts_empty,
    grow_to_the_user_limit_fails,
    grow_maps_zeroed_user_pages,
    grow_shrink_round_trip,
    resizing_in_the_wrong_direction_changes_nothing,
    shrink_to_zero_releases_the_table,
    duplicate_copies_into_distinct_frames,
    translate_requires_user_access,
    destroy_is_exhaustive,
    load_then_copy_scenario,
    grow_rolls_back_when_memory_runs_out,
    create_out_of_memory_leaks_nothing,
    duplicate_out_of_memory_leaks_nothing,
    load_segment_reports_short_reads,
    addresses_past_the_walk_span_have_no_entry,
    destroy_reclaims_the_top_user_page,
);

panics_in_both_modes!(
    mapping_twice_panics => "remap",
    destroying_an_empty_space_panics => "no translation root",
    growing_an_empty_space_panics => "no translation root",
    oversized_initial_image_panics => "initial image must be smaller than a page",
    load_segment_into_unmapped_memory_panics => "entry should exist",
    load_segment_to_unaligned_address_panics => "must be page aligned",
    guard_page_on_unmapped_memory_panics => "entry should exist",
    duplicating_a_hole_panics => "page not present",
    load_segment_at_one_gib_panics => "entry should exist",
    load_segment_past_the_walk_span_panics => "entry should exist",
    guard_page_past_the_walk_span_panics => "entry should exist",
    mapping_past_the_user_limit_panics => "reaches past the user limit",
);

fn create_starts_empty<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);

    let space = vm.create(&mut frames).unwrap();
    assert_eq!(space.size(), 0);
    assert!(space.root().is_some());
    assert_eq!(vm.translate(&space, va(0)), None);
    vm.destroy(space, &mut frames);
}

fn grow_to_the_user_limit_fails<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.grow(&mut space, 2 * PAGE, &mut frames).unwrap();
    let free = frames.free_frames();

    assert_eq!(
        vm.grow(&mut space, S::USER_LIMIT, &mut frames),
        Err(VmError::BeyondUserLimit {
            requested: S::USER_LIMIT,
            limit: S::USER_LIMIT
        })
    );
    assert!(vm.grow(&mut space, u64::MAX, &mut frames).is_err());
    assert_eq!(space.size(), 2 * PAGE);
    assert_eq!(frames.free_frames(), free);
}

fn grow_maps_zeroed_user_pages<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();

    // Dirty a frame so a missing zero fill would show.
    let dirty = frames.alloc_4k().unwrap();
    unsafe { ram.frame_bytes(dirty).fill(0xAA) };
    frames.free_4k(dirty);

    assert_eq!(vm.grow(&mut space, PAGE + 1, &mut frames), Ok(PAGE + 1));
    assert_eq!(space.size(), PAGE + 1);
    for page in [0, PAGE] {
        let entry = vm.entry(&space, va(page)).unwrap();
        let flags = entry.flags();
        assert!(flags.present() && flags.writable() && flags.user());
        assert_eq!(read_user(&vm, &space, page, PAGE as usize), vec![0; PAGE as usize]);
    }
    assert!(vm.entry(&space, va(2 * PAGE)).is_none_or(|entry| !entry.is_present()));
}

fn grow_shrink_round_trip<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();

    let small = 3 * PAGE + 100;
    let large = S::TABLE_SPAN + 2 * PAGE;
    vm.grow(&mut space, small, &mut frames).unwrap();
    let free = frames.free_frames();
    let before = user_frames(&vm, &space, large);

    assert_eq!(vm.grow(&mut space, large, &mut frames), Ok(large));
    let new_pages = (large / PAGE - 4) as usize;
    assert_eq!(free - frames.free_frames(), new_pages + 1, "pages plus one table");

    assert_eq!(vm.shrink(&mut space, small, &mut frames), small);
    assert_eq!(space.size(), small);
    assert_eq!(frames.free_frames(), free);
    assert_eq!(user_frames(&vm, &space, large), before);
}

fn resizing_in_the_wrong_direction_changes_nothing<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.grow(&mut space, 3 * PAGE, &mut frames).unwrap();
    let free = frames.free_frames();

    assert_eq!(vm.grow(&mut space, PAGE, &mut frames), Ok(3 * PAGE));
    assert_eq!(vm.shrink(&mut space, 5 * PAGE, &mut frames), 3 * PAGE);
    assert_eq!(vm.shrink(&mut space, 3 * PAGE, &mut frames), 3 * PAGE);
    assert_eq!(space.size(), 3 * PAGE);
    assert_eq!(frames.free_frames(), free);
}

fn shrink_to_zero_releases_the_table<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    let free = frames.free_frames();

    vm.grow(&mut space, 2 * PAGE, &mut frames).unwrap();
    assert_eq!(free - frames.free_frames(), 3);
    assert_eq!(vm.shrink(&mut space, 0, &mut frames), 0);
    assert_eq!(frames.free_frames(), free);
    assert!(vm.walk(&space, va(0)).is_none());
}

fn duplicate_copies_into_distinct_frames<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let free = frames.free_frames();

    let mut parent = vm.create(&mut frames).unwrap();
    vm.grow(&mut parent, 3 * PAGE, &mut frames).unwrap();
    let data = pattern(3 * PAGE as usize, 7);
    vm.copy_out(&parent, va(0), &data).unwrap();
    vm.clear_user_accessible(&parent, va(2 * PAGE));

    let child = vm.duplicate(&parent, parent.size(), &mut frames).unwrap();
    assert_eq!(child.size(), 3 * PAGE);
    assert_ne!(child.root(), parent.root());

    for page in [0, PAGE] {
        let a = vm.translate(&parent, va(page)).unwrap();
        let b = vm.translate(&child, va(page)).unwrap();
        assert_ne!(a, b);
    }
    assert_eq!(read_user(&vm, &child, 0, 2 * PAGE as usize), data[..2 * PAGE as usize]);

    // The guard page keeps its permissions and its bytes.
    let guard = vm.entry(&child, va(2 * PAGE)).unwrap();
    assert!(guard.is_present());
    assert!(!guard.flags().user());
    let copied = unsafe { ram.frame_bytes(guard.frame()) };
    assert_eq!(&copied[..], &data[2 * PAGE as usize..]);

    vm.copy_out(&parent, va(0), &[0xFF; 16]).unwrap();
    assert_eq!(read_user(&vm, &child, 0, 16), data[..16]);

    vm.destroy(child, &mut frames);
    vm.destroy(parent, &mut frames);
    assert_eq!(frames.free_frames(), free);
}

fn translate_requires_user_access<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.grow(&mut space, 2 * PAGE, &mut frames).unwrap();

    let frame = vm.entry(&space, va(PAGE)).unwrap().frame();
    assert_eq!(vm.translate(&space, va(PAGE)), Some(ram.phys_to_virt(frame.base())));
    assert_eq!(vm.translate(&space, va(PAGE + 123)), vm.translate(&space, va(PAGE)));

    vm.clear_user_accessible(&space, va(PAGE));
    assert_eq!(vm.translate(&space, va(PAGE)), None);
    assert!(vm.entry(&space, va(PAGE)).unwrap().is_present());

    assert_eq!(
        vm.copy_out(&space, va(PAGE - 10), &[1; 20]),
        Err(VmError::BadUserAddress(va(PAGE)))
    );
    assert_eq!(read_user(&vm, &space, PAGE - 10, 10), vec![1; 10]);

    assert_eq!(vm.translate(&space, va(2 * PAGE)), None);
    assert_eq!(vm.translate(&space, va(S::USER_LIMIT)), None);
    assert_eq!(vm.translate(&space, va(S::USER_LIMIT - PAGE)), None);
    assert_eq!(vm.translate(&AddressSpace::empty(), va(0)), None);
}

fn destroy_is_exhaustive<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let free = frames.free_frames();

    let mut space = vm.create(&mut frames).unwrap();
    vm.load_initial_image(&mut space, &pattern(50, 1), &mut frames).unwrap();
    vm.grow(&mut space, 5 * PAGE, &mut frames).unwrap();
    vm.clear_user_accessible(&space, va(3 * PAGE));

    // A lone page far above the size, in a table of its own.
    let far = frames.alloc_4k().unwrap();
    vm.map_pages(
        &space,
        va(3 * S::TABLE_SPAN + 5 * PAGE),
        PAGE,
        far.base(),
        EntryFlags::user_rw(),
        &mut frames,
    )
    .unwrap();

    vm.destroy(space, &mut frames);
    assert_eq!(frames.free_frames(), free);
}

fn addresses_past_the_walk_span_have_no_entry<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.load_initial_image(&mut space, &[1, 2, 3], &mut frames).unwrap();

    // Same table indices as page 0, one full walk span higher.
    assert!(vm.entry(&space, va(S::WALK_SPAN)).is_none());
    assert!(vm.walk(&space, va(S::WALK_SPAN + PAGE)).is_none());
    assert_eq!(vm.translate(&space, va(S::WALK_SPAN)), None);
    assert!(vm.entry(&space, va(0)).unwrap().flags().user());
}

fn destroy_reclaims_the_top_user_page<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let free = frames.free_frames();

    let space = vm.create(&mut frames).unwrap();
    let top = frames.alloc_4k().unwrap();
    vm.map_pages(
        &space,
        va(S::USER_LIMIT - PAGE),
        PAGE,
        top.base(),
        EntryFlags::user_rw(),
        &mut frames,
    )
    .unwrap();
    assert_eq!(vm.entry(&space, va(S::USER_LIMIT - PAGE)).map(TableEntry::frame), Some(top));

    vm.destroy(space, &mut frames);
    assert_eq!(frames.free_frames(), free);
}

fn load_then_copy_scenario<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();

    let image = pattern(50, 1);
    vm.load_initial_image(&mut space, &image, &mut frames).unwrap();
    assert_eq!(space.size(), PAGE);
    assert_eq!(read_user(&vm, &space, 0, 50), image);
    assert_eq!(read_user(&vm, &space, 50, 10), vec![0; 10]);

    assert_eq!(vm.grow(&mut space, 8192, &mut frames), Ok(8192));

    let mut file = MemFile::new(pattern(3 * PAGE as usize, 9));
    vm.load_segment(&space, va(PAGE), &mut file, PAGE, PAGE).unwrap();
    assert_eq!(file.reads, 1);
    let page = vm.translate(&space, va(PAGE)).unwrap();
    let bytes = unsafe { core::slice::from_raw_parts(page.as_mut_ptr::<u8>(), PAGE as usize) };
    assert_eq!(bytes, &file.data[PAGE as usize..2 * PAGE as usize]);

    let buffer = pattern(8000, 3);
    vm.copy_out(&space, va(100), &buffer).unwrap();
    assert_eq!(read_user(&vm, &space, 100, 8000), buffer);
}

fn grow_rolls_back_when_memory_runs_out<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.load_initial_image(&mut space, &pattern(50, 1), &mut frames).unwrap();
    let before = user_frames(&vm, &space, 10 * PAGE);

    let taken = drain(&mut frames, 3);
    assert_eq!(
        vm.grow(&mut space, 10 * PAGE, &mut frames),
        Err(VmError::OutOfMemory)
    );
    assert_eq!(space.size(), PAGE);
    assert_eq!(frames.free_frames(), 3);
    assert_eq!(user_frames(&vm, &space, 10 * PAGE), before);
    refill(&mut frames, taken);

    assert_eq!(vm.grow(&mut space, 10 * PAGE, &mut frames), Ok(10 * PAGE));
}

fn create_out_of_memory_leaks_nothing<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);

    let taken = drain(&mut frames, 2);
    assert_eq!(vm.create(&mut frames), Err(VmError::OutOfMemory));
    assert_eq!(frames.free_frames(), 2);
    refill(&mut frames, taken);
}

fn duplicate_out_of_memory_leaks_nothing<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut parent = vm.create(&mut frames).unwrap();
    vm.grow(&mut parent, 4 * PAGE, &mut frames).unwrap();

    let free = frames.free_frames();
    let probe = vm.create(&mut frames).unwrap();
    let root_cost = free - frames.free_frames();
    vm.destroy(probe, &mut frames);

    // Room for the root, one table and one page.
    let keep = root_cost + 2;
    let taken = drain(&mut frames, keep);
    assert_eq!(
        vm.duplicate(&parent, parent.size(), &mut frames),
        Err(VmError::OutOfMemory)
    );
    assert_eq!(frames.free_frames(), keep);
    refill(&mut frames, taken);
}

fn load_segment_reports_short_reads<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.grow(&mut space, 2 * PAGE, &mut frames).unwrap();

    let mut file = MemFile::new(pattern(5000, 4));
    assert_eq!(
        vm.load_segment(&space, va(0), &mut file, 0, 2 * PAGE),
        Err(VmError::ShortRead {
            offset: PAGE,
            wanted: PAGE as usize,
            got: 5000 - PAGE as usize,
        })
    );
    assert_eq!(read_user(&vm, &space, 0, PAGE as usize), file.data[..PAGE as usize]);
}

fn mapping_twice_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.grow(&mut space, 2 * PAGE, &mut frames).unwrap();

    let frame = frames.alloc_4k().unwrap();
    let _ = vm.map_pages(
        &space,
        va(PAGE + 8),
        16,
        frame.base(),
        EntryFlags::user_rw(),
        &mut frames,
    );
}

fn destroying_an_empty_space_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    vm.destroy(AddressSpace::empty(), &mut frames);
}

fn growing_an_empty_space_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let _ = vm.grow(&mut AddressSpace::empty(), PAGE, &mut frames);
}

fn oversized_initial_image_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    let _ = vm.load_initial_image(&mut space, &[0; PAGE as usize], &mut frames);
}

fn load_segment_into_unmapped_memory_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.grow(&mut space, PAGE, &mut frames).unwrap();

    let mut file = MemFile::new(pattern(2 * PAGE as usize, 0));
    let _ = vm.load_segment(&space, va(0), &mut file, 0, 2 * PAGE);
}

fn load_segment_to_unaligned_address_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.grow(&mut space, 2 * PAGE, &mut frames).unwrap();

    let mut file = MemFile::new(pattern(PAGE as usize, 0));
    let _ = vm.load_segment(&space, va(12), &mut file, 0, 100);
}

fn guard_page_on_unmapped_memory_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let space = vm.create(&mut frames).unwrap();
    vm.clear_user_accessible(&space, va(0));
}

fn load_segment_at_one_gib_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.load_initial_image(&mut space, &[1, 2, 3], &mut frames).unwrap();

    let mut file = MemFile::new(pattern(16, 9));
    let _ = vm.load_segment(&space, va(0x4000_0000), &mut file, 0, 16);
}

fn load_segment_past_the_walk_span_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.load_initial_image(&mut space, &[1, 2, 3], &mut frames).unwrap();

    let mut file = MemFile::new(pattern(16, 9));
    let _ = vm.load_segment(&space, va(S::WALK_SPAN), &mut file, 0, 16);
}

fn guard_page_past_the_walk_span_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.load_initial_image(&mut space, &[1, 2, 3], &mut frames).unwrap();
    vm.clear_user_accessible(&space, va(S::WALK_SPAN));
}

fn mapping_past_the_user_limit_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let space = vm.create(&mut frames).unwrap();

    let frame = frames.alloc_4k().unwrap();
    let _ = vm.map_pages(
        &space,
        va(S::USER_LIMIT - PAGE),
        2 * PAGE,
        frame.base(),
        EntryFlags::user_rw(),
        &mut frames,
    );
}

fn duplicating_a_hole_panics<S: TestMode>() {
    let ram = memory();
    let mut frames: Frames = ram.allocator();
    let vm = boot::<S>(&ram, &mut frames);
    let mut space = vm.create(&mut frames).unwrap();
    vm.grow(&mut space, PAGE, &mut frames).unwrap();
    let _ = vm.duplicate(&space, 2 * PAGE, &mut frames);
}
