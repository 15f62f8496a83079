use super::Vm;
use crate::address_space::AddressSpace;
use crate::entry::{EntryFlags, TableEntry};
use crate::error::VmError;
use crate::map::map_pages;
use crate::mode::PagingMode;
use crate::walk::walk;
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{Size4K, VirtualAddress};

/// Positional reads from a file, the way program segments are loaded.
pub trait FileRead {
    /// Read up to `dst.len()` bytes starting at `offset`; returns how many
    /// bytes were read.
    fn read_at(&mut self, dst: &mut [u8], offset: u64) -> usize;
}

impl FileRead for &[u8] {
    #[allow(clippy::cast_possible_truncation)]
    fn read_at(&mut self, dst: &mut [u8], offset: u64) -> usize {
        let Some(src) = self.get(offset as usize..) else {
            return 0;
        };
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);
        n
    }
}

impl<S: PagingMode, M: PhysMapper> Vm<'_, S, M> {
    /// Place `image` at user address zero in a fresh page of an empty
    /// `space`; the space is one page large afterwards.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`]; nothing is left mapped.
    ///
    /// # Panics
    /// If `image` is not smaller than a page, or `space` has no root.
    pub fn load_initial_image<A: FrameAlloc>(
        &self,
        space: &mut AddressSpace,
        image: &[u8],
        alloc: &mut A,
    ) -> Result<(), VmError> {
        let root = space.require_root("load_initial_image");
        assert!(
            (image.len() as u64) < PAGE_SIZE,
            "initial image must be smaller than a page, got {} bytes",
            image.len()
        );

        let frame = alloc.alloc_4k().ok_or(VmError::OutOfMemory)?;
        // SAFETY: freshly allocated; the only reference until it is mapped.
        let bytes = unsafe { self.mapper.frame_bytes(frame) };
        bytes.fill(0);
        bytes[..image.len()].copy_from_slice(image);

        if let Err(err) = map_pages::<S, M, A>(
            self.mapper,
            root,
            VirtualAddress::zero(),
            PAGE_SIZE,
            frame.base(),
            EntryFlags::user_rw(),
            alloc,
        ) {
            alloc.free_4k(frame);
            return Err(err);
        }

        space.set_size(PAGE_SIZE);
        Ok(())
    }

    /// Read `size` bytes of `file` at `offset` into the already mapped user
    /// pages starting at `dst`.
    ///
    /// # Errors
    /// [`VmError::ShortRead`] if the file ends early. Bytes read before that
    /// stay in place.
    ///
    /// # Panics
    /// If `dst` is not page aligned, a page of the destination is not
    /// mapped, or `space` has no root.
    pub fn load_segment<F: FileRead>(
        &self,
        space: &AddressSpace,
        dst: VirtualAddress,
        file: &mut F,
        offset: u64,
        size: u64,
    ) -> Result<(), VmError> {
        let root = space.require_root("load_segment");
        assert!(
            dst.is_aligned::<Size4K>(),
            "load_segment: destination {dst} must be page aligned"
        );

        let mut done = 0;
        while done < size {
            let va = dst + done;
            let entry = walk::<S, M>(self.mapper, root, va)
                .map(|slot| slot.read(self.mapper))
                .filter(|entry| entry.is_present())
                .unwrap_or_else(|| panic!("load_segment: address {va} entry should exist"));

            #[allow(clippy::cast_possible_truncation)]
            let wanted = (size - done).min(PAGE_SIZE) as usize;
            // SAFETY: the frame is mapped user memory of this space; no
            // reference into it is live.
            let bytes = unsafe { self.mapper.frame_bytes(entry.frame()) };
            let got = file.read_at(&mut bytes[..wanted], offset + done);
            if got != wanted {
                log::warn!("load_segment: short read into {va}: {got} of {wanted} bytes");
                return Err(VmError::ShortRead {
                    offset: offset + done,
                    wanted,
                    got,
                });
            }
            done += PAGE_SIZE;
        }
        Ok(())
    }
}
