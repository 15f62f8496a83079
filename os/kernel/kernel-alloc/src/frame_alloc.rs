//! First-fit bitmap frame allocator.

use crate::FrameAlloc;
use kernel_memory_addresses::{PhysicalPage, Size4K};

/// Tracks up to `WORDS * 64` consecutive frames, one bit per frame.
///
/// A set bit means the frame is allocated (or does not exist because the
/// range is shorter than the bitmap). No heap is needed, so the allocator can
/// live in a `static` from early boot on.
pub struct BitmapFrameAlloc<const WORDS: usize> {
    first: PhysicalPage<Size4K>,
    frames: usize,
    used: [u64; WORDS],
    free: usize,
    /// Word to start the next search at.
    hint: usize,
}

impl<const WORDS: usize> BitmapFrameAlloc<WORDS> {
    /// Number of frames one allocator can track.
    pub const CAPACITY: usize = WORDS * 64;

    /// Manage `frames` frames starting at `first`, all initially free.
    ///
    /// # Panics
    /// If `frames` exceeds [`Self::CAPACITY`].
    #[must_use]
    pub fn new(first: PhysicalPage<Size4K>, frames: usize) -> Self {
        assert!(
            frames <= Self::CAPACITY,
            "{frames} frames do not fit a {WORDS}-word bitmap"
        );
        let mut used = [u64::MAX; WORDS];
        for (i, word) in used.iter_mut().enumerate() {
            let lo = i * 64;
            if lo >= frames {
                break;
            }
            let valid = (frames - lo).min(64);
            *word = if valid == 64 { 0 } else { u64::MAX << valid };
        }
        log::debug!("frame allocator: {frames} frames from {first}");
        Self {
            first,
            frames,
            used,
            free: frames,
            hint: 0,
        }
    }

    /// Frames currently available.
    #[must_use]
    pub const fn free_frames(&self) -> usize {
        self.free
    }

    /// Frames managed in total.
    #[must_use]
    pub const fn total_frames(&self) -> usize {
        self.frames
    }

    /// Whether `frame` lies in the managed range.
    #[must_use]
    pub const fn contains(&self, frame: PhysicalPage<Size4K>) -> bool {
        frame.number() >= self.first.number()
            && frame.number() - self.first.number() < self.frames as u64
    }

    #[must_use]
    pub fn is_allocated(&self, frame: PhysicalPage<Size4K>) -> bool {
        self.index_of(frame)
            .is_some_and(|i| self.used[i / 64] & (1 << (i % 64)) != 0)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn index_of(&self, frame: PhysicalPage<Size4K>) -> Option<usize> {
        self.contains(frame)
            .then(|| (frame.number() - self.first.number()) as usize)
    }
}

impl<const WORDS: usize> FrameAlloc for BitmapFrameAlloc<WORDS> {
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        if self.free == 0 {
            return None;
        }
        let word = (self.hint..WORDS)
            .chain(0..self.hint)
            .find(|&w| self.used[w] != u64::MAX)?;
        let bit = self.used[word].trailing_ones() as usize;
        self.used[word] |= 1 << bit;
        self.free -= 1;
        self.hint = word;
        Some(PhysicalPage::from_number(
            self.first.number() + (word * 64 + bit) as u64,
        ))
    }

    /// # Panics
    /// If `frame` is not managed here or is already free; both mean the
    /// caller's bookkeeping is corrupt.
    fn free_4k(&mut self, frame: PhysicalPage<Size4K>) {
        let Some(i) = self.index_of(frame) else {
            panic!("free_4k: frame {frame} is not managed by this allocator");
        };
        let mask = 1 << (i % 64);
        assert!(
            self.used[i / 64] & mask != 0,
            "free_4k: frame {frame} is already free"
        );
        self.used[i / 64] &= !mask;
        self.free += 1;
        self.hint = self.hint.min(i / 64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    fn first() -> PhysicalPage<Size4K> {
        PhysicalPage::containing(PhysicalAddress::new(0x0020_0000))
    }

    #[test]
    fn hands_out_each_frame_once() {
        let mut a = BitmapFrameAlloc::<2>::new(first(), 70);
        let mut seen = std::collections::BTreeSet::new();
        while let Some(f) = a.alloc_4k() {
            assert!(a.contains(f));
            assert!(seen.insert(f.number()));
        }
        assert_eq!(seen.len(), 70);
        assert_eq!(a.free_frames(), 0);
    }

    #[test]
    fn freed_frames_are_reused() {
        let mut a = BitmapFrameAlloc::<1>::new(first(), 3);
        let x = a.alloc_4k().unwrap();
        let _y = a.alloc_4k().unwrap();
        a.free_4k(x);
        assert!(!a.is_allocated(x));
        assert_eq!(a.alloc_4k(), Some(x));
    }

    #[test]
    fn first_frame_is_the_range_start() {
        let mut a = BitmapFrameAlloc::<1>::new(first(), 1);
        assert_eq!(a.alloc_4k(), Some(first()));
        assert_eq!(a.alloc_4k(), None);
    }

    #[test]
    #[should_panic(expected = "already free")]
    fn double_free_is_fatal() {
        let mut a = BitmapFrameAlloc::<1>::new(first(), 4);
        let f = a.alloc_4k().unwrap();
        a.free_4k(f);
        a.free_4k(f);
    }

    #[test]
    #[should_panic(expected = "not managed")]
    fn foreign_frame_is_fatal() {
        let mut a = BitmapFrameAlloc::<1>::new(first(), 4);
        a.free_4k(PhysicalPage::from_number(1));
    }
}
