use crate::{PageSize, PhysicalPage, VirtualPage};
use core::fmt;
use core::ops::{Add, AddAssign, Sub};

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident, $page:ident, $tag:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(u64);

        impl $name {
            #[inline(always)]
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            #[inline(always)]
            #[must_use]
            pub const fn zero() -> Self {
                Self(0)
            }

            #[inline(always)]
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            #[inline(always)]
            #[must_use]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }

            #[inline]
            #[must_use]
            pub const fn is_aligned<S: PageSize>(self) -> bool {
                self.0 & S::MASK == 0
            }

            #[inline]
            #[must_use]
            pub const fn align_down<S: PageSize>(self) -> Self {
                Self(self.0 & !S::MASK)
            }

            /// Rounds up to the next `S` boundary.
            ///
            /// Wraps to zero past the top of the address space.
            #[inline]
            #[must_use]
            pub const fn align_up<S: PageSize>(self) -> Self {
                Self(self.0.wrapping_add(S::MASK) & !S::MASK)
            }

            /// Byte offset of this address within its `S`-sized page.
            #[inline]
            #[must_use]
            pub const fn offset_in<S: PageSize>(self) -> u64 {
                self.0 & S::MASK
            }

            /// The `S`-sized page containing this address.
            #[inline]
            #[must_use]
            pub const fn page<S: PageSize>(self) -> $page<S> {
                $page::containing(self)
            }

            #[inline]
            #[must_use]
            pub const fn checked_add(self, rhs: u64) -> Option<Self> {
                match self.0.checked_add(rhs) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "({:#018X})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#X}", self.0)
            }
        }

        impl From<u64> for $name {
            #[inline(always)]
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl<S: PageSize> From<$page<S>> for $name {
            #[inline(always)]
            fn from(page: $page<S>) -> Self {
                page.base()
            }
        }

        impl Add<u64> for $name {
            type Output = Self;

            #[inline(always)]
            fn add(self, rhs: u64) -> Self {
                Self(self.0 + rhs)
            }
        }

        impl AddAssign<u64> for $name {
            #[inline(always)]
            fn add_assign(&mut self, rhs: u64) {
                self.0 += rhs;
            }
        }

        impl Sub for $name {
            type Output = u64;

            #[inline(always)]
            fn sub(self, rhs: Self) -> u64 {
                self.0 - rhs.0
            }
        }
    };
}

address_type!(
    /// Physical memory address (RAM or MMIO).
    PhysicalAddress,
    PhysicalPage,
    "PA"
);

address_type!(
    /// Virtual address, translated by the active page tables.
    VirtualAddress,
    VirtualPage,
    "VA"
);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize as u64)
    }

    /// Reinterprets the address as a raw pointer in the current address space.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as usize as *mut T
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Size2M, Size4K};

    #[test]
    fn rounding() {
        let va = VirtualAddress::new(0x20_1234);
        assert_eq!(va.align_down::<Size4K>().as_u64(), 0x20_1000);
        assert_eq!(va.align_up::<Size4K>().as_u64(), 0x20_2000);
        assert_eq!(va.align_down::<Size2M>().as_u64(), 0x20_0000);
        assert_eq!(va.align_up::<Size2M>().as_u64(), 0x40_0000);
        assert_eq!(VirtualAddress::new(0x3000).align_up::<Size4K>().as_u64(), 0x3000);
    }

    #[test]
    fn offsets_and_pages() {
        let pa = PhysicalAddress::new(0x0010_2042);
        assert_eq!(pa.offset_in::<Size4K>(), 0x42);
        assert_eq!(pa.page::<Size4K>().base(), PhysicalAddress::new(0x0010_2000));
        assert!(!pa.is_aligned::<Size4K>());
        assert!(pa.page::<Size4K>().base().is_aligned::<Size4K>());
    }

    #[test]
    fn align_up_wraps_at_the_top() {
        let top = VirtualAddress::new(u64::MAX - 5);
        assert!(top.align_up::<Size4K>().is_null());
    }
}
