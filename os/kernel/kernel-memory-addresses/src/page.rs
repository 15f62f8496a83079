use crate::{PageSize, PhysicalAddress, VirtualAddress};
use core::fmt;
use core::marker::PhantomData;

macro_rules! page_type {
    ($(#[$meta:meta])* $name:ident, $addr:ident, $tag:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name<S: PageSize> {
            base: u64,
            _size: PhantomData<S>,
        }

        impl<S: PageSize> $name<S> {
            /// The page containing `addr`.
            #[inline]
            #[must_use]
            pub const fn containing(addr: $addr) -> Self {
                Self {
                    base: addr.as_u64() & !S::MASK,
                    _size: PhantomData,
                }
            }

            /// The page starting at `addr`, or `None` if `addr` is not aligned.
            #[inline]
            #[must_use]
            pub const fn from_base(addr: $addr) -> Option<Self> {
                if addr.is_aligned::<S>() {
                    Some(Self::containing(addr))
                } else {
                    None
                }
            }

            /// The page with number `n`, i.e. base `n * S::SIZE`.
            #[inline]
            #[must_use]
            pub const fn from_number(n: u64) -> Self {
                Self {
                    base: n << S::SHIFT,
                    _size: PhantomData,
                }
            }

            #[inline(always)]
            #[must_use]
            pub const fn base(self) -> $addr {
                $addr::new(self.base)
            }

            #[inline(always)]
            #[must_use]
            pub const fn number(self) -> u64 {
                self.base >> S::SHIFT
            }

            /// The address `offset` bytes into this page.
            #[inline]
            #[must_use]
            pub const fn join(self, offset: u64) -> $addr {
                debug_assert!(offset < S::SIZE);
                $addr::new(self.base | (offset & S::MASK))
            }
        }

        impl<S: PageSize> fmt::Debug for $name<S> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!($tag, "<{}>({:#018X})"),
                    core::any::type_name::<S>(),
                    self.base
                )
            }
        }

        impl<S: PageSize> fmt::Display for $name<S> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#X}", self.base)
            }
        }
    };
}

page_type!(
    /// Aligned base of a physical frame of size `S`.
    PhysicalPage,
    PhysicalAddress,
    "PhysicalPage"
);

page_type!(
    /// Aligned base of a virtual page of size `S`.
    VirtualPage,
    VirtualAddress,
    "VirtualPage"
);
