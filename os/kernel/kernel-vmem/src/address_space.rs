use crate::mode::RootPage;

/// The user half of one process: its translation root and the size of its
/// contiguous user region `[0, size)`.
///
/// An `AddressSpace` does not free itself; hand it to
/// [`Vm::destroy`](crate::Vm::destroy) when the process goes away.
#[derive(Debug, PartialEq, Eq, Default)]
pub struct AddressSpace {
    root: Option<RootPage>,
    size: u64,
}

impl AddressSpace {
    /// An address space without a root; every operation on it panics.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            root: None,
            size: 0,
        }
    }

    pub(crate) const fn with_root(root: RootPage) -> Self {
        Self {
            root: Some(root),
            size: 0,
        }
    }

    #[must_use]
    pub const fn root(&self) -> Option<RootPage> {
        self.root
    }

    /// Bytes of user memory, counted from address zero.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    pub(crate) const fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub(crate) const fn take_root(&mut self) -> Option<RootPage> {
        self.size = 0;
        self.root.take()
    }

    /// The root, for operations that cannot run without one.
    pub(crate) fn require_root(&self, op: &str) -> RootPage {
        self.root
            .unwrap_or_else(|| panic!("{op}: no translation root"))
    }
}
