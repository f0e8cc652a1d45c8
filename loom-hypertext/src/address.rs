use std::fmt;

/// An opaque, globally-unique identifier naming a slot in the Store.
///
/// Equality and hashing use only the identifier: two addresses with the
/// same underlying content are still distinct addresses. Content
/// deduplication is expressed by aliasing in the Store, not by Address
/// identity (SPEC_FULL.md §3).
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Address(u64);

impl Address {
    /// Only the Store is meant to mint these; kept `pub(crate)`-visible
    /// through a free function rather than a public constructor so that
    /// address identity can only ever come from allocation.
    #[doc(hidden)]
    pub fn from_raw(id: u64) -> Address {
        Address(id)
    }

    #[doc(hidden)]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
