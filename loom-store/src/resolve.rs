use loom_base::Result;
use loom_hypertext::{Address, Node};

use crate::{Store, Transaction};

/// Read-only access to a store or an open transaction against one.
///
/// `loom-context` walks workspaces to build a local pointer naming and
/// never needs to know whether it is reading a committed [`Store`] or a
/// live [`Transaction`]; it is written against this trait instead.
pub trait Resolve {
    fn dereference(&self, addr: Address) -> Result<&Node>;
    fn canonicalize(&self, addr: Address) -> Address;
    fn is_fulfilled(&self, addr: Address) -> bool;
}

impl<P> Resolve for Store<P> {
    fn dereference(&self, addr: Address) -> Result<&Node> {
        Store::dereference(self, addr)
    }

    fn canonicalize(&self, addr: Address) -> Address {
        Store::canonicalize(self, addr)
    }

    fn is_fulfilled(&self, addr: Address) -> bool {
        Store::is_fulfilled(self, addr)
    }
}

impl<P> Resolve for Transaction<'_, P> {
    fn dereference(&self, addr: Address) -> Result<&Node> {
        Transaction::dereference(self, addr)
    }

    fn canonicalize(&self, addr: Address) -> Address {
        Transaction::canonicalize(self, addr)
    }

    fn is_fulfilled(&self, addr: Address) -> bool {
        Transaction::is_fulfilled(self, addr)
    }
}
