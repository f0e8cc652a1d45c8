use std::collections::HashMap;

use loom_base::{err, Kind, Result};
use loom_hypertext::{Address, Node};
use tracing::debug;

use crate::Transaction;

/// A content-addressed map of [`Node`]s with first-class unresolved
/// promises, generic over the promisee payload type `P` (e.g. a dry
/// context in `loom-context`) so this crate never needs to know what a
/// Context is.
///
/// An address is in exactly one of two states at any time: *pending* (it
/// has an entry in `promises`, possibly with subscribers, and no content)
/// or *resolved* (it has content, either directly in `content` or
/// indirectly through `aliases`).
pub struct Store<P> {
    pub(crate) next_id: u64,
    pub(crate) content: HashMap<Address, Node>,
    pub(crate) canonical: HashMap<String, Address>,
    pub(crate) promises: HashMap<Address, Vec<P>>,
    pub(crate) aliases: HashMap<Address, Address>,
}

impl<P> Default for Store<P> {
    fn default() -> Self {
        Store {
            next_id: 0,
            content: HashMap::new(),
            canonical: HashMap::new(),
            promises: HashMap::new(),
            aliases: HashMap::new(),
        }
    }
}

impl<P> Store<P> {
    pub fn new() -> Self {
        Store::default()
    }

    fn alloc(&mut self) -> Address {
        let id = self.next_id;
        self.next_id += 1;
        Address::from_raw(id)
    }

    /// Returns the existing canonical address if `content` is already
    /// present; otherwise allocates a new address and stores it.
    pub fn insert(&mut self, content: Node) -> Address {
        let key = content.canonical_key();
        if let Some(&addr) = self.canonical.get(&key) {
            debug!(target: "loom", %addr, "insert: content already canonical");
            return addr;
        }
        let addr = self.alloc();
        debug!(target: "loom", %addr, "insert: new content");
        self.canonical.insert(key, addr);
        self.content.insert(addr, content);
        addr
    }

    /// Allocates an address in the pending state with no promisees.
    pub fn make_promise(&mut self) -> Address {
        let addr = self.alloc();
        self.promises.insert(addr, Vec::new());
        addr
    }

    /// Appends `value` to the promisees list of a pending promise.
    pub fn register_promisee(&mut self, addr: Address, value: P) -> Result<()> {
        match self.promises.get_mut(&addr) {
            Some(promisees) => {
                promisees.push(value);
                Ok(())
            }
            None => Err(err(
                Kind::PromiseContractViolation,
                format!("{addr} is not a pending promise"),
            )),
        }
    }

    /// Resolves a pending promise with `content`, returning and clearing
    /// its promisees list.
    pub fn resolve_promise(&mut self, addr: Address, content: Node) -> Result<Vec<P>> {
        let promisees = self.promises.remove(&addr).ok_or_else(|| {
            err(
                Kind::PromiseContractViolation,
                format!("{addr} is not a pending promise"),
            )
        })?;

        let key = content.canonical_key();
        match self.canonical.get(&key) {
            Some(&canonical_addr) => {
                debug!(target: "loom", %addr, alias_of = %canonical_addr, "resolve_promise: aliasing");
                self.aliases.insert(addr, canonical_addr);
            }
            None => {
                debug!(target: "loom", %addr, "resolve_promise: storing new canonical content");
                self.canonical.insert(key, addr);
                self.content.insert(addr, content);
            }
        }
        Ok(promisees)
    }

    /// Follows the alias chain for `addr`. A single step suffices: by
    /// construction, aliases always point directly at a canonical
    /// address.
    pub fn canonicalize(&self, addr: Address) -> Address {
        self.aliases.get(&addr).copied().unwrap_or(addr)
    }

    /// Follows aliases and returns the stored content; fails if `addr` is
    /// still pending.
    pub fn dereference(&self, addr: Address) -> Result<&Node> {
        let canonical = self.canonicalize(addr);
        self.content.get(&canonical).ok_or_else(|| {
            err(
                Kind::PromiseContractViolation,
                format!("{addr} is still pending"),
            )
        })
    }

    /// Reports whether `addr` (after canonicalization) has content.
    pub fn is_fulfilled(&self, addr: Address) -> bool {
        self.dereference(addr).is_ok()
    }

    /// Opens a transactional overlay on this store.
    pub fn begin_transaction(&self) -> Transaction<'_, P> {
        Transaction::new(self)
    }

    /// The current promisees of a pending promise, or an empty slice if
    /// `addr` is not a pending promise (resolved, or never one).
    pub fn promisees_of(&self, addr: Address) -> &[P] {
        self.promises.get(&addr).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use loom_hypertext::{Fragment, RawNode};
    use test_log::test;

    fn literal(text: &str) -> Node {
        Node::Raw(RawNode::new(vec![Fragment::Literal(text.to_string())]))
    }

    #[test]
    fn insert_dedups_identical_content() {
        let mut store: Store<()> = Store::new();
        let a = store.insert(literal("hello"));
        let b = store.insert(literal("hello"));
        assert_eq!(a, b);
        let c = store.insert(literal("world"));
        assert_ne!(a, c);
    }

    #[test]
    fn promise_lifecycle() {
        let mut store: Store<&'static str> = Store::new();
        let promise = store.make_promise();
        assert!(!store.is_fulfilled(promise));

        store.register_promisee(promise, "waiter-a").unwrap();
        store.register_promisee(promise, "waiter-b").unwrap();

        let delivered = store.resolve_promise(promise, literal("answer")).unwrap();
        assert_eq!(delivered, vec!["waiter-a", "waiter-b"]);
        assert!(store.is_fulfilled(promise));
        assert_eq!(store.dereference(promise).unwrap(), &literal("answer"));
    }

    #[test]
    fn resolving_to_existing_content_aliases_instead_of_duplicating() {
        let mut store: Store<()> = Store::new();
        let existing = store.insert(literal("shared"));
        let promise = store.make_promise();

        store.resolve_promise(promise, literal("shared")).unwrap();
        assert_eq!(store.canonicalize(promise), existing);
    }

    #[test]
    fn registering_on_resolved_promise_fails() {
        let mut store: Store<()> = Store::new();
        let promise = store.make_promise();
        store.resolve_promise(promise, literal("done")).unwrap();
        assert!(store.register_promisee(promise, ()).is_err());
    }

    #[test]
    fn resolving_unknown_address_fails() {
        let mut store: Store<()> = Store::new();
        let bogus = store.insert(literal("not a promise"));
        assert!(store.resolve_promise(bogus, literal("x")).is_err());
    }
}
