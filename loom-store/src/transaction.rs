use std::collections::{HashMap, HashSet};

use loom_base::{err, Kind, Result};
use loom_hypertext::{Address, Node};
use tracing::debug;

use crate::Store;

/// A shadow store layered over a [`Store`]: reads consult the overlay
/// first and fall through to the base, writes land only in the overlay
/// until [`commit`](Transaction::commit). The base is never mutated by a
/// live transaction, which is what makes `discard` free.
///
/// Address allocation reserves a contiguous range starting at the base's
/// `next_id`; the base counter only advances on commit. This is sound
/// because resolving an action is non-reentrant: at most one transaction
/// is ever open against a given store.
pub struct Transaction<'s, P> {
    base: &'s Store<P>,
    next_id: u64,
    new_content: HashMap<Address, Node>,
    new_canonical: HashMap<String, Address>,
    new_aliases: HashMap<Address, Address>,
    new_promises: HashMap<Address, Vec<P>>,
    promisee_additions: HashMap<Address, Vec<P>>,
    resolved_base_promises: HashSet<Address>,
}

impl<'s, P> Transaction<'s, P> {
    pub(crate) fn new(base: &'s Store<P>) -> Self {
        Transaction {
            base,
            next_id: base.next_id,
            new_content: HashMap::new(),
            new_canonical: HashMap::new(),
            new_aliases: HashMap::new(),
            new_promises: HashMap::new(),
            promisee_additions: HashMap::new(),
            resolved_base_promises: HashSet::new(),
        }
    }

    fn alloc(&mut self) -> Address {
        let id = self.next_id;
        self.next_id += 1;
        Address::from_raw(id)
    }

    fn canonical_address_for(&self, key: &str) -> Option<Address> {
        self.new_canonical
            .get(key)
            .or_else(|| self.base.canonical.get(key))
            .copied()
    }

    /// Whether `addr` is pending from this transaction's point of view:
    /// known as a promise, either newly created here or inherited from
    /// the base, and not yet resolved within this transaction.
    fn is_pending(&self, addr: Address) -> bool {
        if self.new_content.contains_key(&addr) || self.new_aliases.contains_key(&addr) {
            return false;
        }
        self.new_promises.contains_key(&addr) || self.base.promises.contains_key(&addr)
    }

    pub fn insert(&mut self, content: Node) -> Address {
        let key = content.canonical_key();
        if let Some(addr) = self.canonical_address_for(&key) {
            return addr;
        }
        let addr = self.alloc();
        self.new_canonical.insert(key, addr);
        self.new_content.insert(addr, content);
        addr
    }

    pub fn make_promise(&mut self) -> Address {
        let addr = self.alloc();
        self.new_promises.insert(addr, Vec::new());
        addr
    }

    pub fn register_promisee(&mut self, addr: Address, value: P) -> Result<()> {
        if !self.is_pending(addr) {
            return Err(err(
                Kind::PromiseContractViolation,
                format!("{addr} is not a pending promise"),
            ));
        }
        self.promisee_additions.entry(addr).or_default().push(value);
        Ok(())
    }

    pub fn resolve_promise(&mut self, addr: Address, content: Node) -> Result<Vec<P>>
    where
        P: Clone,
    {
        if !self.is_pending(addr) {
            return Err(err(
                Kind::PromiseContractViolation,
                format!("{addr} is not a pending promise"),
            ));
        }

        let mut promisees = self.base.promises.get(&addr).cloned().unwrap_or_default();
        if !promisees.is_empty() || self.base.promises.contains_key(&addr) {
            self.resolved_base_promises.insert(addr);
        }
        promisees.extend(self.new_promises.remove(&addr).unwrap_or_default());
        promisees.extend(self.promisee_additions.remove(&addr).unwrap_or_default());

        let key = content.canonical_key();
        match self.canonical_address_for(&key) {
            Some(canonical_addr) if canonical_addr != addr => {
                debug!(target: "loom", %addr, alias_of = %canonical_addr, "transaction resolve_promise: aliasing");
                self.new_aliases.insert(addr, canonical_addr);
            }
            _ => {
                debug!(target: "loom", %addr, "transaction resolve_promise: storing new canonical content");
                self.new_canonical.insert(key, addr);
                self.new_content.insert(addr, content);
            }
        }
        Ok(promisees)
    }

    pub fn canonicalize(&self, addr: Address) -> Address {
        self.new_aliases
            .get(&addr)
            .or_else(|| self.base.aliases.get(&addr))
            .copied()
            .unwrap_or(addr)
    }

    pub fn dereference(&self, addr: Address) -> Result<&Node> {
        let canonical = self.canonicalize(addr);
        self.new_content
            .get(&canonical)
            .or_else(|| self.base.content.get(&canonical))
            .ok_or_else(|| {
                err(
                    Kind::PromiseContractViolation,
                    format!("{addr} is still pending"),
                )
            })
    }

    pub fn is_fulfilled(&self, addr: Address) -> bool {
        self.dereference(addr).is_ok()
    }

    /// Merges the overlay into `store` and advances its address counter.
    pub fn commit(self, store: &mut Store<P>) {
        debug!(
            target: "loom",
            new_content = self.new_content.len(),
            new_promises = self.new_promises.len(),
            "transaction commit"
        );
        store.next_id = self.next_id;
        store.content.extend(self.new_content);
        store.canonical.extend(self.new_canonical);
        store.aliases.extend(self.new_aliases);
        for addr in self.resolved_base_promises {
            store.promises.remove(&addr);
        }
        for (addr, promisees) in self.new_promises {
            store.promises.insert(addr, promisees);
        }
        for (addr, additions) in self.promisee_additions {
            if let Some(list) = store.promises.get_mut(&addr) {
                list.extend(additions);
            }
        }
    }

    /// Drops every staged change; the base store is left untouched.
    pub fn discard(self) {
        debug!(target: "loom", "transaction discard");
    }
}
