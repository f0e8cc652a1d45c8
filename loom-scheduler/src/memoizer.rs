use std::cell::RefCell;
use std::collections::HashMap;

use loom_actions::Action;
use loom_context::Context;

use crate::automator::Automator;

/// Remembers the last action taken in a context, keyed by its canonical
/// display, and replays it when the same context (by display equality)
/// comes up again. Every action is remembered unconditionally; replay is
/// gated only by `can_handle` finding that same display again, which for
/// `Reply`/`Unlock` against a freshly hydrated promisee is exactly the
/// amplification the memoizer exists for.
///
/// Interior mutability lets a single `Rc<Memoizer>` serve both as the
/// scheduler's own `remember`/`forget` bookkeeping handle and as an
/// `Rc<dyn Automator>` entry in the generic automators list.
pub struct Memoizer {
    remembered: RefCell<HashMap<String, Action>>,
}

impl Memoizer {
    pub fn new() -> Memoizer {
        Memoizer {
            remembered: RefCell::new(HashMap::new()),
        }
    }

    pub fn remember(&self, ctx: &Context, action: Action) {
        self.remembered
            .borrow_mut()
            .insert(ctx.display().to_string(), action);
    }

    pub fn forget(&self, ctx: &Context) {
        self.remembered.borrow_mut().remove(ctx.display());
    }
}

impl Default for Memoizer {
    fn default() -> Self {
        Memoizer::new()
    }
}

impl Automator for Memoizer {
    fn can_handle(&self, ctx: &Context) -> bool {
        self.remembered.borrow().contains_key(ctx.display())
    }

    fn handle(&self, ctx: &Context) -> Action {
        self.remembered
            .borrow()
            .get(ctx.display())
            .cloned()
            .expect("can_handle was checked before handle")
    }
}
