use std::collections::VecDeque;
use std::rc::Rc;

use loom_actions::{Action, Outcome};
use loom_base::{err, Config, Kind, Result};
use loom_context::{Context, DryContext};
use loom_hypertext::{Address, Node, WorkspaceNode};
use loom_store::{Store, Transaction};
use tracing::{debug, info, warn};

use crate::automator::Automator;
use crate::memoizer::Memoizer;

/// Active/pending context queues, automation replay, cycle detection, and
/// atomic commit over a `Store<DryContext>`. SPEC_FULL.md §4.4.
pub struct Scheduler {
    store: Store<DryContext>,
    active: Vec<Rc<Context>>,
    pending: VecDeque<Rc<Context>>,
    memoizer: Rc<Memoizer>,
    automators: Vec<Rc<dyn Automator>>,
    config: Config,
}

impl Scheduler {
    pub fn new(config: Config) -> Scheduler {
        let memoizer = Rc::new(Memoizer::new());
        Scheduler {
            store: Store::new(),
            active: Vec::new(),
            pending: VecDeque::new(),
            automators: vec![Rc::clone(&memoizer) as Rc<dyn Automator>],
            memoizer,
            config,
        }
    }

    pub fn store(&self) -> &Store<DryContext> {
        &self.store
    }

    pub fn active(&self) -> &[Rc<Context>] {
        &self.active
    }

    pub fn pending(&self) -> &VecDeque<Rc<Context>> {
        &self.pending
    }

    /// Inserts the root question, allocates its two promises, builds the
    /// initial workspace and context, adds it to `active`, then replays it
    /// through the memoizer for as long as the memoizer can handle the
    /// current context.
    pub fn ask_root(&mut self, question_text: &str) -> Result<Rc<Context>> {
        let mut txn = self.store.begin_transaction();
        let question = loom_actions::insert_plain_text(&mut txn, question_text)?;
        let answer_promise = txn.make_promise();
        let final_workspace_promise = txn.make_promise();
        let scratchpad = txn.insert(Node::Raw(Default::default()));
        let workspace = txn.insert(Node::Workspace(WorkspaceNode {
            question,
            answer_promise,
            final_workspace_promise,
            scratchpad,
            subquestions: Vec::new(),
            predecessor: None,
        }));
        let root = Context::new(&txn, workspace, None, None)?;
        txn.commit(&mut self.store);

        let root = Rc::new(root);
        self.active.push(Rc::clone(&root));
        info!(target: "loom", workspace = %root.workspace(), "ask_root");
        self.replay_while_automatable(root)
    }

    fn replay_while_automatable(&mut self, ctx: Rc<Context>) -> Result<Rc<Context>> {
        let mut current = ctx;
        while let Some(automator) = self.automators.iter().find(|a| a.can_handle(&current)) {
            let action = automator.handle(&current);
            match self.resolve_action(&current, action)? {
                Some(successor) => current = successor,
                None => break,
            }
        }
        Ok(current)
    }

    /// Applies `action` to `starting` atomically: opens a transaction,
    /// records the memoizer entry, executes the action, drains the
    /// automation work queue (spawned contexts plus everything already
    /// pending), and either commits or discards on any failure — including
    /// a cycle detected among automation-produced contexts.
    pub fn resolve_action(
        &mut self,
        starting: &Rc<Context>,
        action: Action,
    ) -> Result<Option<Rc<Context>>> {
        if !self.active.iter().any(|c| Rc::ptr_eq(c, starting)) {
            return Err(err(
                Kind::Other,
                "resolve_action: starting context is not active",
            ));
        }

        self.memoizer.remember(starting, action.clone());

        let mut txn = self.store.begin_transaction();
        let result = loom_actions::apply(&action, &mut txn, starting)
            .and_then(|outcome| drain_automation(&mut txn, &self.automators, &self.config, outcome, &self.pending));

        match result {
            Ok((successor, holding)) => {
                txn.commit(&mut self.store);
                self.active.retain(|c| !Rc::ptr_eq(c, starting));
                self.pending = holding;
                let successor = successor.map(|ctx| {
                    let rc = Rc::new(ctx);
                    self.active.push(Rc::clone(&rc));
                    rc
                });
                info!(
                    target: "loom",
                    active = self.active.len(),
                    pending = self.pending.len(),
                    "resolve_action committed"
                );
                Ok(successor)
            }
            Err(e) => {
                txn.discard();
                self.memoizer.forget(starting);
                warn!(target: "loom", error = %e, "resolve_action aborted");
                Err(e)
            }
        }
    }

    /// Selects a pending context whose promise-advancement predicate holds
    /// for `promise`, moving it to active. First FIFO match; a weakly fair
    /// instance of "any context that can advance it" (SPEC_FULL.md §4.4).
    pub fn choose_context_to_advance_promise(&mut self, promise: Address) -> Option<Rc<Context>> {
        let position = self
            .pending
            .iter()
            .position(|ctx| ctx.can_advance_promise(&self.store, promise))?;
        let ctx = self.pending.remove(position)?;
        self.active.push(Rc::clone(&ctx));
        info!(target: "loom", workspace = %ctx.workspace(), "chosen to advance promise");
        Some(ctx)
    }

    /// Moves an active context back to pending.
    pub fn relinquish_context(&mut self, ctx: &Rc<Context>) -> bool {
        let Some(position) = self.active.iter().position(|c| Rc::ptr_eq(c, ctx)) else {
            return false;
        };
        let ctx = self.active.remove(position);
        self.pending.push_back(ctx);
        true
    }
}

fn drain_automation(
    txn: &mut Transaction<'_, DryContext>,
    automators: &[Rc<dyn Automator>],
    config: &Config,
    outcome: Outcome,
    pending: &VecDeque<Rc<Context>>,
) -> Result<(Option<Context>, VecDeque<Rc<Context>>)> {
    let mut queue: VecDeque<Rc<Context>> = outcome.spawned.into_iter().map(Rc::new).collect();
    queue.extend(pending.iter().cloned());

    let mut holding = VecDeque::new();
    let mut steps = 0usize;

    while let Some(ctx) = queue.pop_front() {
        let Some(automator) = automators.iter().find(|a| a.can_handle(&ctx)) else {
            holding.push_back(ctx);
            continue;
        };

        if let Some(max) = config.max_automation_steps {
            if steps >= max {
                return Err(err(
                    Kind::AutomationCeilingExceeded,
                    "automation step ceiling exceeded",
                ));
            }
        }
        steps += 1;

        let action = automator.handle(&ctx);
        debug!(target: "loom", workspace = %ctx.workspace(), ?action, "automation step");
        let applied = loom_actions::apply(&action, txn, &ctx)?;

        for new_ctx in applied.spawned.into_iter().chain(applied.successor) {
            if new_ctx.is_own_ancestor(txn) {
                return Err(err(
                    Kind::Cycle,
                    "automation produced a context that is its own ancestor",
                ));
            }
            queue.push_back(Rc::new(new_ctx));
        }
    }

    Ok((outcome.successor, holding))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use test_log::test;

    #[test]
    fn ask_root_builds_an_active_context() {
        let mut scheduler = Scheduler::new(Config::default());
        let root = scheduler.ask_root("2 + 2?").unwrap();
        assert!(root.display().contains("2 + 2?"));
        assert_eq!(scheduler.active().len(), 1);
    }

    #[test]
    fn resolve_action_rejects_an_inactive_context() {
        let mut scheduler = Scheduler::new(Config::default());
        let root = scheduler.ask_root("q?").unwrap();
        scheduler.relinquish_context(&root);
        assert!(scheduler
            .resolve_action(&root, Action::Scratch("note".into()))
            .is_err());
    }

    #[test]
    fn scratch_replaces_the_active_context() {
        let mut scheduler = Scheduler::new(Config::default());
        let root = scheduler.ask_root("q?").unwrap();
        let successor = scheduler
            .resolve_action(&root, Action::Scratch("thinking".into()))
            .unwrap();
        let successor = successor.unwrap();
        assert!(successor.display().contains("thinking"));
        assert_eq!(scheduler.active().len(), 1);
        assert!(Rc::ptr_eq(&scheduler.active()[0], &successor));
    }

    #[test]
    fn ask_subquestion_adds_a_pending_context() {
        let mut scheduler = Scheduler::new(Config::default());
        let root = scheduler.ask_root("root?").unwrap();
        let successor = scheduler
            .resolve_action(&root, Action::AskSubquestion("sub?".into()))
            .unwrap()
            .unwrap();
        assert!(successor.display().contains("$q1"));
        assert_eq!(scheduler.pending().len(), 1);
        assert!(scheduler.pending()[0].display().contains("sub?"));
    }

    #[test]
    fn choose_context_to_advance_promise_promotes_a_pending_context() {
        let mut scheduler = Scheduler::new(Config::default());
        let root = scheduler.ask_root("root?").unwrap();
        let successor = scheduler
            .resolve_action(&root, Action::AskSubquestion("sub?".into()))
            .unwrap()
            .unwrap();
        let promise = successor.naming().address_of("a1").unwrap();

        let chosen = scheduler.choose_context_to_advance_promise(promise);
        assert_matches!(chosen, Some(_));
        assert!(scheduler.pending().is_empty());
        assert_eq!(scheduler.active().len(), 2);
    }
}
