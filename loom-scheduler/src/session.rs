use std::collections::HashSet;
use std::rc::Rc;

use loom_actions::Action;
use loom_base::{err, Config, Kind, Result};
use loom_context::{render_resolved, Context, DryContext};
use loom_hypertext::Address;
use loom_store::Store;
use tracing::info;

use crate::scheduler::Scheduler;

/// What happened after an action was resolved against a root-question
/// session: either the session is still going (with the context the
/// caller should act on next), or the root answer's promise tree is fully
/// fulfilled and the final text is ready.
pub enum Progress {
    Active(Rc<Context>),
    Complete(String),
}

/// Owns a root answer promise and a [`Scheduler`]. After each action,
/// checks whether every promise reachable from the root answer is
/// fulfilled; if not and the action produced no successor, asks the
/// scheduler for a pending context that can advance one of them.
/// SPEC_FULL.md §4.4, §6.4.
pub struct RootQuestionSession {
    scheduler: Scheduler,
    root_answer_promise: Address,
}

impl RootQuestionSession {
    pub fn ask(question_text: &str, config: Config) -> Result<(RootQuestionSession, Rc<Context>)> {
        let mut scheduler = Scheduler::new(config);
        let root = scheduler.ask_root(question_text)?;
        let root_answer_promise = root.answer_promise();
        info!(target: "loom", %root_answer_promise, "session started");
        Ok((
            RootQuestionSession {
                scheduler,
                root_answer_promise,
            },
            root,
        ))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Resolves `action` against `starting`, then decides what the caller
    /// should act on next.
    pub fn act(&mut self, starting: &Rc<Context>, action: Action) -> Result<Progress> {
        let successor = self.scheduler.resolve_action(starting, action)?;

        if let Some(answer) = self.format_root_answer() {
            return Ok(Progress::Complete(answer));
        }

        if let Some(ctx) = successor {
            return Ok(Progress::Active(ctx));
        }

        match first_unfulfilled_reachable(self.scheduler.store(), self.root_answer_promise) {
            Some(promise) => self
                .scheduler
                .choose_context_to_advance_promise(promise)
                .map(Progress::Active)
                .ok_or_else(|| {
                    err(
                        Kind::SchedulerStarvation,
                        "no pending context can advance a still-needed promise",
                    )
                }),
            None => Err(err(
                Kind::SchedulerStarvation,
                "root answer incomplete but no unfulfilled promise is reachable",
            )),
        }
    }

    /// `Some(answer)` once every promise reachable from the root answer is
    /// fulfilled; the answer contains no `$`-prefixed pointer names.
    pub fn format_root_answer(&self) -> Option<String> {
        if first_unfulfilled_reachable(self.scheduler.store(), self.root_answer_promise).is_some() {
            return None;
        }
        render_resolved(self.scheduler.store(), self.root_answer_promise).ok()
    }
}

fn first_unfulfilled_reachable(store: &Store<DryContext>, root: Address) -> Option<Address> {
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(addr) = stack.pop() {
        if !seen.insert(addr) {
            continue;
        }
        if !store.is_fulfilled(addr) {
            return Some(addr);
        }
        let canonical = store.canonicalize(addr);
        match store.dereference(canonical) {
            Ok(node) => stack.extend(node.links()),
            Err(_) => return Some(addr),
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn completes_when_replied_directly() {
        let (mut session, root) = RootQuestionSession::ask("2 + 2?", Config::default()).unwrap();
        let progress = session.act(&root, Action::Reply("4".into())).unwrap();
        match progress {
            Progress::Complete(answer) => assert_eq!(answer, "4"),
            Progress::Active(_) => panic!("expected completion"),
        }
    }

    #[test]
    fn stays_active_when_answer_references_a_locked_subquestion() {
        let (mut session, root) = RootQuestionSession::ask("root?", Config::default()).unwrap();
        let progress = session
            .act(&root, Action::AskSubquestion("sub?".into()))
            .unwrap();
        let successor = match progress {
            Progress::Active(ctx) => ctx,
            Progress::Complete(_) => panic!("should not be complete yet"),
        };

        let progress = session.act(&successor, Action::Reply("$a1".into())).unwrap();
        assert!(matches!(progress, Progress::Active(_)));
        assert!(session.format_root_answer().is_none());
    }
}
