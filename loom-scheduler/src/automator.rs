use loom_actions::Action;
use loom_context::Context;

/// A strategy that can select an action for a context without user input.
/// The memoizer is the only automator this crate ships; adding a
/// deterministic evaluator (arithmetic, a lookup table) means implementing
/// this trait, not touching the scheduler.
pub trait Automator {
    fn can_handle(&self, ctx: &Context) -> bool;
    fn handle(&self, ctx: &Context) -> Action;
}
