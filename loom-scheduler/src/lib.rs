mod automator;
mod memoizer;
mod scheduler;
mod session;

pub use automator::Automator;
pub use memoizer::Memoizer;
pub use scheduler::Scheduler;
pub use session::{Progress, RootQuestionSession};
