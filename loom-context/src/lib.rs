mod context;
mod naming;
mod render;
mod walk;

pub use context::{Context, DryContext};
pub use naming::Naming;
pub use render::render_resolved;
