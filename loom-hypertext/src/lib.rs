mod address;
mod node;

pub use address::Address;
pub use node::{Fragment, Node, RawNode, Subquestion, WorkspaceNode};
