use std::collections::HashSet;
use std::fmt::Write as _;

use crate::Address;

/// One piece of a [`RawNode`]: either literal text or a reference to
/// another slot in the Store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Fragment {
    Literal(String),
    Ref(Address),
}

/// An ordered sequence of fragments. SPEC_FULL.md §3: "Raw".
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct RawNode {
    pub chunks: Vec<Fragment>,
}

impl RawNode {
    pub fn new(chunks: Vec<Fragment>) -> Self {
        RawNode { chunks }
    }

    /// The deduplicated sequence of referenced addresses in
    /// first-occurrence order.
    pub fn links(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for chunk in &self.chunks {
            if let Fragment::Ref(addr) = chunk {
                if seen.insert(*addr) {
                    result.push(*addr);
                }
            }
        }
        result
    }
}

/// The triple `(question, answer_promise, final_workspace_promise)`
/// embedded in a parent workspace for each of its subquestions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Subquestion {
    pub question: Address,
    pub answer_promise: Address,
    pub final_workspace_promise: Address,
}

/// An immutable record of a question, two self-referencing promises, a
/// scratchpad, subquestions, and an optional predecessor.
/// SPEC_FULL.md §3: "Workspace".
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkspaceNode {
    pub question: Address,
    pub answer_promise: Address,
    pub final_workspace_promise: Address,
    pub scratchpad: Address,
    pub subquestions: Vec<Subquestion>,
    pub predecessor: Option<Address>,
}

impl WorkspaceNode {
    /// `[predecessor?]`, `question`, `scratchpad`, then for each
    /// subquestion in order `(q, a, w)`. The two promises owned by this
    /// workspace are deliberately excluded: including them would let a
    /// later-resolved promise's graph point back at this workspace and
    /// create a cycle (SPEC_FULL.md §3).
    pub fn links(&self) -> Vec<Address> {
        let mut result = Vec::with_capacity(2 + self.subquestions.len() * 3);
        if let Some(pred) = self.predecessor {
            result.push(pred);
        }
        result.push(self.question);
        result.push(self.scratchpad);
        for sq in &self.subquestions {
            result.push(sq.question);
            result.push(sq.answer_promise);
            result.push(sq.final_workspace_promise);
        }
        result
    }
}

/// A Store-resident node: either raw hypertext or a workspace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
    Raw(RawNode),
    Workspace(WorkspaceNode),
}

impl Node {
    pub fn links(&self) -> Vec<Address> {
        match self {
            Node::Raw(r) => r.links(),
            Node::Workspace(w) => w.links(),
        }
    }

    pub fn as_raw(&self) -> Option<&RawNode> {
        match self {
            Node::Raw(r) => Some(r),
            Node::Workspace(_) => None,
        }
    }

    pub fn as_workspace(&self) -> Option<&WorkspaceNode> {
        match self {
            Node::Workspace(w) => Some(w),
            Node::Raw(_) => None,
        }
    }

    /// A deterministic rendering used only for the Store's own
    /// literal-content-equality dedup (SPEC_FULL.md §3's "Content-key
    /// rendering" note). Every referenced Address renders as its own
    /// stable `@<id>` form; this is intentionally unrelated to the
    /// position-relative placeholder rendering a Context uses for its
    /// display (that one lives in `loom-context`, over there for good
    /// reason: it needs a unlocked/locked distinction this crate doesn't
    /// know about).
    pub fn canonical_key(&self) -> String {
        let mut key = String::new();
        match self {
            Node::Raw(r) => {
                key.push_str("raw:");
                for chunk in &r.chunks {
                    match chunk {
                        Fragment::Literal(text) => {
                            key.push('"');
                            for ch in text.chars() {
                                if ch == '"' || ch == '\\' {
                                    key.push('\\');
                                }
                                key.push(ch);
                            }
                            key.push('"');
                        }
                        Fragment::Ref(addr) => {
                            let _ = write!(key, "{addr}");
                        }
                    }
                }
            }
            Node::Workspace(w) => {
                key.push_str("workspace:");
                if let Some(pred) = w.predecessor {
                    let _ = write!(key, "pred={pred};");
                }
                let _ = write!(
                    key,
                    "q={};ap={};fwp={};sp={};subs=[",
                    w.question, w.answer_promise, w.final_workspace_promise, w.scratchpad
                );
                for sq in &w.subquestions {
                    let _ = write!(
                        key,
                        "({},{},{})",
                        sq.question, sq.answer_promise, sq.final_workspace_promise
                    );
                }
                key.push(']');
            }
        }
        key
    }
}
