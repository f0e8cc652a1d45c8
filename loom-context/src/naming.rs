use std::collections::{HashMap, HashSet};

use loom_base::{err, Kind, Result};
use loom_hypertext::Address;
use loom_store::Resolve;

use crate::walk::walk_unlocked_region;

/// A deterministic assignment of short names (`"q1"`, `"a1"`, `"w1"`,
/// `"1"`, `"2"`, ...) to every address reachable from a context's
/// unlocked region, fixed at construction time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Naming {
    names: HashMap<Address, String>,
    by_name: HashMap<String, Address>,
    /// Target addresses whose template counterpart was unlocked: these
    /// are rendered inline with their content; everything else named but
    /// not in this set is rendered as a bare pointer.
    pub(crate) expanded: HashSet<Address>,
}

impl Naming {
    /// A naming with no assignments: used to parse text that cannot
    /// reference any pointer, e.g. a session's root question.
    pub fn empty() -> Naming {
        Naming {
            names: HashMap::new(),
            by_name: HashMap::new(),
            expanded: HashSet::new(),
        }
    }

    pub fn name_of(&self, addr: Address) -> Option<&str> {
        self.names.get(&addr).map(String::as_str)
    }

    pub fn is_expanded(&self, addr: Address) -> bool {
        self.expanded.contains(&addr)
    }

    /// Reverse lookup used by Actions to resolve a parsed `$name` back
    /// into the address it names in this context.
    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.by_name.get(name).copied()
    }

    /// Builds a naming for a freshly-constructed context: template and
    /// target are the same workspace.
    pub fn build<R: Resolve>(
        resolver: &R,
        workspace: Address,
        unlocked: &HashSet<Address>,
    ) -> Result<Naming> {
        Naming::build_reseated(resolver, resolver, workspace, workspace, unlocked)
    }

    /// Builds a naming for a context re-seated from `template_root` (the
    /// workspace its unlocked set was originally expressed against) onto
    /// `target_root` (a structurally isomorphic, possibly later,
    /// workspace).
    pub fn build_reseated<R: Resolve>(
        template_resolver: &R,
        target_resolver: &R,
        template_root: Address,
        target_root: Address,
        unlocked: &HashSet<Address>,
    ) -> Result<Naming> {
        let mut names = HashMap::new();

        let target_node = target_resolver.dereference(target_root)?;
        let workspace = target_node.as_workspace().ok_or_else(|| {
            err(
                Kind::InvalidPointer,
                format!("{target_root} is not a workspace"),
            )
        })?;

        for (zero_based, sq) in workspace.subquestions.iter().enumerate().rev() {
            let i = zero_based + 1;
            names.entry(sq.question).or_insert_with(|| format!("q{i}"));
            names
                .entry(sq.answer_promise)
                .or_insert_with(|| format!("a{i}"));
            names
                .entry(sq.final_workspace_promise)
                .or_insert_with(|| format!("w{i}"));
        }

        let pages = walk_unlocked_region(
            template_resolver,
            target_resolver,
            template_root,
            target_root,
            unlocked,
        )?;

        let mut next_numeric = 1u64;
        for page in &pages {
            for &child in &page.target_links {
                names.entry(child).or_insert_with(|| {
                    let name = next_numeric.to_string();
                    next_numeric += 1;
                    name
                });
            }
        }

        let expanded = pages.iter().map(|page| page.target).collect();
        let by_name = names.iter().map(|(addr, name)| (name.clone(), *addr)).collect();
        Ok(Naming {
            names,
            by_name,
            expanded,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use loom_hypertext::{Fragment, Node, RawNode, Subquestion, WorkspaceNode};
    use loom_store::Store;
    use test_log::test;

    #[test]
    fn assigns_subquestion_triples_and_numeric_names() {
        let mut store: Store<()> = Store::new();
        let question = store.insert(Node::Raw(RawNode::new(vec![Fragment::Literal(
            "root?".into(),
        )])));
        let scratch = store.insert(Node::Raw(RawNode::new(vec![])));
        let sub_question = store.insert(Node::Raw(RawNode::new(vec![Fragment::Literal(
            "sub?".into(),
        )])));
        let answer_promise = store.make_promise();
        let final_workspace_promise = store.make_promise();
        let answer_promise_own = store.make_promise();
        let final_workspace_promise_own = store.make_promise();

        let workspace = store.insert(Node::Workspace(WorkspaceNode {
            question,
            answer_promise: answer_promise_own,
            final_workspace_promise: final_workspace_promise_own,
            scratchpad: scratch,
            subquestions: vec![Subquestion {
                question: sub_question,
                answer_promise,
                final_workspace_promise,
            }],
            predecessor: None,
        }));

        let mut unlocked = HashSet::new();
        unlocked.insert(workspace);
        unlocked.insert(question);
        unlocked.insert(scratch);
        unlocked.insert(sub_question);

        let naming = Naming::build(&store, workspace, &unlocked).unwrap();
        assert_eq!(naming.name_of(sub_question), Some("q1"));
        assert_eq!(naming.name_of(answer_promise), Some("a1"));
        assert_eq!(naming.name_of(final_workspace_promise), Some("w1"));
        assert!(naming.is_expanded(question));
        assert!(naming.is_expanded(scratch));
    }
}
