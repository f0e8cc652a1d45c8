use std::collections::HashMap;

use loom_base::{err, Kind, Result};
use loom_hypertext::{Address, Fragment, Node};
use loom_store::Resolve;

/// Flattens a fully-resolved hypertext address into plain text, inlining
/// every reference. Used for a session's final answer, where nothing is
/// locked any more and pointer names are no longer meaningful.
pub fn render_resolved<R: Resolve>(resolver: &R, root: Address) -> Result<String> {
    let mut memo = HashMap::new();
    render_node(resolver, root, &mut memo)
}

fn render_node<R: Resolve>(
    resolver: &R,
    addr: Address,
    memo: &mut HashMap<Address, String>,
) -> Result<String> {
    if let Some(cached) = memo.get(&addr) {
        return Ok(cached.clone());
    }
    let node = resolver.dereference(addr)?;
    let raw = node.as_raw().ok_or_else(|| {
        err(
            Kind::Other,
            format!("{addr} is a workspace, not renderable as plain text"),
        )
    })?;
    let mut out = String::new();
    for chunk in &raw.chunks {
        match chunk {
            Fragment::Literal(text) => out.push_str(text),
            Fragment::Ref(child) => out.push_str(&render_node(resolver, *child, memo)?),
        }
    }
    memo.insert(addr, out.clone());
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use loom_hypertext::RawNode;
    use loom_store::Store;
    use test_log::test;

    #[test]
    fn inlines_nested_references() {
        let mut store: Store<()> = Store::new();
        let inner = store.insert(Node::Raw(RawNode::new(vec![Fragment::Literal(
            "world".into(),
        )])));
        let outer = store.insert(Node::Raw(RawNode::new(vec![
            Fragment::Literal("hello ".into()),
            Fragment::Ref(inner),
        ])));
        assert_eq!(render_resolved(&store, outer).unwrap(), "hello world");
    }
}
