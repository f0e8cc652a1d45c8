use std::collections::{HashSet, VecDeque};

use loom_base::Result;
use loom_hypertext::Address;
use loom_store::Resolve;

/// One page visited by [`walk_unlocked_region`]: a target address whose
/// *template* counterpart was in the unlocked set, together with the
/// target node's own `links()` in order.
pub(crate) struct VisitedPage {
    pub target: Address,
    pub target_links: Vec<Address>,
}

/// Walks `(template, target)` in lockstep breadth-first starting at the
/// given roots. A pair is expanded only when the template address is in
/// `unlocked`; expanding means reading both nodes' `links()` and zipping
/// them into child pairs for the queue. Every expanded pair's target
/// address and ordered children are recorded as a [`VisitedPage`],
/// regardless of whether the children themselves turn out to be
/// expandable.
///
/// For a freshly-constructed context (not re-seated onto a later
/// workspace), `template_resolver`/`template_root` and
/// `target_resolver`/`target_root` are the same store and address.
pub(crate) fn walk_unlocked_region<R: Resolve>(
    template_resolver: &R,
    target_resolver: &R,
    template_root: Address,
    target_root: Address,
    unlocked: &HashSet<Address>,
) -> Result<Vec<VisitedPage>> {
    let mut seen_pairs = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back((template_root, target_root));

    let mut pages = Vec::new();
    while let Some((template_addr, target_addr)) = queue.pop_front() {
        if !unlocked.contains(&template_addr) {
            continue;
        }
        if !seen_pairs.insert((template_addr, target_addr)) {
            continue;
        }

        let template_node = template_resolver.dereference(template_addr)?;
        let target_node = target_resolver.dereference(target_addr)?;
        let template_links = template_node.links();
        let target_links = target_node.links();

        for (template_child, target_child) in
            template_links.into_iter().zip(target_links.iter().copied())
        {
            queue.push_back((template_child, target_child));
        }

        pages.push(VisitedPage {
            target: target_addr,
            target_links,
        });
    }

    Ok(pages)
}
