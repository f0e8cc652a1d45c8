use loom_base::{err, Kind, Result};
use loom_context::Naming;
use loom_hypertext::{Address, Fragment, Node, RawNode};
use loom_parse::ParsedFragment;
use loom_store::Transaction;

/// Parses `text` against `naming` and turns it into a [`Node`], without
/// inserting the top-level node into the store — the caller decides
/// whether that node becomes a fresh address (`transaction.insert`) or
/// the content of a promise being resolved (`transaction.resolve_promise`).
/// Nested bracketed hypertext is always inserted as its own address: only
/// the top level is left for the caller.
pub(crate) fn parse_to_node<P>(
    transaction: &mut Transaction<'_, P>,
    naming: &Naming,
    text: &str,
) -> Result<Node> {
    let fragments = loom_parse::parse(text)?;
    let chunks = fragments_to_chunks(transaction, naming, fragments)?;
    Ok(Node::Raw(RawNode::new(chunks)))
}

/// Like [`parse_to_node`] but also inserts the result, returning its
/// address.
pub(crate) fn parse_and_insert<P>(
    transaction: &mut Transaction<'_, P>,
    naming: &Naming,
    text: &str,
) -> Result<Address> {
    let node = parse_to_node(transaction, naming, text)?;
    Ok(transaction.insert(node))
}

fn fragments_to_chunks<P>(
    transaction: &mut Transaction<'_, P>,
    naming: &Naming,
    fragments: Vec<ParsedFragment>,
) -> Result<Vec<Fragment>> {
    fragments
        .into_iter()
        .map(|fragment| match fragment {
            ParsedFragment::Literal(text) => Ok(Fragment::Literal(text)),
            ParsedFragment::Name(name) => naming.address_of(&name).map(Fragment::Ref).ok_or_else(|| {
                err(Kind::InvalidPointer, format!("unknown pointer '${name}'"))
            }),
            ParsedFragment::Nested(inner) => {
                let chunks = fragments_to_chunks(transaction, naming, inner)?;
                Ok(Fragment::Ref(transaction.insert(Node::Raw(RawNode::new(chunks)))))
            }
        })
        .collect()
}
