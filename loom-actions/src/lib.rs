mod parsing;

use std::rc::Rc;

use loom_base::{err, Kind, Result};
use loom_context::{Context, DryContext, Naming};
use loom_hypertext::{Address, Node, Subquestion, WorkspaceNode};
use loom_store::Transaction;
use tracing::debug;

use parsing::{parse_and_insert, parse_to_node};

/// Inserts `text` with no naming in scope: `$name` references always
/// fail. Used to seed a session's root question, which by construction
/// cannot point at anything yet.
pub fn insert_plain_text<P>(transaction: &mut Transaction<'_, P>, text: &str) -> Result<Address> {
    parse_and_insert(transaction, &Naming::empty(), text)
}

/// One of the five operator-visible transformations. Each is applied to
/// a context inside an open transaction and produces an optional
/// successor context (the same logical line of work, evolved) plus zero
/// or more spawned contexts (new lines of work, or promisees hydrated by
/// this action).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    Scratch(String),
    AskSubquestion(String),
    Reply(String),
    Unlock(String),
}

/// The result of applying an [`Action`]: an optional successor
/// (supersedes the acting context in place) and any newly spawned
/// contexts (new lines of work, or hydrated promisees).
pub struct Outcome {
    pub successor: Option<Context>,
    pub spawned: Vec<Context>,
}

/// Applies `action` to `ctx` inside `transaction`. Mutates only the
/// transaction's overlay; never touches the base store.
pub fn apply(
    action: &Action,
    transaction: &mut Transaction<'_, DryContext>,
    ctx: &Rc<Context>,
) -> Result<Outcome> {
    match action {
        Action::Scratch(text) => scratch(text, transaction, ctx),
        Action::AskSubquestion(text) => ask_subquestion(text, transaction, ctx),
        Action::Reply(text) => reply(text, transaction, ctx),
        Action::Unlock(name) => unlock(name, transaction, ctx),
    }
}

fn current_workspace(
    transaction: &Transaction<'_, DryContext>,
    ctx: &Context,
) -> Result<WorkspaceNode> {
    transaction
        .dereference(ctx.workspace())?
        .as_workspace()
        .cloned()
        .ok_or_else(|| {
            err(
                Kind::InvalidPointer,
                format!("{} is not a workspace", ctx.workspace()),
            )
        })
}

fn scratch(
    text: &str,
    transaction: &mut Transaction<'_, DryContext>,
    ctx: &Rc<Context>,
) -> Result<Outcome> {
    debug!(target: "loom", workspace = %ctx.workspace(), "scratch");
    let new_scratch = parse_and_insert(transaction, ctx.naming(), text)?;

    let mut ws = current_workspace(transaction, ctx)?;
    ws.scratchpad = new_scratch;
    let new_workspace = transaction.insert(Node::Workspace(ws));

    let mut unlocked = ctx.unlocked().clone();
    unlocked.remove(&ctx.workspace());
    unlocked.insert(new_workspace);
    unlocked.insert(new_scratch);

    let successor = Context::from_dry(
        DryContext {
            workspace: ctx.workspace(),
            unlocked,
            parent: ctx.parent().cloned(),
        },
        new_workspace,
        transaction,
    )?;

    Ok(Outcome {
        successor: Some(successor),
        spawned: Vec::new(),
    })
}

fn ask_subquestion(
    text: &str,
    transaction: &mut Transaction<'_, DryContext>,
    ctx: &Rc<Context>,
) -> Result<Outcome> {
    debug!(target: "loom", workspace = %ctx.workspace(), "ask_subquestion");
    let question = parse_and_insert(transaction, ctx.naming(), text)?;
    let answer_promise = transaction.make_promise();
    let final_workspace_promise = transaction.make_promise();
    let sub_scratchpad = transaction.insert(Node::Raw(Default::default()));
    let sub_workspace = transaction.insert(Node::Workspace(WorkspaceNode {
        question,
        answer_promise,
        final_workspace_promise,
        scratchpad: sub_scratchpad,
        subquestions: Vec::new(),
        predecessor: None,
    }));

    let mut ws = current_workspace(transaction, ctx)?;
    ws.subquestions.push(Subquestion {
        question,
        answer_promise,
        final_workspace_promise,
    });
    let new_workspace = transaction.insert(Node::Workspace(ws));

    let mut unlocked = ctx.unlocked().clone();
    unlocked.remove(&ctx.workspace());
    unlocked.insert(new_workspace);
    unlocked.insert(question);

    let successor = Context::from_dry(
        DryContext {
            workspace: ctx.workspace(),
            unlocked,
            parent: ctx.parent().cloned(),
        },
        new_workspace,
        transaction,
    )?;

    let spawned = Context::new(transaction, sub_workspace, None, Some(Rc::clone(ctx)))?;

    Ok(Outcome {
        successor: Some(successor),
        spawned: vec![spawned],
    })
}

fn reply(
    text: &str,
    transaction: &mut Transaction<'_, DryContext>,
    ctx: &Rc<Context>,
) -> Result<Outcome> {
    debug!(target: "loom", workspace = %ctx.workspace(), "reply");
    let mut spawned = Vec::new();

    if !transaction.is_fulfilled(ctx.answer_promise()) {
        let node = parse_to_node(transaction, ctx.naming(), text)?;
        let delivered = transaction.resolve_promise(ctx.answer_promise(), node)?;
        hydrate_all(delivered, transaction, &mut spawned)?;
    }

    if !transaction.is_fulfilled(ctx.final_workspace_promise()) {
        let node = transaction.dereference(ctx.workspace())?.clone();
        let delivered = transaction.resolve_promise(ctx.final_workspace_promise(), node)?;
        hydrate_all(delivered, transaction, &mut spawned)?;
    }

    Ok(Outcome {
        successor: None,
        spawned,
    })
}

fn hydrate_all(
    delivered: Vec<DryContext>,
    transaction: &Transaction<'_, DryContext>,
    spawned: &mut Vec<Context>,
) -> Result<()> {
    for dry in delivered {
        let workspace = dry.workspace;
        spawned.push(Context::from_dry(dry, workspace, transaction)?);
    }
    Ok(())
}

fn unlock(
    name: &str,
    transaction: &mut Transaction<'_, DryContext>,
    ctx: &Rc<Context>,
) -> Result<Outcome> {
    debug!(target: "loom", workspace = %ctx.workspace(), name, "unlock");
    let target = ctx
        .naming()
        .address_of(name)
        .ok_or_else(|| err(Kind::InvalidPointer, format!("unknown pointer '${name}'")))?;

    if ctx.unlocked().contains(&target) {
        return Err(err(
            Kind::AlreadyUnlocked,
            format!("'${name}' is already unlocked"),
        ));
    }

    let mut unlocked = ctx.unlocked().clone();
    unlocked.insert(target);

    if transaction.is_fulfilled(target) {
        let spawned = Context::new(transaction, ctx.workspace(), Some(unlocked), Some(Rc::clone(ctx)))?;
        Ok(Outcome {
            successor: None,
            spawned: vec![spawned],
        })
    } else {
        transaction.register_promisee(
            target,
            DryContext {
                workspace: ctx.workspace(),
                unlocked,
                parent: Some(Rc::clone(ctx)),
            },
        )?;
        Ok(Outcome {
            successor: None,
            spawned: Vec::new(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use loom_hypertext::{Address, RawNode};
    use loom_store::Store;
    use test_log::test;

    fn fresh_root(store: &mut Store<DryContext>, question_text: &str) -> Rc<Context> {
        let question = store.insert(Node::Raw(RawNode::new(vec![loom_hypertext::Fragment::Literal(
            question_text.to_string(),
        )])));
        let scratchpad = store.insert(Node::Raw(Default::default()));
        let answer_promise = store.make_promise();
        let final_workspace_promise = store.make_promise();
        let workspace = store.insert(Node::Workspace(WorkspaceNode {
            question,
            answer_promise,
            final_workspace_promise,
            scratchpad,
            subquestions: Vec::new(),
            predecessor: None,
        }));
        Rc::new(Context::new(store, workspace, None, None).unwrap())
    }

    #[test]
    fn scratch_replaces_scratchpad_and_keeps_promises() {
        let mut store: Store<DryContext> = Store::new();
        let root = fresh_root(&mut store, "2+2?");

        let mut txn = store.begin_transaction();
        let outcome = apply(&Action::Scratch("working it out".into()), &mut txn, &root).unwrap();
        txn.commit(&mut store);

        let successor = outcome.successor.unwrap();
        assert!(successor.display().contains("working it out"));
        assert_eq!(successor.answer_promise(), root.answer_promise());
    }

    #[test]
    fn ask_subquestion_spawns_a_context_and_updates_parent() {
        let mut store: Store<DryContext> = Store::new();
        let root = fresh_root(&mut store, "big question?");

        let mut txn = store.begin_transaction();
        let outcome =
            apply(&Action::AskSubquestion("sub question?".into()), &mut txn, &root).unwrap();
        txn.commit(&mut store);

        assert_eq!(outcome.spawned.len(), 1);
        assert!(outcome.spawned[0].display().contains("sub question?"));
        let successor = outcome.successor.unwrap();
        assert!(successor.display().contains("$q1"));
    }

    #[test]
    fn reply_resolves_answer_and_final_workspace_promises() {
        let mut store: Store<DryContext> = Store::new();
        let root = fresh_root(&mut store, "what is the answer?");

        let mut txn = store.begin_transaction();
        let outcome = apply(&Action::Reply("42".into()), &mut txn, &root).unwrap();
        txn.commit(&mut store);

        assert!(outcome.spawned.is_empty());
        assert!(store.is_fulfilled(root.answer_promise()));
        assert!(store.is_fulfilled(root.final_workspace_promise()));
    }

    #[test]
    fn unlock_of_unknown_name_fails() {
        let mut store: Store<DryContext> = Store::new();
        let root = fresh_root(&mut store, "q?");
        let mut txn = store.begin_transaction();
        assert!(apply(&Action::Unlock("99".into()), &mut txn, &root).is_err());
    }

    #[test]
    fn unlock_of_already_unlocked_fails() {
        let mut store: Store<DryContext> = Store::new();
        let root = fresh_root(&mut store, "q?");
        let name = root
            .unlocked()
            .iter()
            .find_map(|&addr| root.naming().name_of(addr).map(str::to_string))
            .expect("at least one unlocked address should be named");
        let mut txn = store.begin_transaction();
        assert!(apply(&Action::Unlock(name), &mut txn, &root).is_err());
    }

    #[test]
    fn unlock_of_pending_promise_registers_a_promisee() {
        let mut store: Store<DryContext> = Store::new();
        let root = fresh_root(&mut store, "q?");

        let mut txn = store.begin_transaction();
        let ask = apply(&Action::AskSubquestion("sub?".into()), &mut txn, &root).unwrap();
        txn.commit(&mut store);
        let successor = Rc::new(ask.successor.unwrap());

        let name = successor.naming().name_of(successor_answer_promise_addr(&successor)).unwrap().to_string();

        let mut txn = store.begin_transaction();
        let outcome = apply(&Action::Unlock(name), &mut txn, &successor).unwrap();
        txn.commit(&mut store);
        assert!(outcome.spawned.is_empty());
        assert!(outcome.successor.is_none());
    }

    fn successor_answer_promise_addr(ctx: &Context) -> Address {
        // The lone subquestion's answer promise is named "$a1".
        ctx.naming().address_of("a1").unwrap()
    }
}
