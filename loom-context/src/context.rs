use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use loom_base::{err, Kind, Result};
use loom_hypertext::{Address, Fragment, Node, WorkspaceNode};
use loom_store::{Resolve, Store};

use crate::naming::Naming;

/// The minimal bundle the store needs to later materialize a full
/// [`Context`]: a workspace address to dereference, the unlocked set
/// (expressed against that workspace), and the parent context that
/// produced it. Registered as a promisee wherever a context suspends on
/// a promise; hydrated into a real `Context` once that promise resolves
/// (see `Context::from_dry`).
#[derive(Clone)]
pub struct DryContext {
    pub workspace: Address,
    pub unlocked: HashSet<Address>,
    pub parent: Option<Rc<Context>>,
}

/// A context: a workspace viewed through an unlocked set, with a parent
/// back-pointer. Its local pointer naming and canonical display are
/// derived once at construction and used for equality and hashing —
/// two contexts with the same printed form are the same context.
pub struct Context {
    workspace: Address,
    unlocked: HashSet<Address>,
    answer_promise: Address,
    final_workspace_promise: Address,
    naming: Naming,
    display: String,
    parent: Option<Rc<Context>>,
}

impl Context {
    pub fn workspace(&self) -> Address {
        self.workspace
    }

    pub fn unlocked(&self) -> &HashSet<Address> {
        &self.unlocked
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    pub fn parent(&self) -> Option<&Rc<Context>> {
        self.parent.as_ref()
    }

    pub fn answer_promise(&self) -> Address {
        self.answer_promise
    }

    pub fn final_workspace_promise(&self) -> Address {
        self.final_workspace_promise
    }

    pub fn to_dry(&self) -> DryContext {
        DryContext {
            workspace: self.workspace,
            unlocked: self.unlocked.clone(),
            parent: self.parent.clone(),
        }
    }

    /// Builds a context fresh against `workspace`, defaulting the
    /// unlocked set when `unlocked` is `None` (the workspace itself, its
    /// question, its scratchpad, each subquestion's question, and its
    /// predecessor if any — answer and final-workspace promises are not
    /// unlocked by default).
    pub fn new<R: Resolve>(
        resolver: &R,
        workspace: Address,
        unlocked: Option<HashSet<Address>>,
        parent: Option<Rc<Context>>,
    ) -> Result<Context> {
        let unlocked = match unlocked {
            Some(set) => set,
            None => {
                let node = resolver.dereference(workspace)?;
                let ws = as_workspace(workspace, node)?;
                default_unlocked_set(workspace, ws)
            }
        };
        Context::build(resolver, resolver, workspace, workspace, unlocked, parent)
    }

    /// Hydrates a [`DryContext`] once its promise has resolved to
    /// `resolved_workspace`. `dry.workspace` is the *template* the
    /// unlocked set was expressed against; `resolved_workspace` is the
    /// *target* — structurally isomorphic at every address the unlocked
    /// walk actually visits, but possibly a later revision.
    pub fn from_dry<R: Resolve>(
        dry: DryContext,
        resolved_workspace: Address,
        resolver: &R,
    ) -> Result<Context> {
        Context::build(
            resolver,
            resolver,
            dry.workspace,
            resolved_workspace,
            dry.unlocked,
            dry.parent,
        )
    }

    fn build<R: Resolve>(
        template_resolver: &R,
        target_resolver: &R,
        template_root: Address,
        target_root: Address,
        unlocked: HashSet<Address>,
        parent: Option<Rc<Context>>,
    ) -> Result<Context> {
        let target_node = target_resolver.dereference(target_root)?;
        let ws = as_workspace(target_root, target_node)?;
        let answer_promise = ws.answer_promise;
        let final_workspace_promise = ws.final_workspace_promise;

        let naming = Naming::build_reseated(
            template_resolver,
            target_resolver,
            template_root,
            target_root,
            &unlocked,
        )?;
        let display = render(target_resolver, &naming, target_root)?;

        Ok(Context {
            workspace: target_root,
            unlocked,
            answer_promise,
            final_workspace_promise,
            naming,
            display,
            parent,
        })
    }

    /// A context is its own ancestor if, walking its parent chain, some
    /// ancestor equals it (by derived display) and the canonicalized
    /// workspace addresses also match. This is the cycle check the
    /// scheduler aborts a transaction on.
    pub fn is_own_ancestor<R: Resolve>(&self, resolver: &R) -> bool {
        let my_workspace = resolver.canonicalize(self.workspace);
        let mut ancestor = self.parent.as_deref();
        while let Some(a) = ancestor {
            if a == self && resolver.canonicalize(a.workspace) == my_workspace {
                return true;
            }
            ancestor = a.parent.as_deref();
        }
        false
    }

    /// Whether `promise` is one of this context's own workspace's two
    /// promises.
    pub fn can_fulfill_promise(&self, promise: Address) -> bool {
        promise == self.answer_promise || promise == self.final_workspace_promise
    }

    /// "Context *c* can advance promise *p*" iff *p* is one of *c*'s
    /// workspace's two promises, or some promisee context of those
    /// promises can advance *p*, applied recursively. Structural only —
    /// never dereferences `promise` itself.
    pub fn can_advance_promise(&self, store: &Store<DryContext>, promise: Address) -> bool {
        if self.can_fulfill_promise(promise) {
            return true;
        }
        [self.answer_promise, self.final_workspace_promise]
            .into_iter()
            .flat_map(|p| store.promisees_of(p))
            .any(|dry| dry_can_advance_promise(store, dry, promise))
    }
}

fn dry_can_advance_promise(store: &Store<DryContext>, dry: &DryContext, promise: Address) -> bool {
    let Ok(node) = store.dereference(dry.workspace) else {
        return false;
    };
    let Some(ws) = node.as_workspace() else {
        return false;
    };
    if promise == ws.answer_promise || promise == ws.final_workspace_promise {
        return true;
    }
    [ws.answer_promise, ws.final_workspace_promise]
        .into_iter()
        .flat_map(|p| store.promisees_of(p))
        .any(|inner| dry_can_advance_promise(store, inner, promise))
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.display == other.display
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.display.hash(state);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("workspace", &self.workspace)
            .field("display", &self.display)
            .finish()
    }
}

fn as_workspace<'a>(addr: Address, node: &'a Node) -> Result<&'a WorkspaceNode> {
    node.as_workspace()
        .ok_or_else(|| err(Kind::InvalidPointer, format!("{addr} is not a workspace")))
}

fn default_unlocked_set(workspace_addr: Address, ws: &WorkspaceNode) -> HashSet<Address> {
    let mut set = HashSet::new();
    set.insert(workspace_addr);
    set.insert(ws.question);
    set.insert(ws.scratchpad);
    for sq in &ws.subquestions {
        set.insert(sq.question);
    }
    if let Some(pred) = ws.predecessor {
        set.insert(pred);
    }
    set
}

fn render<R: Resolve>(resolver: &R, naming: &Naming, root: Address) -> Result<String> {
    let mut memo = HashMap::new();
    render_node(resolver, naming, root, &mut memo)
}

fn render_node<R: Resolve>(
    resolver: &R,
    naming: &Naming,
    addr: Address,
    memo: &mut HashMap<Address, String>,
) -> Result<String> {
    if let Some(cached) = memo.get(&addr) {
        return Ok(cached.clone());
    }
    let node = resolver.dereference(addr)?;
    let text = match node {
        Node::Raw(raw) => {
            let mut out = String::new();
            for chunk in &raw.chunks {
                match chunk {
                    Fragment::Literal(text) => out.push_str(text),
                    Fragment::Ref(child) => {
                        out.push_str(&render_pointer(resolver, naming, *child, memo)?)
                    }
                }
            }
            out
        }
        Node::Workspace(ws) => {
            let mut out = String::new();
            if let Some(pred) = ws.predecessor {
                out.push_str("predecessor: ");
                out.push_str(&render_pointer(resolver, naming, pred, memo)?);
                out.push('\n');
            }
            out.push_str("question: ");
            out.push_str(&render_pointer(resolver, naming, ws.question, memo)?);
            out.push_str("\nscratchpad: ");
            out.push_str(&render_pointer(resolver, naming, ws.scratchpad, memo)?);
            for (i, sq) in ws.subquestions.iter().enumerate() {
                let n = i + 1;
                out.push_str(&format!("\nsubquestion $q{n}/$a{n}/$w{n}: "));
                out.push_str(&render_pointer(resolver, naming, sq.question, memo)?);
                out.push_str(", ");
                out.push_str(&render_pointer(resolver, naming, sq.answer_promise, memo)?);
                out.push_str(", ");
                out.push_str(&render_pointer(resolver, naming, sq.final_workspace_promise, memo)?);
            }
            out
        }
    };
    memo.insert(addr, text.clone());
    Ok(text)
}

fn render_pointer<R: Resolve>(
    resolver: &R,
    naming: &Naming,
    addr: Address,
    memo: &mut HashMap<Address, String>,
) -> Result<String> {
    let name = naming.name_of(addr).unwrap_or("?");
    if naming.is_expanded(addr) {
        let inner = render_node(resolver, naming, addr, memo)?;
        Ok(format!("${name}[{inner}]"))
    } else {
        Ok(format!("${name}"))
    }
}
