//! Trace expressions: the algebra computed for every process construct.

use std::collections::BTreeSet;
use std::fmt;

use tracesem_ast::{DeclId, ExprId, NodeId, Program};

/// Globally unique identifier of an [`Atom`] within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AtomId(pub u64);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// Which construct minted an atom. Only used for debug output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum AtomOrigin {
    Loop(NodeId),
    Replication(NodeId),
    Recursion(DeclId),
    Contract(DeclId),
}

/// Placeholder for a recursively defined sub-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Atom {
    pub id: AtomId,
    pub origin: AtomOrigin,
}

/// Back-link to the channel a communication uses.
///
/// `root` is the channel expression with decorations stripped; for an array
/// element `c[i]` the root is `c` and `index` is `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ChanRef {
    pub root: ExprId,
    pub index: Option<ExprId>,
}

impl ChanRef {
    pub fn new(root: ExprId) -> Self {
        Self { root, index: None }
    }

    /// Build a reference from a channel expression as written in the tree.
    pub fn from_expr(program: &Program, expr: ExprId) -> Self {
        let expr = program.strip_decorations(expr);
        match program.expr(expr) {
            tracesem_ast::Expr::Subscript { base, index } => Self {
                root: program.strip_decorations(*base),
                index: Some(*index),
            },
            _ => Self::new(expr),
        }
    }

    pub fn describe(&self, program: &Program) -> String {
        match self.index {
            Some(index) => format!(
                "{}[{}]",
                program.describe_expr(self.root),
                program.describe_expr(index)
            ),
            None => program.describe_expr(self.root),
        }
    }
}

impl fmt::Display for ChanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{index}]", self.root),
            None => write!(f, "{}", self.root),
        }
    }
}

/// A trace expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum TraceNode {
    /// Successful termination.
    Skip,
    /// Deadlock.
    Stop,
    /// Divergence: runs forever without observable events.
    Div,
    /// Unconstrained behaviour.
    Chaos,
    /// Free placeholder for a not-yet-defined sub-process.
    Atom(Atom),
    /// Reference to the atom bound by an enclosing [`TraceNode::Fixpoint`].
    AtomRef(AtomId),
    Input(ChanRef),
    Output(ChanRef),
    /// Behaviour of the process at a source node that could not be characterised.
    NodeRef(NodeId),
    Seq(Vec<TraceNode>),
    Par(Vec<TraceNode>),
    /// External (deterministic) choice.
    Det(Vec<TraceNode>),
    /// Internal (non-deterministic) choice.
    Ndet(Vec<TraceNode>),
    /// The process equal to its own unrolling.
    Fixpoint { binder: Atom, body: Box<TraceNode> },
}

impl TraceNode {
    pub fn fixpoint(binder: Atom, body: TraceNode) -> Self {
        TraceNode::Fixpoint {
            binder,
            body: Box::new(body),
        }
    }

    pub fn children(&self) -> &[TraceNode] {
        match self {
            TraceNode::Seq(c) | TraceNode::Par(c) | TraceNode::Det(c) | TraceNode::Ndet(c) => c,
            TraceNode::Fixpoint { body, .. } => std::slice::from_ref(body.as_ref()),
            _ => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(
            self,
            TraceNode::Seq(_)
                | TraceNode::Par(_)
                | TraceNode::Det(_)
                | TraceNode::Ndet(_)
                | TraceNode::Fixpoint { .. }
        )
    }

    /// Number of nodes in the expression tree.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(TraceNode::size).sum::<usize>()
    }

    /// Apply `f` to every channel reference, keeping the tree shape.
    pub fn map_channels(&self, f: &mut impl FnMut(ChanRef) -> ChanRef) -> TraceNode {
        match self {
            TraceNode::Input(c) => TraceNode::Input(f(*c)),
            TraceNode::Output(c) => TraceNode::Output(f(*c)),
            TraceNode::Seq(c) => TraceNode::Seq(c.iter().map(|n| n.map_channels(f)).collect()),
            TraceNode::Par(c) => TraceNode::Par(c.iter().map(|n| n.map_channels(f)).collect()),
            TraceNode::Det(c) => TraceNode::Det(c.iter().map(|n| n.map_channels(f)).collect()),
            TraceNode::Ndet(c) => TraceNode::Ndet(c.iter().map(|n| n.map_channels(f)).collect()),
            TraceNode::Fixpoint { binder, body } => TraceNode::fixpoint(*binder, body.map_channels(f)),
            leaf => leaf.clone(),
        }
    }

    /// Replace communications on channels rejected by `keep` with `Skip`.
    pub fn hide_channels(&self, keep: &impl Fn(ChanRef) -> bool) -> TraceNode {
        match self {
            TraceNode::Input(c) | TraceNode::Output(c) if !keep(*c) => TraceNode::Skip,
            TraceNode::Seq(c) => TraceNode::Seq(c.iter().map(|n| n.hide_channels(keep)).collect()),
            TraceNode::Par(c) => TraceNode::Par(c.iter().map(|n| n.hide_channels(keep)).collect()),
            TraceNode::Det(c) => TraceNode::Det(c.iter().map(|n| n.hide_channels(keep)).collect()),
            TraceNode::Ndet(c) => {
                TraceNode::Ndet(c.iter().map(|n| n.hide_channels(keep)).collect())
            }
            TraceNode::Fixpoint { binder, body } => {
                TraceNode::fixpoint(*binder, body.hide_channels(keep))
            }
            other => other.clone(),
        }
    }

    /// Every channel reference, in left-to-right order.
    pub fn channels(&self) -> Vec<ChanRef> {
        let mut out = Vec::new();
        self.collect_channels(&mut out);
        out
    }

    fn collect_channels(&self, out: &mut Vec<ChanRef>) {
        match self {
            TraceNode::Input(c) | TraceNode::Output(c) => out.push(*c),
            _ => {
                for child in self.children() {
                    child.collect_channels(out);
                }
            }
        }
    }

    /// Atom references not bound by an enclosing fixpoint.
    pub fn free_atoms(&self) -> BTreeSet<AtomId> {
        let mut bound = Vec::new();
        let mut free = BTreeSet::new();
        self.collect_free_atoms(&mut bound, &mut free);
        free
    }

    fn collect_free_atoms(&self, bound: &mut Vec<AtomId>, free: &mut BTreeSet<AtomId>) {
        match self {
            TraceNode::AtomRef(id) => {
                if !bound.contains(id) {
                    free.insert(*id);
                }
            }
            TraceNode::Fixpoint { binder, body } => {
                bound.push(binder.id);
                body.collect_free_atoms(bound, free);
                bound.pop();
            }
            _ => {
                for child in self.children() {
                    child.collect_free_atoms(bound, free);
                }
            }
        }
    }

    pub fn references_atom(&self, atom: AtomId) -> bool {
        self.free_atoms().contains(&atom)
    }

    /// Replace free references to `atom` with `replacement`.
    pub fn substitute_atom(&self, atom: AtomId, replacement: &TraceNode) -> TraceNode {
        match self {
            TraceNode::AtomRef(id) if *id == atom => replacement.clone(),
            // An inner binder with the same id shadows the outer one.
            TraceNode::Fixpoint { binder, .. } if binder.id == atom => self.clone(),
            TraceNode::Fixpoint { binder, body } => {
                TraceNode::fixpoint(*binder, body.substitute_atom(atom, replacement))
            }
            TraceNode::Seq(c) => {
                TraceNode::Seq(c.iter().map(|n| n.substitute_atom(atom, replacement)).collect())
            }
            TraceNode::Par(c) => {
                TraceNode::Par(c.iter().map(|n| n.substitute_atom(atom, replacement)).collect())
            }
            TraceNode::Det(c) => {
                TraceNode::Det(c.iter().map(|n| n.substitute_atom(atom, replacement)).collect())
            }
            TraceNode::Ndet(c) => {
                TraceNode::Ndet(c.iter().map(|n| n.substitute_atom(atom, replacement)).collect())
            }
            leaf => leaf.clone(),
        }
    }

    /// Render with channel names taken from `program`.
    pub fn display_with<'a>(&'a self, program: &'a Program) -> NamedTrace<'a> {
        NamedTrace {
            node: self,
            program,
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, program: Option<&Program>) -> fmt::Result {
        let chan = |c: &ChanRef| match program {
            Some(p) => c.describe(p),
            None => c.to_string(),
        };
        match self {
            TraceNode::Skip => f.write_str("Skip"),
            TraceNode::Stop => f.write_str("Stop"),
            TraceNode::Div => f.write_str("Div"),
            TraceNode::Chaos => f.write_str("Chaos"),
            TraceNode::Atom(atom) => write!(f, "Atom({})", atom.id),
            TraceNode::AtomRef(id) => write!(f, "{id}"),
            TraceNode::Input(c) => write!(f, "{}?", chan(c)),
            TraceNode::Output(c) => write!(f, "{}!", chan(c)),
            TraceNode::NodeRef(node) => write!(f, "@{node}"),
            TraceNode::Seq(c) => render_list(f, "Seq", c, program),
            TraceNode::Par(c) => render_list(f, "Par", c, program),
            TraceNode::Det(c) => render_list(f, "Det", c, program),
            TraceNode::Ndet(c) => render_list(f, "Ndet", c, program),
            TraceNode::Fixpoint { binder, body } => {
                write!(f, "Fix {}. ", binder.id)?;
                body.render(f, program)
            }
        }
    }
}

fn render_list(
    f: &mut fmt::Formatter<'_>,
    op: &str,
    children: &[TraceNode],
    program: Option<&Program>,
) -> fmt::Result {
    write!(f, "{op}(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        child.render(f, program)?;
    }
    write!(f, ")")
}

impl fmt::Display for TraceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, None)
    }
}

/// A [`TraceNode`] paired with the program naming its channels.
pub struct NamedTrace<'a> {
    node: &'a TraceNode,
    program: &'a Program,
}

impl fmt::Display for NamedTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.render(f, Some(self.program))
    }
}

/// The alternative behaviours computed for a unit or declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct TraceSet {
    pub alternatives: Vec<TraceNode>,
}

impl TraceSet {
    pub fn new(alternatives: Vec<TraceNode>) -> Self {
        Self { alternatives }
    }

    pub fn single(node: TraceNode) -> Self {
        Self {
            alternatives: vec![node],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceNode> + '_ {
        self.alternatives.iter()
    }

    /// Collapse the alternatives into one non-deterministic choice.
    ///
    /// An empty set contributes nothing.
    pub fn to_choice(&self) -> Option<TraceNode> {
        match self.alternatives.as_slice() {
            [] => None,
            [only] => Some(only.clone()),
            many => Some(TraceNode::Ndet(many.to_vec())),
        }
    }

    pub fn map(&self, f: impl Fn(&TraceNode) -> TraceNode) -> TraceSet {
        TraceSet::new(self.alternatives.iter().map(f).collect())
    }

    pub fn free_atoms(&self) -> BTreeSet<AtomId> {
        self.alternatives
            .iter()
            .flat_map(TraceNode::free_atoms)
            .collect()
    }

    pub fn display_with<'a>(&'a self, program: &'a Program) -> String {
        let parts: Vec<String> = self
            .alternatives
            .iter()
            .map(|n| n.display_with(program).to_string())
            .collect();
        format!("{{{}}}", parts.join(" | "))
    }
}

impl fmt::Display for TraceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, alt) in self.alternatives.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{alt}")?;
        }
        write!(f, "}}")
    }
}

/// Whole-compilation context threaded through every checker invocation.
///
/// Atom identifiers are unique across the compilation so that debug dumps
/// spanning several units never reuse a number. Create one context per
/// compilation; there is no way to rewind it.
#[derive(Debug, Default)]
pub struct CompilationContext {
    next_atom: u64,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_atom(&mut self, origin: AtomOrigin) -> Atom {
        let id = AtomId(self.next_atom);
        self.next_atom += 1;
        Atom { id, origin }
    }

    pub fn atoms_minted(&self) -> u64 {
        self.next_atom
    }
}
