//! Proptest strategies for generating process trees and trace expressions.

use proptest::prelude::*;

use tracesem_ast::{ExprId, NodeId, Program};

use crate::trace::{Atom, AtomId, AtomOrigin, ChanRef, TraceNode};

/// How a generated guard folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardShape {
    True,
    False,
    Unknown,
}

/// Program-independent description of a process tree.
///
/// Channel operands index into the channel list passed to
/// [`ProcShape::build`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProcShape {
    Skip,
    Stop,
    Input(usize),
    Output(usize),
    Assign,
    Seq(Vec<ProcShape>),
    Par(Vec<ProcShape>),
    While(GuardShape, Box<ProcShape>),
    If(GuardShape, Box<ProcShape>),
    ReplSeq(Option<i64>, Box<ProcShape>),
    ReplPar(Option<i64>, Box<ProcShape>),
}

impl ProcShape {
    /// Add the tree to `program`, returning its root node.
    pub fn build(&self, program: &mut Program, chans: &[ExprId]) -> NodeId {
        let chan = |i: usize| chans[i % chans.len()];
        match self {
            ProcShape::Skip => program.skip(),
            ProcShape::Stop => program.stop(),
            ProcShape::Input(i) => program.input(chan(*i)),
            ProcShape::Output(i) => program.output(chan(*i)),
            ProcShape::Assign => {
                let target = program.variable("v");
                let value = program.int(1);
                program.assign(target, value)
            }
            ProcShape::Seq(children) => {
                let nodes = children.iter().map(|c| c.build(program, chans)).collect();
                program.seq(nodes)
            }
            ProcShape::Par(children) => {
                let nodes = children.iter().map(|c| c.build(program, chans)).collect();
                program.par(nodes)
            }
            ProcShape::While(guard, body) => {
                let body = body.build(program, chans);
                let guard = guard_expr(program, *guard);
                program.while_loop(guard, body)
            }
            ProcShape::If(guard, body) => {
                let body = body.build(program, chans);
                let guard = guard_expr(program, *guard);
                program.if_then(guard, body)
            }
            ProcShape::ReplSeq(count, body) => {
                let body = body.build(program, chans);
                let count = count_expr(program, *count);
                program.repl_seq(count, body)
            }
            ProcShape::ReplPar(count, body) => {
                let body = body.build(program, chans);
                let count = count_expr(program, *count);
                program.repl_par(count, body)
            }
        }
    }
}

fn guard_expr(program: &mut Program, guard: GuardShape) -> ExprId {
    match guard {
        GuardShape::True => program.boolean(true),
        GuardShape::False => program.boolean(false),
        GuardShape::Unknown => program.opaque(),
    }
}

fn count_expr(program: &mut Program, count: Option<i64>) -> ExprId {
    match count {
        Some(n) => program.int(n),
        None => program.opaque(),
    }
}

pub fn arb_guard() -> impl Strategy<Value = GuardShape> {
    prop_oneof![
        Just(GuardShape::True),
        Just(GuardShape::False),
        Just(GuardShape::Unknown),
    ]
}

/// Strategy for process trees over `nchans` channels.
pub fn arb_proc_shape(nchans: usize) -> impl Strategy<Value = ProcShape> {
    let leaf = prop_oneof![
        Just(ProcShape::Skip),
        Just(ProcShape::Stop),
        Just(ProcShape::Assign),
        (0..nchans).prop_map(ProcShape::Input),
        (0..nchans).prop_map(ProcShape::Output),
    ];
    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(ProcShape::Seq),
            proptest::collection::vec(inner.clone(), 0..4).prop_map(ProcShape::Par),
            (arb_guard(), inner.clone()).prop_map(|(g, b)| ProcShape::While(g, Box::new(b))),
            (arb_guard(), inner.clone()).prop_map(|(g, b)| ProcShape::If(g, Box::new(b))),
            (proptest::option::of(-1i64..4), inner.clone())
                .prop_map(|(n, b)| ProcShape::ReplSeq(n, Box::new(b))),
            (proptest::option::of(-1i64..4), inner)
                .prop_map(|(n, b)| ProcShape::ReplPar(n, Box::new(b))),
        ]
    })
}

/// Strategy for a `SEQ` tree whose only leaves are `SKIP`.
pub fn arb_skip_tree() -> impl Strategy<Value = ProcShape> {
    Just(ProcShape::Skip).prop_recursive(4, 32, 4, |inner| {
        proptest::collection::vec(inner, 0..4).prop_map(ProcShape::Seq)
    })
}

/// Binder used by [`arb_trace`]; nested fixpoints shadow one another.
pub const GENERATED_ATOM: Atom = Atom {
    id: AtomId(u64::MAX),
    origin: AtomOrigin::Loop(NodeId(u32::MAX)),
};

/// Strategy for closed trace expressions over the given channels.
///
/// Recursion is always guarded by a `Seq` head, so the state space of every
/// generated expression is finite.
pub fn arb_trace(chans: Vec<ChanRef>) -> impl Strategy<Value = TraceNode> {
    let events = proptest::sample::select(chans);
    let leaf = prop_oneof![
        Just(TraceNode::Skip),
        Just(TraceNode::Stop),
        Just(TraceNode::Div),
        Just(TraceNode::Chaos),
        events.clone().prop_map(TraceNode::Input),
        events.prop_map(TraceNode::Output),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..3).prop_map(TraceNode::Seq),
            proptest::collection::vec(inner.clone(), 0..3).prop_map(TraceNode::Par),
            proptest::collection::vec(inner.clone(), 0..3).prop_map(TraceNode::Det),
            proptest::collection::vec(inner.clone(), 0..3).prop_map(TraceNode::Ndet),
            inner.prop_map(|body| TraceNode::fixpoint(
                GENERATED_ATOM,
                TraceNode::Seq(vec![
                    body,
                    TraceNode::Ndet(vec![TraceNode::AtomRef(GENERATED_ATOM.id), TraceNode::Skip]),
                ]),
            )),
        ]
    })
}
