//! Algebraic simplification of trace expressions.
//!
//! The rewrites preserve trace semantics:
//! - nested composites of the same operator are flattened;
//! - `Skip` is dropped from `Seq` and `Par`, `Stop` from `Det`;
//! - a `Seq` is truncated after `Stop`, `Div` or `Chaos`;
//! - duplicate alternatives of a choice are merged;
//! - a composite with one child becomes that child, an empty one its identity;
//! - a fixpoint whose body never mentions its binder becomes its body.

use crate::trace::TraceNode;

pub fn simplify(node: &TraceNode) -> TraceNode {
    match node {
        TraceNode::Seq(children) => {
            let mut out = Vec::with_capacity(children.len());
            for child in children {
                match simplify(child) {
                    TraceNode::Skip => {}
                    TraceNode::Seq(inner) => out.extend(inner),
                    other => out.push(other),
                }
                if matches!(
                    out.last(),
                    Some(TraceNode::Stop | TraceNode::Div | TraceNode::Chaos)
                ) {
                    break;
                }
            }
            collapse(out, TraceNode::Skip, TraceNode::Seq)
        }
        TraceNode::Par(children) => {
            let mut out = Vec::with_capacity(children.len());
            for child in children {
                match simplify(child) {
                    TraceNode::Skip => {}
                    TraceNode::Par(inner) => out.extend(inner),
                    other => out.push(other),
                }
            }
            collapse(out, TraceNode::Skip, TraceNode::Par)
        }
        TraceNode::Det(children) => {
            let mut out: Vec<TraceNode> = Vec::with_capacity(children.len());
            for child in children {
                match simplify(child) {
                    TraceNode::Stop => {}
                    TraceNode::Det(inner) => {
                        for alt in inner {
                            push_unique(&mut out, alt);
                        }
                    }
                    other => push_unique(&mut out, other),
                }
            }
            collapse(out, TraceNode::Stop, TraceNode::Det)
        }
        TraceNode::Ndet(children) => {
            let mut out: Vec<TraceNode> = Vec::with_capacity(children.len());
            for child in children {
                match simplify(child) {
                    TraceNode::Ndet(inner) => {
                        for alt in inner {
                            push_unique(&mut out, alt);
                        }
                    }
                    other => push_unique(&mut out, other),
                }
            }
            collapse(out, TraceNode::Stop, TraceNode::Ndet)
        }
        TraceNode::Fixpoint { binder, body } => {
            let body = simplify(body);
            if body.references_atom(binder.id) {
                TraceNode::fixpoint(*binder, body)
            } else {
                body
            }
        }
        leaf => leaf.clone(),
    }
}

fn push_unique(out: &mut Vec<TraceNode>, node: TraceNode) {
    if !out.contains(&node) {
        out.push(node);
    }
}

fn collapse(
    mut children: Vec<TraceNode>,
    identity: TraceNode,
    wrap: fn(Vec<TraceNode>) -> TraceNode,
) -> TraceNode {
    match children.len() {
        0 => identity,
        1 => children.remove(0),
        _ => wrap(children),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{AtomOrigin, ChanRef, CompilationContext};
    use tracesem_ast::{NodeId, Program};

    #[test]
    fn skips_under_seq_collapse_to_skip() {
        let node = TraceNode::Seq(vec![
            TraceNode::Skip,
            TraceNode::Seq(vec![TraceNode::Skip, TraceNode::Seq(vec![])]),
            TraceNode::Skip,
        ]);
        assert_eq!(simplify(&node), TraceNode::Skip);
    }

    #[test]
    fn single_child_composites_are_flattened() {
        let mut p = Program::new("s");
        let c = ChanRef::new(p.channel("c"));
        let node = TraceNode::Par(vec![TraceNode::Det(vec![TraceNode::Input(c)])]);
        assert_eq!(simplify(&node), TraceNode::Input(c));
    }

    #[test]
    fn seq_is_truncated_after_stop() {
        let mut p = Program::new("s");
        let c = ChanRef::new(p.channel("c"));
        let node = TraceNode::Seq(vec![
            TraceNode::Output(c),
            TraceNode::Stop,
            TraceNode::Input(c),
        ]);
        assert_eq!(
            simplify(&node),
            TraceNode::Seq(vec![TraceNode::Output(c), TraceNode::Stop])
        );
    }

    #[test]
    fn seq_is_truncated_after_div_and_chaos() {
        let mut p = Program::new("s");
        let c = ChanRef::new(p.channel("c"));
        for end in [TraceNode::Div, TraceNode::Chaos] {
            let node = TraceNode::Seq(vec![
                TraceNode::Output(c),
                TraceNode::Seq(vec![end.clone(), TraceNode::Input(c)]),
                TraceNode::Output(c),
            ]);
            assert_eq!(
                simplify(&node),
                TraceNode::Seq(vec![TraceNode::Output(c), end])
            );
        }
    }

    #[test]
    fn duplicate_alternatives_merge() {
        let node = TraceNode::Ndet(vec![
            TraceNode::Skip,
            TraceNode::Ndet(vec![TraceNode::Skip, TraceNode::Stop]),
        ]);
        assert_eq!(
            simplify(&node),
            TraceNode::Ndet(vec![TraceNode::Skip, TraceNode::Stop])
        );
        assert_eq!(simplify(&TraceNode::Det(vec![])), TraceNode::Stop);
    }

    #[test]
    fn fixpoint_without_recursion_is_unwrapped() {
        let mut ctx = CompilationContext::new();
        let a = ctx.fresh_atom(AtomOrigin::Loop(NodeId(0)));
        let node = TraceNode::fixpoint(a, TraceNode::Seq(vec![TraceNode::Stop]));
        assert_eq!(simplify(&node), TraceNode::Stop);

        let looping = TraceNode::fixpoint(
            a,
            TraceNode::Seq(vec![TraceNode::Skip, TraceNode::AtomRef(a.id)]),
        );
        assert_eq!(
            simplify(&looping),
            TraceNode::fixpoint(a, TraceNode::AtomRef(a.id))
        );
    }
}
