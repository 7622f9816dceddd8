//! Operational semantics of trace expressions.
//!
//! Every state offers visible events, termination (`Tick`) and silent
//! moves. `Fixpoint` unfolds silently, `Ndet` resolves silently, `Det` is
//! resolved by the first visible event or termination, and `Par` interleaves
//! its children with distributed termination.

use std::fmt;

use tracesem_ast::{ConstFold, ExprId, NameId, Program};

use crate::trace::{ChanRef, TraceNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ChannelRoot {
    Name(NameId),
    /// A channel expression that does not denote a declared name.
    Expr(ExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ChannelIndex {
    Const(i64),
    Expr(ExprId),
}

/// A channel compared by what it denotes rather than where it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ChannelKey {
    pub root: ChannelRoot,
    pub index: Option<ChannelIndex>,
}

impl ChannelKey {
    pub fn resolve(program: &Program, chan: &ChanRef) -> Self {
        let root = match program.resolve_name(chan.root) {
            Some(name) => ChannelRoot::Name(name),
            None => ChannelRoot::Expr(program.strip_decorations(chan.root)),
        };
        let index = chan.index.map(|index| match program.constant_value(index) {
            Some(v) => ChannelIndex::Const(v),
            None => ChannelIndex::Expr(program.strip_decorations(index)),
        });
        Self { root, index }
    }

    pub fn describe(&self, program: &Program) -> String {
        let root = match self.root {
            ChannelRoot::Name(name) => program.name(name).name.clone(),
            ChannelRoot::Expr(expr) => program.describe_expr(expr),
        };
        match self.index {
            Some(ChannelIndex::Const(v)) => format!("{root}[{v}]"),
            Some(ChannelIndex::Expr(e)) => format!("{root}[{}]", program.describe_expr(e)),
            None => root,
        }
    }
}

/// An observable step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Label {
    /// Successful termination.
    Tick,
    Event { dir: Direction, chan: ChannelKey },
}

impl Label {
    pub fn describe(&self, program: &Program) -> String {
        match self {
            Label::Tick => "termination".to_string(),
            Label::Event { dir, chan } => {
                let mark = match dir {
                    Direction::Input => '?',
                    Direction::Output => '!',
                };
                format!("{}{mark}", chan.describe(program))
            }
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Tick => f.write_str("tick"),
            Label::Event { dir, chan } => {
                match chan.root {
                    ChannelRoot::Name(n) => write!(f, "{n}")?,
                    ChannelRoot::Expr(e) => write!(f, "{e}")?,
                }
                match chan.index {
                    Some(ChannelIndex::Const(v)) => write!(f, "[{v}]")?,
                    Some(ChannelIndex::Expr(e)) => write!(f, "[{e}]")?,
                    None => {}
                }
                match dir {
                    Direction::Input => f.write_str("?"),
                    Direction::Output => f.write_str("!"),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Move {
    Tau,
    Visible(Label),
}

/// One-step successors of `node`.
pub(crate) fn transitions(program: &Program, node: &TraceNode) -> Vec<(Move, TraceNode)> {
    match node {
        // Nothing follows termination, so the terminated state is `Stop`.
        TraceNode::Skip => vec![(Move::Visible(Label::Tick), TraceNode::Stop)],
        TraceNode::Input(chan) => vec![(event(program, Direction::Input, chan), TraceNode::Skip)],
        TraceNode::Output(chan) => {
            vec![(event(program, Direction::Output, chan), TraceNode::Skip)]
        }
        TraceNode::Seq(children) => match children.split_first() {
            None => vec![(Move::Tau, TraceNode::Skip)],
            Some((first, rest)) => transitions(program, first)
                .into_iter()
                .map(|(mv, next)| match mv {
                    Move::Visible(Label::Tick) => (Move::Tau, seq_of(rest.to_vec())),
                    other => {
                        let mut seq = Vec::with_capacity(children.len());
                        seq.push(next);
                        seq.extend(rest.iter().cloned());
                        (other, TraceNode::Seq(seq))
                    }
                })
                .collect(),
        },
        TraceNode::Par(children) => {
            if children.is_empty() {
                return vec![(Move::Tau, TraceNode::Skip)];
            }
            let mut out = Vec::new();
            for (i, child) in children.iter().enumerate() {
                for (mv, next) in transitions(program, child) {
                    let mut rest = children.clone();
                    match mv {
                        Move::Visible(Label::Tick) => {
                            rest.remove(i);
                            out.push((Move::Tau, par_of(rest)));
                        }
                        other => {
                            rest[i] = next;
                            out.push((other, TraceNode::Par(rest)));
                        }
                    }
                }
            }
            out
        }
        TraceNode::Det(children) => {
            if children.is_empty() {
                return vec![(Move::Tau, TraceNode::Stop)];
            }
            let mut out = Vec::new();
            for (i, child) in children.iter().enumerate() {
                for (mv, next) in transitions(program, child) {
                    match mv {
                        Move::Tau => {
                            let mut rest = children.clone();
                            rest[i] = next;
                            out.push((Move::Tau, TraceNode::Det(rest)));
                        }
                        visible => out.push((visible, next)),
                    }
                }
            }
            out
        }
        TraceNode::Ndet(children) => {
            if children.is_empty() {
                return vec![(Move::Tau, TraceNode::Stop)];
            }
            children.iter().map(|c| (Move::Tau, c.clone())).collect()
        }
        TraceNode::Fixpoint { binder, body } => {
            vec![(Move::Tau, body.substitute_atom(binder.id, node))]
        }
        TraceNode::Stop
        | TraceNode::Div
        | TraceNode::Chaos
        | TraceNode::Atom(_)
        | TraceNode::AtomRef(_)
        | TraceNode::NodeRef(_) => Vec::new(),
    }
}

fn event(program: &Program, dir: Direction, chan: &ChanRef) -> Move {
    Move::Visible(Label::Event {
        dir,
        chan: ChannelKey::resolve(program, chan),
    })
}

fn seq_of(mut children: Vec<TraceNode>) -> TraceNode {
    match children.len() {
        0 => TraceNode::Skip,
        1 => children.remove(0),
        _ => TraceNode::Seq(children),
    }
}

fn par_of(mut children: Vec<TraceNode>) -> TraceNode {
    match children.len() {
        0 => TraceNode::Skip,
        1 => children.remove(0),
        _ => TraceNode::Par(children),
    }
}

/// Whether some currently active component of `node` satisfies `leaf`.
///
/// Only the head of a `Seq` is active; every child of `Par` and `Det` is.
fn active_leaf(node: &TraceNode, leaf: &impl Fn(&TraceNode) -> bool) -> bool {
    match node {
        TraceNode::Seq(children) => children.first().is_some_and(|c| active_leaf(c, leaf)),
        TraceNode::Par(children) | TraceNode::Det(children) => {
            children.iter().any(|c| active_leaf(c, leaf))
        }
        other => leaf(other),
    }
}

pub(crate) fn diverges(node: &TraceNode) -> bool {
    active_leaf(node, &|n| matches!(n, TraceNode::Div))
}

pub(crate) fn accepts_anything(node: &TraceNode) -> bool {
    active_leaf(node, &|n| matches!(n, TraceNode::Chaos))
}

/// Behaviour the semantics cannot characterise: chaos, free atoms and
/// opaque source references.
pub(crate) fn unconstrained(node: &TraceNode) -> bool {
    active_leaf(node, &|n| {
        matches!(
            n,
            TraceNode::Chaos | TraceNode::Atom(_) | TraceNode::AtomRef(_) | TraceNode::NodeRef(_)
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(program: &Program, node: &TraceNode) -> Vec<Move> {
        transitions(program, node).into_iter().map(|(m, _)| m).collect()
    }

    #[test]
    fn seq_turns_child_termination_silent() {
        let mut p = Program::new("sem");
        let c = ChanRef::new(p.channel("c"));
        let node = TraceNode::Seq(vec![TraceNode::Skip, TraceNode::Output(c)]);
        let steps = transitions(&p, &node);
        assert_eq!(steps, vec![(Move::Tau, TraceNode::Output(c))]);
    }

    #[test]
    fn par_interleaves_children() {
        let mut p = Program::new("sem");
        let a = ChanRef::new(p.channel("a"));
        let b = ChanRef::new(p.channel("b"));
        let node = TraceNode::Par(vec![TraceNode::Input(a), TraceNode::Input(b)]);
        let moves = labels(&p, &node);
        assert_eq!(moves.len(), 2);
        assert!(moves.iter().all(|m| matches!(m, Move::Visible(Label::Event { .. }))));
    }

    #[test]
    fn channels_compare_by_denoted_name() {
        let mut p = Program::new("sem");
        let first = p.channel("c");
        let name = p.resolve_name(first).unwrap();
        let second = p.name_ref(name);
        assert_ne!(first, second);
        assert_eq!(
            ChannelKey::resolve(&p, &ChanRef::new(first)),
            ChannelKey::resolve(&p, &ChanRef::new(second))
        );
    }

    #[test]
    fn constant_subscripts_are_folded() {
        let mut p = Program::new("sem");
        let cs = p.channel("cs");
        let one = p.int(1);
        let two = p.int(2);
        let sum = p.binary(tracesem_ast::BinOp::Add, one, one);
        let a = ChannelKey::resolve(&p, &ChanRef { root: cs, index: Some(sum) });
        let b = ChannelKey::resolve(&p, &ChanRef { root: cs, index: Some(two) });
        assert_eq!(a, b);
        assert_eq!(a.describe(&p), "cs[2]");
    }

    #[test]
    fn divergence_is_seen_only_at_the_head() {
        let mut p = Program::new("sem");
        let c = ChanRef::new(p.channel("c"));
        assert!(diverges(&TraceNode::Seq(vec![TraceNode::Div, TraceNode::Output(c)])));
        assert!(!diverges(&TraceNode::Seq(vec![TraceNode::Output(c), TraceNode::Div])));
        assert!(diverges(&TraceNode::Par(vec![TraceNode::Output(c), TraceNode::Div])));
        assert!(accepts_anything(&TraceNode::Det(vec![TraceNode::Chaos])));
    }
}
