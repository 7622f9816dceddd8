//! Trace refinement between a computed behaviour and a declared contract.
//!
//! Both sides are explored together breadth-first over pairs of state sets
//! closed under silent moves, so a reported counterexample carries the
//! shortest offending prefix. A side diverges when it reaches `Div` or can
//! take silent moves forever.

mod semantics;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use indexmap::IndexSet;
use tracesem_ast::Program;

use crate::simplify::simplify;
use crate::trace::TraceNode;

pub use semantics::{ChannelIndex, ChannelKey, ChannelRoot, Direction, Label};
use semantics::{accepts_anything, diverges, transitions, unconstrained, Move};

/// What the computed behaviour did that the contract does not allow.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Violation {
    UnexpectedStep(Label),
    Divergence,
    Unconstrained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Counterexample {
    /// Steps both sides agree on before the violation.
    pub prefix: Vec<Label>,
    pub violation: Violation,
}

impl Counterexample {
    pub fn describe(&self, program: &Program) -> String {
        let prefix: Vec<String> = self.prefix.iter().map(|l| l.describe(program)).collect();
        let after = if prefix.is_empty() {
            "initially".to_string()
        } else {
            format!("after <{}>", prefix.join(", "))
        };
        match &self.violation {
            Violation::UnexpectedStep(label) => {
                format!("{after} it may perform {}", label.describe(program))
            }
            Violation::Divergence => format!("{after} it may diverge"),
            Violation::Unconstrained => format!("{after} its behaviour is unconstrained"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Verdict {
    Refines,
    Violated(Counterexample),
    /// The state bound was reached before a verdict.
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct RefinementReport {
    pub verdict: Verdict,
    /// Steps the contract offers that the computed behaviour never takes.
    pub restrictive: Vec<Label>,
    pub states_explored: usize,
}

impl RefinementReport {
    pub fn holds(&self) -> bool {
        self.verdict == Verdict::Refines
    }
}

/// Decide whether every behaviour of `imp` is permitted by `spec`.
pub fn refines(
    program: &Program,
    spec: &TraceNode,
    imp: &TraceNode,
    max_states: usize,
) -> RefinementReport {
    let mut explorer = Explorer::new(program, max_states);
    let outcome = explore(&mut explorer, spec, imp);
    let states_explored = explorer.states.len();
    match outcome {
        Ok((verdict, restrictive)) => RefinementReport {
            verdict,
            restrictive,
            states_explored,
        },
        Err(Exhausted) => RefinementReport {
            verdict: Verdict::Inconclusive,
            restrictive: Vec::new(),
            states_explored,
        },
    }
}

#[derive(Debug)]
struct Exhausted;

type StateSet = BTreeSet<usize>;

fn explore(
    ex: &mut Explorer<'_>,
    spec: &TraceNode,
    imp: &TraceNode,
) -> Result<(Verdict, Vec<Label>), Exhausted> {
    let imp_start = ex.intern(simplify(imp))?;
    let spec_start = ex.intern(simplify(spec))?;
    let imp0 = ex.closure([imp_start])?;
    let spec0 = ex.closure([spec_start])?;

    let mut queue: VecDeque<(StateSet, StateSet, Vec<Label>)> = VecDeque::new();
    queue.push_back((imp0, spec0, Vec::new()));
    let mut visited: IndexSet<(StateSet, StateSet)> = IndexSet::new();
    let mut offered: IndexSet<Label> = IndexSet::new();
    let mut performed: IndexSet<Label> = IndexSet::new();

    while let Some((imp, spec, prefix)) = queue.pop_front() {
        if !visited.insert((imp.clone(), spec.clone())) {
            continue;
        }
        if ex.any(&spec, accepts_anything) {
            continue;
        }
        if ex.diverges(&imp)? && !ex.diverges(&spec)? {
            return Ok((violated(prefix, Violation::Divergence), Vec::new()));
        }
        if ex.any(&imp, unconstrained) {
            return Ok((violated(prefix, Violation::Unconstrained), Vec::new()));
        }

        offered.extend(ex.labels(&spec)?);
        for label in ex.labels(&imp)? {
            performed.insert(label);
            let spec_next = ex.step(&spec, &label)?;
            if spec_next.is_empty() {
                return Ok((
                    violated(prefix, Violation::UnexpectedStep(label)),
                    Vec::new(),
                ));
            }
            if label == Label::Tick {
                continue;
            }
            let imp_next = ex.step(&imp, &label)?;
            let mut next_prefix = prefix.clone();
            next_prefix.push(label);
            queue.push_back((imp_next, spec_next, next_prefix));
        }
    }

    let restrictive = offered
        .into_iter()
        .filter(|l| !performed.contains(l))
        .collect();
    Ok((Verdict::Refines, restrictive))
}

fn violated(prefix: Vec<Label>, violation: Violation) -> Verdict {
    Verdict::Violated(Counterexample { prefix, violation })
}

/// Interned state space shared by both sides of a check.
struct Explorer<'p> {
    program: &'p Program,
    states: IndexSet<TraceNode>,
    successors: Vec<Option<Vec<(Move, usize)>>>,
    max_states: usize,
}

impl<'p> Explorer<'p> {
    fn new(program: &'p Program, max_states: usize) -> Self {
        Self {
            program,
            states: IndexSet::new(),
            successors: Vec::new(),
            max_states,
        }
    }

    fn intern(&mut self, node: TraceNode) -> Result<usize, Exhausted> {
        if let Some(id) = self.states.get_index_of(&node) {
            return Ok(id);
        }
        if self.states.len() >= self.max_states {
            return Err(Exhausted);
        }
        let (id, _) = self.states.insert_full(node);
        self.successors.push(None);
        Ok(id)
    }

    fn successors(&mut self, id: usize) -> Result<Vec<(Move, usize)>, Exhausted> {
        if let Some(Some(cached)) = self.successors.get(id) {
            return Ok(cached.clone());
        }
        let Some(node) = self.states.get_index(id).cloned() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for (mv, next) in transitions(self.program, &node) {
            out.push((mv, self.intern(simplify(&next))?));
        }
        if let Some(slot) = self.successors.get_mut(id) {
            *slot = Some(out.clone());
        }
        Ok(out)
    }

    fn closure(&mut self, seeds: impl IntoIterator<Item = usize>) -> Result<StateSet, Exhausted> {
        let mut seen = StateSet::new();
        let mut stack: Vec<usize> = seeds.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            for (mv, next) in self.successors(id)? {
                if mv == Move::Tau {
                    stack.push(next);
                }
            }
        }
        Ok(seen)
    }

    fn labels(&mut self, set: &StateSet) -> Result<IndexSet<Label>, Exhausted> {
        let mut out = IndexSet::new();
        for &id in set {
            for (mv, _) in self.successors(id)? {
                if let Move::Visible(label) = mv {
                    out.insert(label);
                }
            }
        }
        Ok(out)
    }

    fn step(&mut self, set: &StateSet, label: &Label) -> Result<StateSet, Exhausted> {
        let mut targets = Vec::new();
        for &id in set {
            for (mv, next) in self.successors(id)? {
                if mv == Move::Visible(*label) {
                    targets.push(next);
                }
            }
        }
        self.closure(targets)
    }

    /// Divergence is either an explicit `Div` or a cycle of silent moves.
    fn diverges(&mut self, set: &StateSet) -> Result<bool, Exhausted> {
        Ok(self.any(set, diverges) || self.silent_cycle(set)?)
    }

    /// Whether the silent moves among the tau-closed `set` form a cycle.
    fn silent_cycle(&mut self, set: &StateSet) -> Result<bool, Exhausted> {
        let mut edges: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &id in set {
            let targets = self
                .successors(id)?
                .into_iter()
                .filter(|(mv, next)| *mv == Move::Tau && set.contains(next))
                .map(|(_, next)| next)
                .collect();
            edges.insert(id, targets);
        }
        // Peel off states whose silent successors are all acyclic.
        let mut acyclic = StateSet::new();
        loop {
            let before = acyclic.len();
            for (id, targets) in &edges {
                if !acyclic.contains(id) && targets.iter().all(|t| acyclic.contains(t)) {
                    acyclic.insert(*id);
                }
            }
            if acyclic.len() == before {
                break;
            }
        }
        Ok(acyclic.len() < edges.len())
    }

    fn any(&self, set: &StateSet, pred: fn(&TraceNode) -> bool) -> bool {
        set.iter()
            .filter_map(|&id| self.states.get_index(id))
            .any(pred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{AtomOrigin, ChanRef, CompilationContext};
    use tracesem_ast::{DeclId, NodeId};

    struct Chans {
        program: Program,
        c: ChanRef,
        d: ChanRef,
    }

    fn chans() -> Chans {
        let mut program = Program::new("refine");
        let c = ChanRef::new(program.channel("c"));
        let d = ChanRef::new(program.channel("d"));
        Chans { program, c, d }
    }

    fn check(p: &Program, spec: &TraceNode, imp: &TraceNode) -> RefinementReport {
        refines(p, spec, imp, 10_000)
    }

    #[test]
    fn identical_sequences_refine() {
        let f = chans();
        let t = TraceNode::Seq(vec![TraceNode::Output(f.c), TraceNode::Input(f.d)]);
        let report = check(&f.program, &t, &t);
        assert!(report.holds());
        assert!(report.restrictive.is_empty());
    }

    #[test]
    fn unexpected_event_reports_shortest_prefix() {
        let f = chans();
        let spec = TraceNode::Seq(vec![TraceNode::Output(f.c), TraceNode::Output(f.c)]);
        let imp = TraceNode::Seq(vec![TraceNode::Output(f.c), TraceNode::Output(f.d)]);
        let report = check(&f.program, &spec, &imp);
        let Verdict::Violated(cex) = report.verdict else {
            panic!("expected a violation, got {:?}", report.verdict);
        };
        assert_eq!(cex.prefix.len(), 1);
        assert_eq!(cex.describe(&f.program), "after <c!> it may perform d!");
    }

    #[test]
    fn early_termination_is_a_violation() {
        let f = chans();
        let spec = TraceNode::Output(f.c);
        let report = check(&f.program, &spec, &TraceNode::Skip);
        assert!(matches!(
            report.verdict,
            Verdict::Violated(Counterexample {
                violation: Violation::UnexpectedStep(Label::Tick),
                ..
            })
        ));
    }

    #[test]
    fn div_needs_divergent_contract() {
        let f = chans();
        let report = check(&f.program, &TraceNode::Skip, &TraceNode::Div);
        assert!(matches!(
            report.verdict,
            Verdict::Violated(Counterexample {
                violation: Violation::Divergence,
                ..
            })
        ));
        assert!(check(&f.program, &TraceNode::Div, &TraceNode::Div).holds());
    }

    #[test]
    fn silent_cycle_is_divergence() {
        let f = chans();
        let mut ctx = CompilationContext::new();
        let a = ctx.fresh_atom(AtomOrigin::Loop(NodeId(0)));
        let spin = TraceNode::fixpoint(a, TraceNode::AtomRef(a.id));
        let report = check(&f.program, &TraceNode::Skip, &spin);
        assert_eq!(
            report.verdict,
            Verdict::Violated(Counterexample {
                prefix: Vec::new(),
                violation: Violation::Divergence,
            })
        );
        assert!(check(&f.program, &TraceNode::Div, &spin).holds());
        assert!(check(&f.program, &spin, &TraceNode::Div).holds());

        // A silent cycle reached only after a visible step.
        let b = ctx.fresh_atom(AtomOrigin::Loop(NodeId(1)));
        let late = TraceNode::Seq(vec![
            TraceNode::Output(f.c),
            TraceNode::fixpoint(
                b,
                TraceNode::Ndet(vec![TraceNode::Skip, TraceNode::AtomRef(b.id)]),
            ),
        ]);
        let spec = TraceNode::Seq(vec![TraceNode::Output(f.c), TraceNode::Skip]);
        let Verdict::Violated(cex) = check(&f.program, &spec, &late).verdict else {
            panic!("expected divergence after c!");
        };
        assert_eq!(cex.describe(&f.program), "after <c!> it may diverge");
    }

    #[test]
    fn guarded_recursion_is_not_divergence() {
        let f = chans();
        let mut ctx = CompilationContext::new();
        let a = ctx.fresh_atom(AtomOrigin::Loop(NodeId(0)));
        let ticker = TraceNode::fixpoint(
            a,
            TraceNode::Seq(vec![TraceNode::Output(f.c), TraceNode::AtomRef(a.id)]),
        );
        assert!(check(&f.program, &ticker, &ticker).holds());
    }

    #[test]
    fn chaos_contract_accepts_anything() {
        let f = chans();
        let imp = TraceNode::Par(vec![TraceNode::Div, TraceNode::Output(f.d), TraceNode::Chaos]);
        assert!(check(&f.program, &TraceNode::Chaos, &imp).holds());
    }

    #[test]
    fn unresolved_behaviour_is_unconstrained() {
        let f = chans();
        let report = check(&f.program, &TraceNode::Skip, &TraceNode::NodeRef(NodeId(3)));
        assert!(matches!(
            report.verdict,
            Verdict::Violated(Counterexample {
                violation: Violation::Unconstrained,
                ..
            })
        ));
    }

    #[test]
    fn internal_choice_refines_external_choice_offering_both() {
        let f = chans();
        let spec = TraceNode::Det(vec![TraceNode::Output(f.c), TraceNode::Output(f.d)]);
        let imp = TraceNode::Ndet(vec![TraceNode::Output(f.c), TraceNode::Output(f.d)]);
        assert!(check(&f.program, &spec, &imp).holds());
    }

    #[test]
    fn narrower_behaviour_is_flagged_restrictive() {
        let f = chans();
        let spec = TraceNode::Det(vec![TraceNode::Output(f.c), TraceNode::Output(f.d)]);
        let report = check(&f.program, &spec, &TraceNode::Output(f.c));
        assert!(report.holds());
        assert_eq!(report.restrictive.len(), 1);
        assert_eq!(report.restrictive[0].describe(&f.program), "d!");
    }

    #[test]
    fn loop_refines_matching_recursive_contract() {
        let f = chans();
        let mut ctx = CompilationContext::new();
        let a = ctx.fresh_atom(AtomOrigin::Loop(NodeId(0)));
        let b = ctx.fresh_atom(AtomOrigin::Contract(DeclId(0)));
        let imp = TraceNode::fixpoint(
            a,
            TraceNode::Seq(vec![TraceNode::Output(f.c), TraceNode::AtomRef(a.id)]),
        );
        let spec = TraceNode::fixpoint(
            b,
            TraceNode::Seq(vec![
                TraceNode::Output(f.c),
                TraceNode::Ndet(vec![TraceNode::AtomRef(b.id), TraceNode::Skip]),
            ]),
        );
        assert!(check(&f.program, &spec, &imp).holds());
        assert!(!check(&f.program, &imp, &spec).holds());
    }

    #[test]
    fn state_bound_gives_inconclusive() {
        let f = chans();
        let mut ctx = CompilationContext::new();
        let a = ctx.fresh_atom(AtomOrigin::Loop(NodeId(0)));
        // Unguarded parallel recursion grows without bound.
        let imp = TraceNode::fixpoint(
            a,
            TraceNode::Par(vec![TraceNode::Output(f.c), TraceNode::AtomRef(a.id)]),
        );
        let spec = TraceNode::fixpoint(
            a,
            TraceNode::Seq(vec![TraceNode::Output(f.c), TraceNode::AtomRef(a.id)]),
        );
        let report = refines(&f.program, &spec, &imp, 50);
        assert_eq!(report.verdict, Verdict::Inconclusive);
    }
}
