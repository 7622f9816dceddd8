//! Loops, conditionals and alternation.
//!
//! Static uncertainty about a guard becomes internal choice in the trace;
//! a loop that provably never exits without doing anything becomes `Div`.

use tracesem_ast::{AltArm, AltTrigger, CondArm, ConstFold, ExprId, NodeId};

use super::{CheckError, Checker};
use crate::trace::{AtomOrigin, ChanRef, TraceNode};

impl Checker<'_> {
    pub(super) fn check_while(
        &mut self,
        node: NodeId,
        guard: ExprId,
        body: NodeId,
    ) -> Result<(), CheckError> {
        let truth = self.program.constant_truth(guard);
        if truth == Some(false) {
            return Ok(());
        }
        let fragment = self.collect_single("WHILE", node, body)?;
        let trace = match (truth, fragment) {
            (Some(true), None) => TraceNode::Div,
            (Some(true), Some(body)) => {
                let atom = self.ctx.fresh_atom(AtomOrigin::Loop(node));
                TraceNode::fixpoint(
                    atom,
                    TraceNode::Seq(vec![body, TraceNode::AtomRef(atom.id)]),
                )
            }
            (_, body) => {
                let atom = self.ctx.fresh_atom(AtomOrigin::Loop(node));
                TraceNode::fixpoint(
                    atom,
                    TraceNode::Ndet(vec![
                        body.unwrap_or(TraceNode::Skip),
                        TraceNode::AtomRef(atom.id),
                    ]),
                )
            }
        };
        self.emit(node, trace)
    }

    pub(super) fn check_if(&mut self, node: NodeId, arms: &[CondArm]) -> Result<(), CheckError> {
        if let [arm] = arms {
            return self.check_single_if(node, arm);
        }

        let mut alternatives: Vec<TraceNode> = Vec::new();
        let mut decided = false;
        for arm in arms {
            let truth = self.program.constant_truth(arm.guard);
            if truth == Some(false) {
                continue;
            }
            let fragment = self.collect_single("IF", node, arm.body)?;
            alternatives.push(fragment.unwrap_or(TraceNode::Skip));
            if truth == Some(true) {
                decided = true;
                break;
            }
        }
        if !decided {
            alternatives.push(TraceNode::Skip);
        }
        let trace = match alternatives.len() {
            1 => alternatives.remove(0),
            _ => TraceNode::Ndet(alternatives),
        };
        self.emit(node, trace)
    }

    fn check_single_if(&mut self, node: NodeId, arm: &CondArm) -> Result<(), CheckError> {
        let truth = self.program.constant_truth(arm.guard);
        if truth == Some(false) {
            return Ok(());
        }
        let Some(fragment) = self.collect_single("IF", node, arm.body)? else {
            return Ok(());
        };
        let trace = match truth {
            Some(true) => fragment,
            _ => TraceNode::Ndet(vec![fragment, TraceNode::Skip]),
        };
        self.emit(node, trace)
    }

    /// External choice between the enabled arms; no enabled arm is `Stop`.
    pub(super) fn check_alt(&mut self, node: NodeId, arms: &[AltArm]) -> Result<(), CheckError> {
        let mut choices = Vec::new();
        for arm in arms {
            let disabled = arm
                .precondition
                .is_some_and(|pre| self.program.constant_truth(pre) == Some(false));
            if disabled {
                continue;
            }
            let body = self.collect_single("ALT", node, arm.body)?;
            let choice = match (arm.trigger, body) {
                (AltTrigger::Input(chan), body) => {
                    let input = TraceNode::Input(ChanRef::from_expr(self.program, chan));
                    match body {
                        Some(body) => TraceNode::Seq(vec![input, body]),
                        None => input,
                    }
                }
                (AltTrigger::Skip, body) => body.unwrap_or(TraceNode::Skip),
            };
            choices.push(choice);
        }
        let trace = if choices.is_empty() {
            TraceNode::Stop
        } else {
            TraceNode::Det(choices)
        };
        self.emit(node, trace)
    }
}
