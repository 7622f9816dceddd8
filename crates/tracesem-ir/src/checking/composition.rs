//! Sequential, parallel and replicated composition.

use tracesem_ast::{ConstFold, ExprId, NodeId};

use super::{CheckError, Checker};
use crate::trace::{AtomOrigin, TraceNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Composition {
    Seq,
    Par,
}

impl Composition {
    fn wrap(self, children: Vec<TraceNode>) -> TraceNode {
        match self {
            Composition::Seq => TraceNode::Seq(children),
            Composition::Par => TraceNode::Par(children),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Composition::Seq => "replicated SEQ",
            Composition::Par => "replicated PAR",
        }
    }
}

impl Checker<'_> {
    /// An empty SEQ still emits `Seq([])`, the identity.
    pub(super) fn check_seq(&mut self, node: NodeId, children: &[NodeId]) -> Result<(), CheckError> {
        let fragments = self.collect(node, children)?;
        self.emit(node, TraceNode::Seq(fragments))
    }

    pub(super) fn check_par(&mut self, node: NodeId, children: &[NodeId]) -> Result<(), CheckError> {
        let fragments = self.collect(node, children)?;
        self.emit(node, TraceNode::Par(fragments))
    }

    /// Replicated SEQ or PAR over `count` copies of `body`.
    ///
    /// A non-positive constant count contributes nothing and leaves the body
    /// unwalked. Counts that are unknown or too large to unroll become zero
    /// or more repetitions.
    pub(super) fn check_replicated(
        &mut self,
        node: NodeId,
        composition: Composition,
        count: ExprId,
        body: NodeId,
    ) -> Result<(), CheckError> {
        let folded = self.program.constant_value(count);
        if matches!(folded, Some(n) if n <= 0) {
            return Ok(());
        }
        let Some(fragment) = self.collect_single(composition.name(), node, body)? else {
            return Ok(());
        };
        let unrolled = folded
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n <= self.options.max_replication_unroll);
        let trace = match unrolled {
            Some(n) => composition.wrap(vec![fragment; n]),
            None => {
                let atom = self.ctx.fresh_atom(AtomOrigin::Replication(node));
                TraceNode::fixpoint(
                    atom,
                    TraceNode::Ndet(vec![
                        TraceNode::Skip,
                        composition.wrap(vec![fragment, TraceNode::AtomRef(atom.id)]),
                    ]),
                )
            }
        };
        self.emit(node, trace)
    }
}
