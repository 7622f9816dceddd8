//! Rewriting formal-parameter channel references into call-site arguments.

use indexmap::IndexMap;
use thiserror::Error;
use tracesem_ast::{Arg, DeclId, Expr, ExprId, NameId, Program};

use crate::trace::{ChanRef, TraceNode, TraceSet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstitutionError {
    #[error("{formals} visible formal parameters but {actuals} visible actual arguments")]
    ArityMismatch { formals: usize, actuals: usize },
}

/// Formal-to-actual mapping for one call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    map: IndexMap<NameId, ExprId>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair the callee's visible formals with the visible actuals, in order.
    pub fn for_call(
        program: &Program,
        callee: DeclId,
        args: &[Arg],
    ) -> Result<Self, SubstitutionError> {
        let formals: Vec<NameId> = program
            .decl(callee)
            .visible_params()
            .map(|p| p.name)
            .collect();
        let actuals: Vec<ExprId> = args.iter().filter(|a| !a.hidden).map(|a| a.expr).collect();
        if formals.len() != actuals.len() {
            return Err(SubstitutionError::ArityMismatch {
                formals: formals.len(),
                actuals: actuals.len(),
            });
        }
        Ok(Self {
            map: formals.into_iter().zip(actuals).collect(),
        })
    }

    pub fn insert(&mut self, formal: NameId, actual: ExprId) {
        self.map.insert(formal, actual);
    }

    pub fn actual_for(&self, formal: NameId) -> Option<ExprId> {
        self.map.get(&formal).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn apply(&self, program: &Program, node: &TraceNode) -> TraceNode {
        if self.map.is_empty() {
            return node.clone();
        }
        node.map_channels(&mut |chan| self.rewrite(program, chan))
    }

    pub fn apply_set(&self, program: &Program, traces: &TraceSet) -> TraceSet {
        traces.map(|n| self.apply(program, n))
    }

    fn rewrite(&self, program: &Program, chan: ChanRef) -> ChanRef {
        let Some(formal) = program.resolve_name(chan.root) else {
            return chan;
        };
        let Some(actual) = self.actual_for(formal) else {
            return chan;
        };
        let target = program.strip_decorations(actual);
        // Passing a formal straight through leaves the reference untouched.
        if program.resolve_name(target) == Some(formal) {
            return chan;
        }
        match (program.expr(target), chan.index) {
            (Expr::Subscript { base, index }, None) => ChanRef {
                root: program.strip_decorations(*base),
                index: Some(*index),
            },
            (_, index) => ChanRef {
                root: target,
                index,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracesem_ast::{Decoration, Span};

    struct Fixture {
        program: Program,
        callee: DeclId,
        formal_refs: Vec<ExprId>,
    }

    fn fixture(n: usize) -> Fixture {
        let mut program = Program::new("subst");
        let callee = program.declare_proc("worker", Span::default());
        let mut formal_refs = Vec::new();
        for i in 0..n {
            let name = program.add_param(callee, format!("f{i}"), true, false, Span::default());
            formal_refs.push(program.name_ref(name));
        }
        Fixture {
            program,
            callee,
            formal_refs,
        }
    }

    #[test]
    fn each_formal_maps_to_its_own_actual() {
        let mut fx = fixture(3);
        let actuals: Vec<ExprId> = (0..3).map(|i| fx.program.channel(format!("x{i}"))).collect();
        let args: Vec<Arg> = actuals
            .iter()
            .map(|&expr| Arg {
                expr,
                hidden: false,
            })
            .collect();
        let subst = Substitution::for_call(&fx.program, fx.callee, &args).unwrap();

        let trace = TraceNode::Seq(vec![
            TraceNode::Output(ChanRef::new(fx.formal_refs[2])),
            TraceNode::Input(ChanRef::new(fx.formal_refs[0])),
        ]);
        let out = subst.apply(&fx.program, &trace);
        assert_eq!(
            out,
            TraceNode::Seq(vec![
                TraceNode::Output(ChanRef::new(actuals[2])),
                TraceNode::Input(ChanRef::new(actuals[0])),
            ])
        );
    }

    #[test]
    fn hidden_parameters_are_skipped_on_both_sides() {
        let mut fx = fixture(1);
        fx.program
            .add_param(fx.callee, "f0.size", false, true, Span::default());
        let x = fx.program.channel("x");
        let size = fx.program.int(4);
        let args = [
            Arg {
                expr: x,
                hidden: false,
            },
            Arg {
                expr: size,
                hidden: true,
            },
        ];
        let subst = Substitution::for_call(&fx.program, fx.callee, &args).unwrap();
        assert_eq!(subst.len(), 1);
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let mut fx = fixture(2);
        let x = fx.program.channel("x");
        let err = Substitution::for_call(
            &fx.program,
            fx.callee,
            &[Arg {
                expr: x,
                hidden: false,
            }],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SubstitutionError::ArityMismatch {
                formals: 2,
                actuals: 1
            }
        );
    }

    #[test]
    fn decorations_on_actuals_are_unwrapped() {
        let mut fx = fixture(1);
        let x = fx.program.channel("x");
        let out_end = fx.program.decorate(x, Decoration::OutputEnd);
        let wrapped = fx.program.decorate(out_end, Decoration::Paren);
        let mut subst = Substitution::new();
        let formal = fx.program.resolve_name(fx.formal_refs[0]).unwrap();
        subst.insert(formal, wrapped);

        let trace = TraceNode::Output(ChanRef::new(fx.formal_refs[0]));
        assert_eq!(
            subst.apply(&fx.program, &trace),
            TraceNode::Output(ChanRef::new(x))
        );
    }

    #[test]
    fn array_element_actual_becomes_indexed_reference() {
        let mut fx = fixture(1);
        let arr = fx.program.channel("cs");
        let two = fx.program.int(2);
        let elem = fx.program.subscript(arr, two);
        let mut subst = Substitution::new();
        let formal = fx.program.resolve_name(fx.formal_refs[0]).unwrap();
        subst.insert(formal, elem);

        let trace = TraceNode::Input(ChanRef::new(fx.formal_refs[0]));
        assert_eq!(
            subst.apply(&fx.program, &trace),
            TraceNode::Input(ChanRef {
                root: arr,
                index: Some(two)
            })
        );
    }

    #[test]
    fn identity_substitution_preserves_structure() {
        let mut fx = fixture(2);
        let args: Vec<ExprId> = (0..2)
            .map(|i| {
                let formal = fx.program.resolve_name(fx.formal_refs[i]).unwrap();
                fx.program.name_ref(formal)
            })
            .collect();
        let args: Vec<Arg> = args
            .into_iter()
            .map(|expr| Arg {
                expr,
                hidden: false,
            })
            .collect();
        let subst = Substitution::for_call(&fx.program, fx.callee, &args).unwrap();
        let trace = TraceNode::Par(vec![
            TraceNode::Input(ChanRef::new(fx.formal_refs[0])),
            TraceNode::Output(ChanRef::new(fx.formal_refs[1])),
        ]);
        assert_eq!(subst.apply(&fx.program, &trace), trace);
    }
}
