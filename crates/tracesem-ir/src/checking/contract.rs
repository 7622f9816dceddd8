//! Declared contracts: lowering to trace expressions and checking.

use thiserror::Error;
use tracesem_ast::{DeclId, Program, Spanned, TraceSpec};

use super::Checker;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::refinement::{refines, Verdict, Violation};
use crate::state::CheckerState;
use crate::trace::{Atom, AtomOrigin, ChanRef, CompilationContext, TraceNode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("recursion variable '{0}' is not bound by an enclosing rec")]
    UnboundVariable(String),
}

/// Lower the contract of `decl` to a trace expression.
///
/// Each `rec` gets a fresh atom; a variable refers to the innermost
/// enclosing `rec` of the same name.
pub fn lower_contract(
    program: &Program,
    ctx: &mut CompilationContext,
    decl: DeclId,
    spec: &TraceSpec,
) -> Result<TraceNode, ContractError> {
    let mut scope = Vec::new();
    lower(program, ctx, decl, spec, &mut scope)
}

fn lower(
    program: &Program,
    ctx: &mut CompilationContext,
    decl: DeclId,
    spec: &TraceSpec,
    scope: &mut Vec<(String, Atom)>,
) -> Result<TraceNode, ContractError> {
    Ok(match spec {
        TraceSpec::Skip => TraceNode::Skip,
        TraceSpec::Stop => TraceNode::Stop,
        TraceSpec::Div => TraceNode::Div,
        TraceSpec::Chaos => TraceNode::Chaos,
        TraceSpec::Input(chan) => TraceNode::Input(ChanRef::from_expr(program, *chan)),
        TraceSpec::Output(chan) => TraceNode::Output(ChanRef::from_expr(program, *chan)),
        TraceSpec::Seq(c) => TraceNode::Seq(lower_all(program, ctx, decl, c, scope)?),
        TraceSpec::Par(c) => TraceNode::Par(lower_all(program, ctx, decl, c, scope)?),
        TraceSpec::Det(c) => TraceNode::Det(lower_all(program, ctx, decl, c, scope)?),
        TraceSpec::Ndet(c) => TraceNode::Ndet(lower_all(program, ctx, decl, c, scope)?),
        TraceSpec::Rec { var, body } => {
            let atom = ctx.fresh_atom(AtomOrigin::Contract(decl));
            scope.push((var.clone(), atom));
            let body = lower(program, ctx, decl, body, scope);
            scope.pop();
            TraceNode::fixpoint(atom, body?)
        }
        TraceSpec::Var(name) => match scope.iter().rev().find(|(v, _)| v == name) {
            Some((_, atom)) => TraceNode::AtomRef(atom.id),
            None => return Err(ContractError::UnboundVariable(name.clone())),
        },
    })
}

fn lower_all(
    program: &Program,
    ctx: &mut CompilationContext,
    decl: DeclId,
    children: &[TraceSpec],
    scope: &mut Vec<(String, Atom)>,
) -> Result<Vec<TraceNode>, ContractError> {
    children
        .iter()
        .map(|c| lower(program, ctx, decl, c, scope))
        .collect()
}

impl Checker<'_> {
    /// Check `computed` against the declared contract, reporting into `state`.
    pub(super) fn check_contract(
        &mut self,
        state: &mut CheckerState,
        decl: DeclId,
        contract: &Spanned<TraceSpec>,
        computed: &TraceNode,
    ) {
        let program = self.program;
        let name = &program.decl(decl).name;
        let spec = match lower_contract(program, self.ctx, decl, &contract.node) {
            Ok(spec) => spec,
            Err(err) => {
                state.report(
                    Diagnostic::error(DiagnosticCode::UnboundContractVariable, err.to_string())
                        .at(contract.span),
                );
                return;
            }
        };

        let report = refines(program, &spec, computed, self.options.max_refinement_states);
        tracing::debug!(
            decl = %name,
            states = report.states_explored,
            holds = report.holds(),
            "contract checked"
        );
        match &report.verdict {
            Verdict::Refines if state.is_approximate() => {
                tracing::warn!(decl = %name, "contract holds only for an approximated trace");
                state.report(
                    Diagnostic::warning(
                        DiagnosticCode::Inconclusive,
                        format!(
                            "contract of '{name}' cannot be confirmed: a recursive instance \
                             changes its channels"
                        ),
                    )
                    .at(contract.span),
                );
                return;
            }
            Verdict::Refines => {}
            Verdict::Violated(cex) => {
                let code = match cex.violation {
                    Violation::UnexpectedStep(_) => DiagnosticCode::RefinementViolation,
                    Violation::Divergence => DiagnosticCode::Divergence,
                    Violation::Unconstrained => DiagnosticCode::Unconstrained,
                };
                state.report(
                    Diagnostic::error(
                        code,
                        format!(
                            "'{name}' does not meet its contract: {}",
                            cex.describe(program)
                        ),
                    )
                    .at(contract.span)
                    .with_help(format!("computed behaviour: {}", computed.display_with(program))),
                );
            }
            Verdict::Inconclusive => {
                tracing::warn!(
                    decl = %name,
                    bound = self.options.max_refinement_states,
                    "refinement check inconclusive"
                );
                state.report(
                    Diagnostic::warning(
                        DiagnosticCode::Inconclusive,
                        format!(
                            "contract of '{name}' could not be checked within {} states",
                            self.options.max_refinement_states
                        ),
                    )
                    .at(contract.span),
                );
            }
        }

        if report.holds() && self.options.report_restrictive && !report.restrictive.is_empty() {
            let steps: Vec<String> = report
                .restrictive
                .iter()
                .map(|l| l.describe(program))
                .collect();
            state.report(
                Diagnostic::warning(
                    DiagnosticCode::OverlyRestrictive,
                    format!(
                        "'{name}' never performs {} although its contract allows it",
                        steps.join(", ")
                    ),
                )
                .at(contract.span),
            );
        }
    }
}
