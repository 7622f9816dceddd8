//! Procedure instances and procedure bodies.

use tracesem_ast::{Arg, DeclId, ExprId, NameId, NodeId};

use super::{lower_contract, CheckError, Checker};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::simplify::simplify;
use crate::state::{CheckerState, ScopeOwner};
use crate::substitute::{Substitution, SubstitutionError};
use crate::trace::{AtomOrigin, ChanRef, TraceNode, TraceSet};

/// Built-in procedures without a body and the fragment each contributes.
fn intrinsic(name: &str) -> Option<Option<TraceNode>> {
    match name {
        "CAUSEERROR" => Some(Some(TraceNode::Stop)),
        "RESCHEDULE" | "SETPRI" | "INCPRI" | "DECPRI" | "SETAFF" | "GETAFF" | "GETPRI" => {
            Some(None)
        }
        _ => None,
    }
}

/// Traces of a checked procedure body.
pub(super) struct DeclCheck {
    /// As computed, before interface projection.
    pub(super) traces: TraceSet,
    /// Communications on non-interface channels hidden.
    pub(super) projected: TraceSet,
}

impl Checker<'_> {
    pub(super) fn check_call(
        &mut self,
        node: NodeId,
        decl: DeclId,
        args: &[Arg],
    ) -> Result<(), CheckError> {
        if !self.program.contains_decl(decl) {
            return Err(CheckError::UnknownDecl(decl));
        }
        let program = self.program;
        let callee = program.decl(decl);
        let subst = Substitution::for_call(program, decl, args).map_err(|err| match err {
            SubstitutionError::ArityMismatch { formals, actuals } => CheckError::ArityMismatch {
                callee: callee.name.clone(),
                node,
                formals,
                actuals,
            },
        })?;

        if let Some(pos) = self.states.iter().position(|s| s.decl() == Some(decl)) {
            return self.check_recursive_call(node, decl, pos, &subst);
        }

        if callee.body.is_none() {
            if let Some(fragment) = intrinsic(&callee.name) {
                return match fragment {
                    Some(fragment) => self.emit(node, fragment),
                    None => Ok(()),
                };
            }
        }
        let stored = self.store.get(decl).cloned();
        let traces = match stored {
            Some(traces) => traces,
            None if callee.body.is_some() || callee.contract.is_some() => {
                tracing::debug!(callee = %callee.name, "checking callee on demand");
                self.check_decl(decl, Some(subst.clone()))?.projected
            }
            None => {
                let span = self.span_of(node);
                self.report(
                    Diagnostic::warning(
                        DiagnosticCode::UnresolvedCallee,
                        format!("behaviour of '{}' is unknown", callee.name),
                    )
                    .at(span)
                    .with_help("declare a contract for the procedure"),
                )?;
                return self.emit(node, TraceNode::NodeRef(node));
            }
        };

        match subst.apply_set(program, &traces).to_choice() {
            Some(choice) => self.emit(node, choice),
            None => Ok(()),
        }
    }

    /// Instance of a procedure whose body is still being walked.
    ///
    /// The instance is folded back onto the procedure's own atom, which is
    /// exact only when every channel reaches the recursive instance
    /// unchanged. Otherwise the procedure's state is marked approximate and
    /// a warning is raised.
    fn check_recursive_call(
        &mut self,
        node: NodeId,
        decl: DeclId,
        pos: usize,
        subst: &Substitution,
    ) -> Result<(), CheckError> {
        let program = self.program;
        let callee = program.decl(decl);
        let altered: Vec<&str> = callee
            .visible_params()
            .filter(|param| param.is_channel)
            .filter(|param| {
                !subst
                    .actual_for(param.name)
                    .is_some_and(|actual| self.passes_through(pos, param.name, actual))
            })
            .map(|param| program.name(param.name).name.as_str())
            .collect();
        if !altered.is_empty() {
            let diagnostic = Diagnostic::warning(
                DiagnosticCode::PermutedRecursion,
                format!(
                    "recursive instance of '{}' does not pass {} through unchanged",
                    callee.name,
                    altered.join(", ")
                ),
            )
            .at(self.span_of(node))
            .with_help("the computed trace assumes the channels are unchanged");
            // Callee states walked in between may be discarded.
            let state = self.states.get_mut(pos).ok_or(CheckError::NoActiveState)?;
            state.report(diagnostic);
            state.mark_approximate();
        }

        let ctx = &mut *self.ctx;
        let atom = match self.states.get_mut(pos) {
            Some(state) => {
                state.recursion_atom_or_insert(|| ctx.fresh_atom(AtomOrigin::Recursion(decl)))
            }
            None => return Err(CheckError::NoActiveState),
        };
        tracing::debug!(callee = %callee.name, atom = %atom.id, "recursive instance");
        self.emit(node, TraceNode::AtomRef(atom.id))
    }

    /// Whether `actual`, seen from the innermost scope, denotes `formal` of
    /// the procedure whose state is at `pos`.
    ///
    /// Formals of the procedures entered since then are mapped back through
    /// the instances that entered them.
    fn passes_through(&self, pos: usize, formal: NameId, actual: ExprId) -> bool {
        let program = self.program;
        let mut expr = actual;
        for state in self.states.iter().skip(pos + 1).rev() {
            let next = program
                .resolve_name(expr)
                .and_then(|name| state.entry()?.actual_for(name));
            if let Some(next) = next {
                expr = next;
            }
        }
        program.resolve_name(expr) == Some(formal)
    }

    /// Walk a procedure body in a fresh state, check its contract and
    /// attach its projected trace.
    ///
    /// `entry` is the instance that triggered the check, if any. A trace
    /// that still refers to another procedure in progress is returned but
    /// neither attached nor checked; the procedure is checked
    /// again once that dependency is complete.
    pub(super) fn check_decl(
        &mut self,
        decl: DeclId,
        entry: Option<Substitution>,
    ) -> Result<DeclCheck, CheckError> {
        if !self.program.contains_decl(decl) {
            return Err(CheckError::UnknownDecl(decl));
        }
        let program = self.program;
        let proc_decl = program.decl(decl);
        tracing::debug!(decl = %proc_decl.name, "checking procedure");
        let Some(body) = proc_decl.body else {
            return self.check_external_decl(decl);
        };

        let mut state = CheckerState::new(ScopeOwner::Proc(decl));
        if let Some(entry) = entry {
            state = state.with_entry(entry);
        }
        for param in proc_decl.visible_params().filter(|p| p.is_channel) {
            state.add_interface(param.name);
        }
        self.states.push(state);
        let fragment = self.collect_single("procedure body", body, body)?;
        let mut state = self.states.pop().ok_or(CheckError::NoActiveState)?;

        let mut trace = fragment.unwrap_or(TraceNode::Skip);
        if let Some(atom) = state.recursion_atom() {
            trace = TraceNode::fixpoint(atom, trace);
        }
        let trace = self.finish(trace);
        let projected = if self.options.project_interface {
            let keep = |chan: ChanRef| {
                program
                    .resolve_name(chan.root)
                    .is_some_and(|name| state.is_interface(name))
            };
            simplify(&trace.hide_channels(&keep))
        } else {
            trace.clone()
        };

        if !projected.free_atoms().is_empty() {
            tracing::debug!(
                decl = %proc_decl.name,
                "trace depends on a procedure in progress; not attaching"
            );
        } else {
            if let Some(contract) = &proc_decl.contract {
                self.check_contract(&mut state, decl, contract, &projected);
            }
            self.diagnostics.extend(state.take_diagnostics());
            self.store.attach(decl, TraceSet::single(projected.clone()));
        }

        Ok(DeclCheck {
            traces: TraceSet::single(trace),
            projected: TraceSet::single(projected),
        })
    }

    /// A procedure without a body is trusted to behave as its contract says.
    fn check_external_decl(&mut self, decl: DeclId) -> Result<DeclCheck, CheckError> {
        let program = self.program;
        let Some(contract) = &program.decl(decl).contract else {
            return Ok(DeclCheck {
                traces: TraceSet::default(),
                projected: TraceSet::default(),
            });
        };
        match lower_contract(program, self.ctx, decl, &contract.node) {
            Ok(trace) => {
                let traces = TraceSet::single(trace);
                self.store.attach(decl, traces.clone());
                Ok(DeclCheck {
                    traces: traces.clone(),
                    projected: traces,
                })
            }
            Err(err) => {
                self.diagnostics.push(
                    Diagnostic::error(DiagnosticCode::UnboundContractVariable, err.to_string())
                        .at(contract.span)
                        .in_decl(decl),
                );
                Ok(DeclCheck {
                    traces: TraceSet::default(),
                    projected: TraceSet::default(),
                })
            }
        }
    }
}
