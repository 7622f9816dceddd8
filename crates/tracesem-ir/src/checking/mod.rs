//! The construct-handler walk.
//!
//! [`check`] walks one top-level unit in source order. Each handler emits at
//! most one fragment into the innermost bucket of the active
//! [`CheckerState`]; composite handlers open a bucket of their own, walk
//! their children into it, and assemble the drained fragments.

mod composition;
mod contract;
mod control;
mod instance;
mod validation;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracesem_ast::{DeclId, NodeId, Process, Program, Span, Unit};

use crate::bucket::Bucket;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::options::{CheckerOptions, FragmentPolicy};
use crate::simplify::simplify;
use crate::state::{CheckerState, ScopeOwner};
use crate::store::DeclTraces;
use crate::trace::{ChanRef, CompilationContext, TraceNode, TraceSet};

pub use contract::{lower_contract, ContractError};
use validation::find_span_for_error;

/// Internal-consistency failures. These abort the walk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("{construct} at {node} collected {count} fragments where at most one is expected")]
    ExcessFragments {
        construct: String,
        node: NodeId,
        count: usize,
    },
    #[error(
        "instance of '{callee}' at {node} passes {actuals} visible arguments \
         for {formals} visible parameters"
    )]
    ArityMismatch {
        callee: String,
        node: NodeId,
        formals: usize,
        actuals: usize,
    },
    #[error("no open bucket to receive the fragment of {node}")]
    BucketUnderflow { node: NodeId },
    #[error("no active checker state")]
    NoActiveState,
    #[error("unknown declaration {0}")]
    UnknownDecl(DeclId),
    #[error("unknown process node {0}")]
    UnknownNode(NodeId),
}

/// A check error enriched with source span information for pretty-printed diagnostics.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("{inner}")]
#[diagnostic(code(tracesem::internal))]
pub struct SpannedCheckError {
    #[source_code]
    pub src: NamedSource<String>,
    pub inner: CheckError,
    #[label("here")]
    pub span: Option<SourceSpan>,
}

impl SpannedCheckError {
    fn new(err: CheckError, program: &Program) -> Self {
        let span = find_span_for_error(&err, program);
        let (filename, text) = match &program.source {
            Some(source) => (source.filename.clone(), source.text.clone()),
            None => (program.name.clone(), String::new()),
        };
        // Spans past the end of the attached text cannot be labelled.
        let span = span
            .filter(|s| s.end <= text.len())
            .map(|s| SourceSpan::new(s.start.into(), s.len()));
        Self {
            src: NamedSource::new(filename, text),
            inner: err,
            span,
        }
    }
}

/// Result of checking one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// The unit's behaviour before interface projection.
    pub traces: TraceSet,
    /// Diagnostics from the unit and from every callee checked on demand.
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Compute the behaviour of `unit`, checking contracts along the way.
///
/// Procedure traces computed here, for the unit itself or for callees
/// checked on demand, are attached to `store`.
pub fn check(
    program: &Program,
    unit: Unit,
    ctx: &mut CompilationContext,
    store: &mut DeclTraces,
    options: &CheckerOptions,
) -> Result<CheckOutcome, CheckError> {
    let mut checker = Checker::new(program, ctx, store, options);
    let traces = match unit {
        Unit::Proc(decl) => checker.check_decl(decl, None)?.traces,
        Unit::Process(node) => checker.check_process_unit(node)?,
    };
    Ok(CheckOutcome {
        traces,
        diagnostics: checker.diagnostics,
    })
}

/// [`check`], with internal errors carrying the program's source text.
#[allow(clippy::result_large_err)]
pub fn check_with_source(
    program: &Program,
    unit: Unit,
    ctx: &mut CompilationContext,
    store: &mut DeclTraces,
    options: &CheckerOptions,
) -> Result<CheckOutcome, SpannedCheckError> {
    check(program, unit, ctx, store, options).map_err(|err| SpannedCheckError::new(err, program))
}

pub(crate) struct Checker<'a> {
    program: &'a Program,
    ctx: &'a mut CompilationContext,
    store: &'a mut DeclTraces,
    options: &'a CheckerOptions,
    states: Vec<CheckerState>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Checker<'a> {
    fn new(
        program: &'a Program,
        ctx: &'a mut CompilationContext,
        store: &'a mut DeclTraces,
        options: &'a CheckerOptions,
    ) -> Self {
        Self {
            program,
            ctx,
            store,
            options,
            states: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn check_process_unit(&mut self, node: NodeId) -> Result<TraceSet, CheckError> {
        if !self.program.contains_node(node) {
            return Err(CheckError::UnknownNode(node));
        }
        self.states.push(CheckerState::new(ScopeOwner::Process(node)));
        let fragment = self.collect_single("process", node, node)?;
        let mut state = self.states.pop().ok_or(CheckError::NoActiveState)?;
        self.diagnostics.extend(state.take_diagnostics());
        Ok(TraceSet::single(self.finish(fragment.unwrap_or(TraceNode::Skip))))
    }

    fn finish(&self, trace: TraceNode) -> TraceNode {
        if self.options.simplify {
            simplify(&trace)
        } else {
            trace
        }
    }

    fn state_mut(&mut self) -> Result<&mut CheckerState, CheckError> {
        self.states.last_mut().ok_or(CheckError::NoActiveState)
    }

    fn report(&mut self, diagnostic: Diagnostic) -> Result<(), CheckError> {
        self.state_mut()?.report(diagnostic);
        Ok(())
    }

    /// Add `fragment` to the innermost open bucket.
    fn emit(&mut self, node: NodeId, fragment: TraceNode) -> Result<(), CheckError> {
        self.state_mut()?
            .emit(fragment)
            .ok_or(CheckError::BucketUnderflow { node })
    }

    fn walk(&mut self, node: NodeId) -> Result<(), CheckError> {
        if !self.program.contains_node(node) {
            return Err(CheckError::UnknownNode(node));
        }
        let program = self.program;
        let process = program.process(node);
        tracing::debug!(%node, kind = %process.kind(), "checking construct");
        match process {
            Process::Skip => self.emit(node, TraceNode::Skip),
            Process::Stop => self.emit(node, TraceNode::Stop),
            Process::Input { chan } => {
                self.emit(node, TraceNode::Input(ChanRef::from_expr(program, *chan)))
            }
            Process::Output { chan } => {
                self.emit(node, TraceNode::Output(ChanRef::from_expr(program, *chan)))
            }
            Process::Assign { .. } => Ok(()),
            Process::Seq(children) => self.check_seq(node, children),
            Process::Par(children) => self.check_par(node, children),
            Process::ReplSeq { count, body } => {
                self.check_replicated(node, composition::Composition::Seq, *count, *body)
            }
            Process::ReplPar { count, body } => {
                self.check_replicated(node, composition::Composition::Par, *count, *body)
            }
            Process::While { guard, body } => self.check_while(node, *guard, *body),
            Process::If { arms } => self.check_if(node, arms),
            Process::Alt { arms } => self.check_alt(node, arms),
            Process::Call { decl, args } => self.check_call(node, *decl, args),
            Process::Block { body, .. } => self.walk(*body),
        }
    }

    /// Walk `children` into a fresh bucket and return its fragments in order.
    fn collect(&mut self, node: NodeId, children: &[NodeId]) -> Result<Vec<TraceNode>, CheckError> {
        self.state_mut()?.push_bucket();
        for &child in children {
            self.walk(child)?;
        }
        let mut bucket = self
            .state_mut()?
            .pop_bucket()
            .ok_or(CheckError::BucketUnderflow { node })?;
        Ok(bucket.drain())
    }

    /// Walk `body` into a fresh bucket expecting at most one fragment.
    fn collect_single(
        &mut self,
        construct: &str,
        node: NodeId,
        body: NodeId,
    ) -> Result<Option<TraceNode>, CheckError> {
        self.state_mut()?.push_bucket();
        self.walk(body)?;
        let bucket = self
            .state_mut()?
            .pop_bucket()
            .ok_or(CheckError::BucketUnderflow { node })?;
        self.single_fragment(construct, node, bucket)
    }

    fn single_fragment(
        &mut self,
        construct: &str,
        node: NodeId,
        mut bucket: Bucket,
    ) -> Result<Option<TraceNode>, CheckError> {
        let count = bucket.len();
        if count > 1 && self.options.fragment_policy == FragmentPolicy::Report {
            let span = self.program.process_span(node);
            self.report(
                Diagnostic::error(
                    DiagnosticCode::ExcessFragments,
                    format!("{construct} collected {count} fragments where at most one is expected"),
                )
                .at(span)
                .with_help("the fragments are composed sequentially"),
            )?;
            return Ok(Some(TraceNode::Seq(bucket.drain())));
        }
        bucket
            .into_single()
            .map_err(|count| CheckError::ExcessFragments {
                construct: construct.to_string(),
                node,
                count,
            })
    }

    fn span_of(&self, node: NodeId) -> Span {
        self.program.process_span(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excess_fragments_are_fatal_by_default() {
        let mut program = Program::new("frag");
        let node = program.skip();
        let mut ctx = CompilationContext::new();
        let mut store = DeclTraces::new();
        let options = CheckerOptions::default();
        let mut checker = Checker::new(&program, &mut ctx, &mut store, &options);
        checker.states.push(CheckerState::new(ScopeOwner::Process(node)));

        let mut bucket = Bucket::new();
        bucket.push(TraceNode::Skip);
        bucket.push(TraceNode::Stop);
        let err = checker.single_fragment("WHILE", node, bucket).unwrap_err();
        assert_eq!(
            err,
            CheckError::ExcessFragments {
                construct: "WHILE".to_string(),
                node,
                count: 2
            }
        );
    }

    #[test]
    fn excess_fragments_can_be_reported_instead() {
        let mut program = Program::new("frag");
        let node = program.skip();
        let mut ctx = CompilationContext::new();
        let mut store = DeclTraces::new();
        let options = CheckerOptions {
            fragment_policy: FragmentPolicy::Report,
            ..CheckerOptions::default()
        };
        let mut checker = Checker::new(&program, &mut ctx, &mut store, &options);
        checker.states.push(CheckerState::new(ScopeOwner::Process(node)));

        let mut bucket = Bucket::new();
        bucket.push(TraceNode::Skip);
        bucket.push(TraceNode::Stop);
        let fragment = checker.single_fragment("IF", node, bucket).unwrap();
        assert_eq!(
            fragment,
            Some(TraceNode::Seq(vec![TraceNode::Skip, TraceNode::Stop]))
        );
        let diags = checker.states[0].diagnostics();
        assert_eq!(diags[0].code, DiagnosticCode::ExcessFragments);
    }

    #[test]
    fn emit_without_bucket_is_an_internal_error() {
        let mut program = Program::new("frag");
        let node = program.skip();
        let mut ctx = CompilationContext::new();
        let mut store = DeclTraces::new();
        let options = CheckerOptions::default();
        let mut checker = Checker::new(&program, &mut ctx, &mut store, &options);
        assert_eq!(
            checker.emit(node, TraceNode::Skip),
            Err(CheckError::NoActiveState)
        );
        checker.states.push(CheckerState::new(ScopeOwner::Process(node)));
        assert_eq!(
            checker.emit(node, TraceNode::Skip),
            Err(CheckError::BucketUnderflow { node })
        );
    }

    #[test]
    fn spanned_error_labels_the_offending_node() {
        let text = "PROC p(CHAN c) = c ! 1";
        let mut program = Program::new("span").with_source("p.occ", text);
        let node = program.add_process(Process::Skip, Span::new(17, 22));
        let err = SpannedCheckError::new(
            CheckError::ExcessFragments {
                construct: "SEQ".to_string(),
                node,
                count: 2,
            },
            &program,
        );
        assert_eq!(err.span, Some(SourceSpan::new(17usize.into(), 5)));
        assert!(err.to_string().contains("2 fragments"));
    }

    #[test]
    fn unknown_unit_node_is_rejected() {
        let program = Program::new("empty");
        let mut ctx = CompilationContext::new();
        let mut store = DeclTraces::new();
        let err = check(
            &program,
            Unit::Process(NodeId(7)),
            &mut ctx,
            &mut store,
            &CheckerOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, CheckError::UnknownNode(NodeId(7)));
    }
}
