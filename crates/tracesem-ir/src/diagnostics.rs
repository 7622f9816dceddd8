//! User-facing diagnostics collected while checking.
//!
//! Internal-consistency failures are not diagnostics: they abort the walk
//! as [`crate::checking::CheckError`].

use std::fmt;

use tracesem_ast::{DeclId, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Stable diagnostic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum DiagnosticCode {
    /// The computed behaviour performs a step the contract forbids.
    RefinementViolation,
    /// The computed behaviour may diverge where the contract forbids it.
    Divergence,
    /// The computed behaviour is unconstrained where the contract is not.
    Unconstrained,
    /// The contract permits behaviour the procedure never exhibits.
    OverlyRestrictive,
    /// The refinement search hit its state bound.
    Inconclusive,
    /// A contract names a recursion variable with no enclosing binder.
    UnboundContractVariable,
    /// An instantiated procedure has neither a body nor a known trace.
    UnresolvedCallee,
    /// A recursive instance does not pass its channels through unchanged.
    PermutedRecursion,
    /// A construct produced several fragments where one was expected.
    ExcessFragments,
}

impl DiagnosticCode {
    pub const ALL: [DiagnosticCode; 9] = [
        DiagnosticCode::RefinementViolation,
        DiagnosticCode::Divergence,
        DiagnosticCode::Unconstrained,
        DiagnosticCode::OverlyRestrictive,
        DiagnosticCode::Inconclusive,
        DiagnosticCode::UnboundContractVariable,
        DiagnosticCode::UnresolvedCallee,
        DiagnosticCode::PermutedRecursion,
        DiagnosticCode::ExcessFragments,
    ];

    pub fn code(self) -> &'static str {
        match self {
            DiagnosticCode::RefinementViolation => "T0001",
            DiagnosticCode::Divergence => "T0002",
            DiagnosticCode::Unconstrained => "T0003",
            DiagnosticCode::OverlyRestrictive => "T0004",
            DiagnosticCode::Inconclusive => "T0005",
            DiagnosticCode::UnboundContractVariable => "T0006",
            DiagnosticCode::UnresolvedCallee => "T0007",
            DiagnosticCode::PermutedRecursion => "T0008",
            DiagnosticCode::ExcessFragments => "T0009",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::RefinementViolation => "refinement_violation",
            DiagnosticCode::Divergence => "divergence",
            DiagnosticCode::Unconstrained => "unconstrained",
            DiagnosticCode::OverlyRestrictive => "overly_restrictive",
            DiagnosticCode::Inconclusive => "inconclusive",
            DiagnosticCode::UnboundContractVariable => "unbound_contract_variable",
            DiagnosticCode::UnresolvedCallee => "unresolved_callee",
            DiagnosticCode::PermutedRecursion => "permuted_recursion",
            DiagnosticCode::ExcessFragments => "excess_fragments",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A collected diagnostic tied to a source location.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    /// Procedure whose checking produced the diagnostic.
    pub decl: Option<DeclId>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            span: None,
            decl: None,
            help: None,
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn in_decl(mut self, decl: DeclId) -> Self {
        self.decl = Some(decl);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for code in DiagnosticCode::ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
            assert!(!code.as_str().is_empty());
        }
    }

    #[test]
    fn display_includes_severity_code_and_help() {
        let diag = Diagnostic::error(DiagnosticCode::Divergence, "loop may diverge")
            .at(Span::new(3, 9))
            .with_help("add Div to the contract");
        let text = diag.to_string();
        assert!(text.starts_with("error[T0002]: loop may diverge"));
        assert!(text.contains("help: add Div"));
        assert!(diag.is_error());
    }
}
