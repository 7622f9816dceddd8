//! Span lookup for check-error diagnostics.

use tracesem_ast::{Program, Span};

use super::CheckError;

/// Best-effort span lookup for a check error.
pub(super) fn find_span_for_error(err: &CheckError, program: &Program) -> Option<Span> {
    match err {
        CheckError::ExcessFragments { node, .. }
        | CheckError::ArityMismatch { node, .. }
        | CheckError::BucketUnderflow { node } => program
            .contains_node(*node)
            .then(|| program.process_span(*node)),
        CheckError::UnknownDecl(_) | CheckError::UnknownNode(_) | CheckError::NoActiveState => {
            None
        }
    }
}
