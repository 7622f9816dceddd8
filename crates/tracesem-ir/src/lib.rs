#![doc = include_str!("../README.md")]

//! Trace algebra and checking for process trees.
//!
//! This crate defines the trace expression model, the bucket and state
//! machinery used while walking a process tree, the construct handlers,
//! parameter substitution at call sites, and refinement checking of
//! computed traces against declared contracts.

pub mod bucket;
pub mod checking;
pub mod diagnostics;
pub mod options;
#[cfg(test)]
mod prop_tests;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod refinement;
pub mod simplify;
pub mod state;
pub mod store;
pub mod substitute;
pub mod trace;

pub use checking::{check, check_with_source, CheckError, CheckOutcome, SpannedCheckError};
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use options::{CheckerOptions, FragmentPolicy};
pub use store::DeclTraces;
pub use trace::{Atom, AtomId, ChanRef, CompilationContext, TraceNode, TraceSet};
