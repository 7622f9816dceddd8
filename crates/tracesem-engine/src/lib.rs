#![doc = include_str!("../README.md")]

//! Whole-program checking.
//!
//! [`pipeline`] checks every unit of a program against one shared
//! compilation context, [`report`] holds the serialisable results, and
//! [`render`] turns collected diagnostics into `miette` reports.

pub mod pipeline;
pub mod render;
pub mod report;

pub use pipeline::{check_program, verify_program, Compilation, PipelineError, PipelineOptions};
pub use report::{ProgramReport, UnitKind, UnitReport};
