#![allow(clippy::result_large_err)]

use thiserror::Error;
use tracing::{debug, info};

use tracesem_ast::{Program, Unit};
use tracesem_ir::{
    check_with_source, CheckerOptions, CompilationContext, DeclTraces, SpannedCheckError,
};

use crate::report::{unit_name, ProgramReport, UnitReport};

#[derive(Debug, Error, miette::Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Check(#[from] SpannedCheckError),
    #[error("'{program}' was rejected: {errors} error(s), {warnings} warning(s)")]
    #[diagnostic(code(tracesem::rejected))]
    Rejected {
        program: String,
        errors: usize,
        warnings: usize,
        report: Box<ProgramReport>,
    },
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub checker: CheckerOptions,
    /// Treat warnings as rejecting the program in [`verify_program`].
    pub fail_on_warnings: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            checker: CheckerOptions::default(),
            fail_on_warnings: false,
        }
    }
}

/// State shared by every unit of one compilation.
///
/// Atom numbering and attached procedure traces persist across units, so
/// a procedure checked on demand by an earlier unit is not checked again.
#[derive(Debug, Default)]
pub struct Compilation {
    ctx: CompilationContext,
    store: DeclTraces,
}

impl Compilation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &DeclTraces {
        &self.store
    }

    pub fn atoms_minted(&self) -> u64 {
        self.ctx.atoms_minted()
    }

    pub fn check_unit(
        &mut self,
        program: &Program,
        unit: Unit,
        options: &CheckerOptions,
    ) -> Result<UnitReport, PipelineError> {
        if let Unit::Proc(decl) = unit {
            if let Some(traces) = self.store.get(decl) {
                debug!(unit = %unit_name(program, unit), "reusing traces checked on demand");
                return Ok(UnitReport::from_store(program, unit, traces));
            }
        }
        let outcome = check_with_source(program, unit, &mut self.ctx, &mut self.store, options)?;
        let report = UnitReport::from_outcome(program, unit, outcome);
        info!(
            unit = %report.name,
            alternatives = report.traces.len(),
            errors = report.error_count(),
            warnings = report.warning_count(),
            "checked unit"
        );
        Ok(report)
    }
}

/// Check every unit of `program` in source order.
///
/// User-level problems are reported as diagnostics in the returned report;
/// only internal-consistency failures abort the run.
pub fn check_program(
    program: &Program,
    options: &PipelineOptions,
) -> Result<ProgramReport, PipelineError> {
    info!(program = %program.name, units = program.units.len(), "checking program");
    let mut compilation = Compilation::new();
    let units = program
        .units
        .iter()
        .map(|&unit| compilation.check_unit(program, unit, &options.checker))
        .collect::<Result<Vec<_>, _>>()?;
    let report = ProgramReport {
        program: program.name.clone(),
        units,
        attached_procedures: compilation.store().len(),
        atoms_minted: compilation.atoms_minted(),
    };
    info!(
        program = %report.program,
        errors = report.error_count(),
        warnings = report.warning_count(),
        atoms = report.atoms_minted,
        "program checked"
    );
    Ok(report)
}

/// Like [`check_program`], but a program with error diagnostics (or
/// warnings, when `fail_on_warnings` is set) is an error.
pub fn verify_program(
    program: &Program,
    options: &PipelineOptions,
) -> Result<ProgramReport, PipelineError> {
    let report = check_program(program, options)?;
    let errors = report.error_count();
    let warnings = report.warning_count();
    if errors > 0 || (options.fail_on_warnings && warnings > 0) {
        return Err(PipelineError::Rejected {
            program: program.name.clone(),
            errors,
            warnings,
            report: Box::new(report),
        });
    }
    Ok(report)
}
