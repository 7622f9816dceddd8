//! Serialisable results of checking a whole program.

use serde::Serialize;

use tracesem_ast::{Program, Unit};
use tracesem_ir::{CheckOutcome, Diagnostic, Severity, TraceSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Procedure,
    Process,
}

/// Result of checking one top-level unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub name: String,
    pub kind: UnitKind,
    /// Computed alternatives rendered with source names.
    pub traces: Vec<String>,
    #[serde(skip)]
    pub trace_set: TraceSet,
    pub diagnostics: Vec<Diagnostic>,
    /// The procedure was already checked when an earlier unit instantiated
    /// it; its diagnostics were reported with that unit.
    pub checked_on_demand: bool,
}

impl UnitReport {
    pub(crate) fn from_outcome(program: &Program, unit: Unit, outcome: CheckOutcome) -> Self {
        Self {
            name: unit_name(program, unit),
            kind: unit_kind(unit),
            traces: render_traces(program, &outcome.traces),
            trace_set: outcome.traces,
            diagnostics: outcome.diagnostics,
            checked_on_demand: false,
        }
    }

    pub(crate) fn from_store(program: &Program, unit: Unit, traces: &TraceSet) -> Self {
        Self {
            name: unit_name(program, unit),
            kind: unit_kind(unit),
            traces: render_traces(program, traces),
            trace_set: traces.clone(),
            diagnostics: Vec::new(),
            checked_on_demand: true,
        }
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Result of checking every unit of a program.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramReport {
    pub program: String,
    pub units: Vec<UnitReport>,
    /// Procedures whose projected traces were attached during the run.
    pub attached_procedures: usize,
    pub atoms_minted: u64,
}

impl ProgramReport {
    pub fn error_count(&self) -> usize {
        self.units.iter().map(UnitReport::error_count).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.units.iter().map(UnitReport::warning_count).sum()
    }

    /// No unit produced an error diagnostic.
    pub fn passed(&self) -> bool {
        self.error_count() == 0
    }

    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.units.iter().flat_map(|u| u.diagnostics.iter())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn unit_name(program: &Program, unit: Unit) -> String {
    match unit {
        Unit::Proc(decl) if program.contains_decl(decl) => program.decl(decl).name.clone(),
        Unit::Proc(decl) => format!("procedure {decl}"),
        Unit::Process(node) => format!("process {node}"),
    }
}

fn unit_kind(unit: Unit) -> UnitKind {
    match unit {
        Unit::Proc(_) => UnitKind::Procedure,
        Unit::Process(_) => UnitKind::Process,
    }
}

fn render_traces(program: &Program, traces: &TraceSet) -> Vec<String> {
    traces
        .iter()
        .map(|t| t.display_with(program).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracesem_ast::Span;
    use tracesem_ir::{DiagnosticCode, TraceNode};

    fn report_with(diagnostics: Vec<Diagnostic>) -> ProgramReport {
        let program = Program::new("r");
        let outcome = CheckOutcome {
            traces: TraceSet::single(TraceNode::Skip),
            diagnostics,
        };
        ProgramReport {
            program: program.name.clone(),
            units: vec![UnitReport::from_outcome(
                &program,
                Unit::Process(tracesem_ast::NodeId(0)),
                outcome,
            )],
            attached_procedures: 0,
            atoms_minted: 0,
        }
    }

    #[test]
    fn counts_split_by_severity() {
        let report = report_with(vec![
            Diagnostic::error(DiagnosticCode::Divergence, "spins"),
            Diagnostic::warning(DiagnosticCode::OverlyRestrictive, "never sends"),
            Diagnostic::warning(DiagnosticCode::Inconclusive, "too big"),
        ]);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 2);
        assert!(!report.passed());
        assert_eq!(report.diagnostics().count(), 3);
    }

    #[test]
    fn json_names_units_and_codes() {
        let report = report_with(vec![Diagnostic::warning(
            DiagnosticCode::UnresolvedCallee,
            "no trace for 'ext'",
        )
        .at(Span::new(2, 5))]);
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["program"], "r");
        assert_eq!(value["units"][0]["name"], "process p0");
        assert_eq!(value["units"][0]["kind"], "process");
        assert_eq!(value["units"][0]["traces"][0], "Skip");
        assert_eq!(value["units"][0]["diagnostics"][0]["code"], "unresolved_callee");
        assert_eq!(value["units"][0]["diagnostics"][0]["severity"], "warning");
        assert_eq!(value["units"][0]["diagnostics"][0]["span"]["start"], 2);
        assert!(value["units"][0].get("trace_set").is_none());
    }
}
