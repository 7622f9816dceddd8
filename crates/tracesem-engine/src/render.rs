//! Rendering collected diagnostics as `miette` reports.

use std::fmt;

use miette::{LabeledSpan, NamedSource, NarratableReportHandler, SourceCode, SourceSpan};
use thiserror::Error;

use tracesem_ast::Program;
use tracesem_ir::{Diagnostic, DiagnosticCode, Severity};

/// A [`Diagnostic`] bound to the program's source text.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RenderedDiagnostic {
    code: DiagnosticCode,
    severity: Severity,
    message: String,
    help: Option<String>,
    src: Option<NamedSource<String>>,
    span: Option<SourceSpan>,
}

impl RenderedDiagnostic {
    pub fn new(diag: &Diagnostic, program: &Program) -> Self {
        let src = program
            .source
            .as_ref()
            .map(|s| NamedSource::new(s.filename.clone(), s.text.clone()));
        let text_len = program.source.as_ref().map_or(0, |s| s.text.len());
        let span = diag
            .span
            .filter(|s| src.is_some() && s.end <= text_len)
            .map(|s| SourceSpan::new(s.start.into(), s.len()));
        Self {
            code: diag.code,
            severity: diag.severity,
            message: diag.message.clone(),
            help: diag.help.clone(),
            src,
            span,
        }
    }
}

impl miette::Diagnostic for RenderedDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code.code()))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.src.as_ref().map(|s| s as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.code.as_str().replace('_', " ")),
            span,
        ))))
    }
}

/// Render one diagnostic as plain, screen-reader friendly text.
pub fn render(diag: &Diagnostic, program: &Program) -> String {
    let rendered = RenderedDiagnostic::new(diag, program);
    let mut out = String::new();
    match NarratableReportHandler::new().render_report(&mut out, &rendered) {
        Ok(()) => out,
        Err(_) => diag.to_string(),
    }
}

/// Render every diagnostic of a report in unit order.
pub fn render_all(report: &crate::report::ProgramReport, program: &Program) -> Vec<String> {
    report.diagnostics().map(|d| render(d, program)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic as _;
    use tracesem_ast::Span;

    #[test]
    fn span_is_dropped_without_source_text() {
        let program = Program::new("bare");
        let diag = Diagnostic::error(DiagnosticCode::Divergence, "spins").at(Span::new(0, 4));
        let rendered = RenderedDiagnostic::new(&diag, &program);
        assert!(rendered.source_code().is_none());
        assert!(rendered.labels().is_none());
        assert!(render(&diag, &program).contains("spins"));
    }

    #[test]
    fn label_points_at_the_span() {
        let program = Program::new("src").with_source("src.occ", "PROC p(CHAN c)\n  c ! 1\n:");
        let diag = Diagnostic::error(DiagnosticCode::RefinementViolation, "bad step")
            .at(Span::new(17, 22))
            .with_help("computed behaviour: c!");
        let rendered = RenderedDiagnostic::new(&diag, &program);
        let labels: Vec<LabeledSpan> = rendered.labels().unwrap().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].offset(), 17);
        assert_eq!(labels[0].len(), 5);
        assert_eq!(labels[0].label(), Some("refinement violation"));
        assert_eq!(rendered.code().unwrap().to_string(), "T0001");
        assert_eq!(rendered.severity(), Some(miette::Severity::Error));

        let text = render(&diag, &program);
        assert!(text.contains("bad step"));
        assert!(text.contains("computed behaviour: c!"));
    }

    #[test]
    fn out_of_range_span_is_dropped() {
        let program = Program::new("short").with_source("s.occ", "SKIP");
        let diag = Diagnostic::warning(DiagnosticCode::UnresolvedCallee, "ext").at(Span::new(2, 40));
        let rendered = RenderedDiagnostic::new(&diag, &program);
        assert!(rendered.labels().is_none());
        assert_eq!(rendered.severity(), Some(miette::Severity::Warning));
    }
}
