//! Diagnostics and declaration validation reports

use crate::graph::ComponentPath;
use crate::model::ElementId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Note => "note",
        })
    }
}

/// A message attached to an element or component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub element: Option<ElementId>,
    pub component: Option<ComponentPath>,
    /// Name of the validation that produced the message, e.g. `Dagger/MissingBinding`
    pub plugin: Option<&'static str>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            element: None,
            component: None,
            plugin: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn at_element(mut self, element: Option<ElementId>) -> Self {
        self.element = element;
        self
    }

    pub fn in_component(mut self, component: ComponentPath) -> Self {
        self.component = Some(component);
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.severity)?;
        if let Some(plugin) = self.plugin {
            write!(f, "[{}] ", plugin)?;
        }
        f.write_str(&self.message)
    }
}

/// Anything diagnostics can be delivered to
pub trait DiagnosticSink {
    fn report_diagnostic(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Collects diagnostics for one processing step, tagging each with the
/// validation that is currently running
#[derive(Debug, Default)]
pub struct DiagnosticReporter {
    diagnostics: Vec<Diagnostic>,
    plugin: Option<&'static str>,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag subsequent diagnostics with `plugin`
    pub fn set_plugin(&mut self, plugin: Option<&'static str>) {
        self.plugin = plugin;
    }

    pub fn report(&mut self, severity: Severity, message: impl Into<String>) {
        self.report_diagnostic(Diagnostic::new(severity, message));
    }

    pub fn report_element(&mut self, severity: Severity, element: Option<ElementId>, message: impl Into<String>) {
        self.report_diagnostic(Diagnostic::new(severity, message).at_element(element));
    }

    pub fn report_component(
        &mut self,
        severity: Severity,
        component: &ComponentPath,
        element: Option<ElementId>,
        message: impl Into<String>,
    ) {
        self.report_diagnostic(
            Diagnostic::new(severity, message)
                .at_element(element)
                .in_component(component.clone()),
        );
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl DiagnosticSink for DiagnosticReporter {
    fn report_diagnostic(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.plugin.is_none() {
            diagnostic.plugin = self.plugin;
        }
        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_injector_codegen",
            severity = %diagnostic.severity,
            plugin = diagnostic.plugin.unwrap_or("-"),
            "Reported diagnostic"
        );
        self.diagnostics.push(diagnostic);
    }
}

// ============================================================================
// Declaration validation reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub severity: Severity,
    pub message: String,
    pub element: ElementId,
}

/// Findings about one declaration and the elements nested in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    subject: ElementId,
    items: Vec<ReportItem>,
    subreports: Vec<ValidationReport>,
}

impl ValidationReport {
    pub fn about(subject: ElementId) -> Self {
        Self {
            subject,
            items: Vec::new(),
            subreports: Vec::new(),
        }
    }

    #[inline]
    pub fn subject(&self) -> ElementId {
        self.subject
    }

    pub fn add_item(&mut self, severity: Severity, message: impl Into<String>, element: ElementId) {
        self.items.push(ReportItem {
            severity,
            message: message.into(),
            element,
        });
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        let subject = self.subject;
        self.add_item(Severity::Error, message, subject);
    }

    pub fn add_error_at(&mut self, message: impl Into<String>, element: ElementId) {
        self.add_item(Severity::Error, message, element);
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        let subject = self.subject;
        self.add_item(Severity::Warning, message, subject);
    }

    pub fn add_subreport(&mut self, report: ValidationReport) {
        self.subreports.push(report);
    }

    /// No error in this report or any subreport
    pub fn is_clean(&self) -> bool {
        self.items.iter().all(|i| i.severity != Severity::Error)
            && self.subreports.iter().all(ValidationReport::is_clean)
    }

    /// Every item, depth first
    pub fn all_items(&self) -> Vec<&ReportItem> {
        let mut items: Vec<&ReportItem> = self.items.iter().collect();
        for sub in &self.subreports {
            items.extend(sub.all_items());
        }
        items
    }

    pub fn print_to(&self, sink: &mut dyn DiagnosticSink) {
        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_injector_codegen",
            subject = %self.subject,
            items = self.items.len(),
            "Printing validation report"
        );
        for item in self.all_items() {
            sink.report_diagnostic(
                Diagnostic::new(item.severity, item.message.clone()).at_element(Some(item.element)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_tags_plugin() {
        let mut reporter = DiagnosticReporter::new();
        reporter.set_plugin(Some("Dagger/MissingBinding"));
        reporter.report(Severity::Error, "missing");
        reporter.set_plugin(None);
        reporter.report(Severity::Warning, "floating");

        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.warning_count(), 1);
        assert_eq!(reporter.diagnostics()[0].plugin, Some("Dagger/MissingBinding"));
        assert_eq!(
            reporter.diagnostics()[0].to_string(),
            "error: [Dagger/MissingBinding] missing"
        );
        assert!(reporter.diagnostics()[1].plugin.is_none());
    }

    #[test]
    fn test_report_cleanliness_includes_subreports() {
        let mut report = ValidationReport::about(ElementId(1));
        report.add_warning("just a warning");
        assert!(report.is_clean());

        let mut sub = ValidationReport::about(ElementId(2));
        sub.add_error("bad parameter");
        report.add_subreport(sub);
        assert!(!report.is_clean());
        assert_eq!(report.all_items().len(), 2);
    }

    #[test]
    fn test_print_to_sink() {
        let mut report = ValidationReport::about(ElementId(1));
        report.add_error_at("private field", ElementId(7));
        let mut sink: Vec<Diagnostic> = Vec::new();
        report.print_to(&mut sink);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].element, Some(ElementId(7)));
        assert!(sink[0].is_error());
    }
}
