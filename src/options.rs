//! Processor options
//!
//! Options arrive from the host as a `-A<key>=<value>` string map. Each
//! recognized key is parsed case-insensitively; an unsupported value is
//! reported as an error diagnostic and the option keeps its default.
//!
//! ```rust
//! use dependency_injector_codegen::{CompilerOptions, Diagnostic, ValidationType};
//!
//! let mut diagnostics: Vec<Diagnostic> = Vec::new();
//! let options = CompilerOptions::from_processor_options(
//!     [("dagger.fullBindingGraphValidation", "WARNING")],
//!     &mut diagnostics,
//! );
//! assert_eq!(options.full_binding_graph_validation, ValidationType::Warning);
//! assert!(diagnostics.is_empty());
//! ```

use crate::diagnostics::{Diagnostic, DiagnosticSink, Severity};
use crate::error::CodegenError;
use serde::{Deserialize, Serialize};

#[cfg(feature = "logging")]
use tracing::debug;

pub const SCOPE_CYCLE_VALIDATION: &str = "dagger.disableInterComponentScopeValidation";
pub const NULLABLE_VALIDATION: &str = "dagger.nullableValidation";
pub const PRIVATE_MEMBER_VALIDATION: &str = "dagger.privateMemberValidation";
pub const STATIC_MEMBER_VALIDATION: &str = "dagger.staticMemberValidation";
pub const FULL_BINDING_GRAPH_VALIDATION: &str = "dagger.fullBindingGraphValidation";
pub const FLOATING_BINDS_METHODS: &str = "dagger.floatingBindsMethods";
pub const FAST_INIT: &str = "dagger.fastInit";
pub const AHEAD_OF_TIME_SUBCOMPONENTS: &str = "dagger.experimentalAheadOfTimeSubcomponents";
pub const HEADER_COMPILATION: &str = "experimental_turbine_hjar";

/// How a validation reports its findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationType {
    #[default]
    Error,
    Warning,
    None,
}

impl ValidationType {
    /// The severity to report at, or `None` when the validation is off
    pub fn severity(self) -> Option<Severity> {
        match self {
            Self::Error => Some(Severity::Error),
            Self::Warning => Some(Severity::Warning),
            Self::None => None,
        }
    }

    fn parse(value: &str, allowed: &[ValidationType]) -> Option<Self> {
        let parsed = match value.to_ascii_lowercase().as_str() {
            "error" => Self::Error,
            "warning" => Self::Warning,
            "none" => Self::None,
            _ => return None,
        };
        allowed.contains(&parsed).then_some(parsed)
    }

    fn label(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::None => "NONE",
        }
    }
}

/// An on/off feature switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    Enabled,
    #[default]
    Disabled,
}

impl FeatureStatus {
    #[inline]
    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Options controlling validation severity and code-shape planning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Severity of scope-hierarchy conflicts between nested components
    pub scope_cycle_validation: ValidationType,
    /// Severity of a nullable binding injected into a non-nullable request
    pub nullable_validation: ValidationType,
    pub private_member_validation: ValidationType,
    pub static_member_validation: ValidationType,
    /// Severity of findings when modules are validated as full binding graphs;
    /// `None` disables full binding graph validation
    pub full_binding_graph_validation: ValidationType,
    pub floating_binds_methods: FeatureStatus,
    pub fast_init: FeatureStatus,
    pub ahead_of_time_subcomponents: FeatureStatus,
    pub header_compilation: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            scope_cycle_validation: ValidationType::Error,
            nullable_validation: ValidationType::Error,
            private_member_validation: ValidationType::Error,
            static_member_validation: ValidationType::Error,
            full_binding_graph_validation: ValidationType::None,
            floating_binds_methods: FeatureStatus::Disabled,
            fast_init: FeatureStatus::Disabled,
            ahead_of_time_subcomponents: FeatureStatus::Disabled,
            header_compilation: false,
        }
    }
}

impl CompilerOptions {
    /// Parses processor options, reporting invalid values to `sink`
    pub fn from_processor_options<I, K, V>(options: I, sink: &mut dyn DiagnosticSink) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        use ValidationType::{Error, None as Off, Warning};

        let mut parsed = Self::default();
        for (key, value) in options {
            let (key, value) = (key.as_ref(), value.as_ref());
            let result = match key {
                SCOPE_CYCLE_VALIDATION => {
                    validation(SCOPE_CYCLE_VALIDATION, value, &[Error, Warning, Off]).map(|v| parsed.scope_cycle_validation = v)
                }
                NULLABLE_VALIDATION => {
                    validation(NULLABLE_VALIDATION, value, &[Error, Warning]).map(|v| parsed.nullable_validation = v)
                }
                PRIVATE_MEMBER_VALIDATION => {
                    validation(PRIVATE_MEMBER_VALIDATION, value, &[Error, Warning]).map(|v| parsed.private_member_validation = v)
                }
                STATIC_MEMBER_VALIDATION => {
                    validation(STATIC_MEMBER_VALIDATION, value, &[Error, Warning]).map(|v| parsed.static_member_validation = v)
                }
                FULL_BINDING_GRAPH_VALIDATION => validation(FULL_BINDING_GRAPH_VALIDATION, value, &[Error, Warning, Off])
                    .map(|v| parsed.full_binding_graph_validation = v),
                FLOATING_BINDS_METHODS => feature(FLOATING_BINDS_METHODS, value).map(|v| parsed.floating_binds_methods = v),
                FAST_INIT => feature(FAST_INIT, value).map(|v| parsed.fast_init = v),
                AHEAD_OF_TIME_SUBCOMPONENTS => {
                    feature(AHEAD_OF_TIME_SUBCOMPONENTS, value).map(|v| parsed.ahead_of_time_subcomponents = v)
                }
                HEADER_COMPILATION => {
                    parsed.header_compilation = true;
                    Ok(())
                }
                _ => Ok(()),
            };
            if let Err(err) = result {
                sink.report_diagnostic(Diagnostic::error(err.to_string()));
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_injector_codegen",
            fast_init = parsed.fast_init.is_enabled(),
            ahead_of_time = parsed.ahead_of_time_subcomponents.is_enabled(),
            full_graph = ?parsed.full_binding_graph_validation,
            "Parsed compiler options"
        );

        parsed
    }

    /// Whether modules are validated as standalone full binding graphs
    pub fn validate_full_binding_graphs(&self) -> bool {
        self.full_binding_graph_validation != ValidationType::None
    }

    pub fn fast_init(&self) -> bool {
        self.fast_init.is_enabled()
    }

    pub fn ahead_of_time_subcomponents(&self) -> bool {
        self.ahead_of_time_subcomponents.is_enabled()
    }

    pub fn floating_binds_methods(&self) -> bool {
        self.floating_binds_methods.is_enabled()
    }
}

fn validation(key: &'static str, value: &str, allowed: &[ValidationType]) -> Result<ValidationType, CodegenError> {
    ValidationType::parse(value, allowed).ok_or_else(|| CodegenError::InvalidOption {
        key,
        valid: format!(
            "[{}]",
            allowed.iter().map(|v| v.label()).collect::<Vec<_>>().join(", ")
        ),
        found: value.to_string(),
    })
}

fn feature(key: &'static str, value: &str) -> Result<FeatureStatus, CodegenError> {
    FeatureStatus::parse(value).ok_or_else(|| CodegenError::InvalidOption {
        key,
        valid: "[ENABLED, DISABLED]".to_string(),
        found: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.scope_cycle_validation, ValidationType::Error);
        assert_eq!(options.nullable_validation, ValidationType::Error);
        assert!(!options.validate_full_binding_graphs());
        assert!(!options.fast_init());
        assert!(!options.ahead_of_time_subcomponents());
        assert!(!options.header_compilation);
    }

    #[test]
    fn test_parse_case_insensitive() {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let options = CompilerOptions::from_processor_options(
            [
                (SCOPE_CYCLE_VALIDATION, "none"),
                (FAST_INIT, "Enabled"),
                (FLOATING_BINDS_METHODS, "ENABLED"),
                (NULLABLE_VALIDATION, "warning"),
            ],
            &mut diagnostics,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(options.scope_cycle_validation, ValidationType::None);
        assert_eq!(options.nullable_validation, ValidationType::Warning);
        assert!(options.fast_init());
        assert!(options.floating_binds_methods());
    }

    #[test]
    fn test_invalid_value_reports_and_keeps_default() {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let options = CompilerOptions::from_processor_options(
            [(NULLABLE_VALIDATION, "none"), (FAST_INIT, "sometimes")],
            &mut diagnostics,
        );
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(Diagnostic::is_error));
        assert!(diagnostics[0].message.contains(NULLABLE_VALIDATION));
        assert_eq!(options.nullable_validation, ValidationType::Error);
        assert!(!options.fast_init());
    }

    #[test]
    fn test_header_compilation_flag() {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let options = CompilerOptions::from_processor_options([(HEADER_COMPILATION, "")], &mut diagnostics);
        assert!(options.header_compilation);
    }

    #[test]
    fn test_deserialize_partial_document() {
        let options: CompilerOptions =
            serde_json::from_str(r#"{"fastInit":"enabled","fullBindingGraphValidation":"warning"}"#).unwrap();
        assert!(options.fast_init());
        assert_eq!(options.full_binding_graph_validation, ValidationType::Warning);
        assert_eq!(options.scope_cycle_validation, ValidationType::Error);
    }
}
