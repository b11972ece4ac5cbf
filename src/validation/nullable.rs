//! Nullable bindings injected where null is not accepted

use super::{BindingGraphPlugin, ValidationEnv};
use crate::diagnostics::DiagnosticReporter;
use crate::graph::{BindingGraph, Edge};
use crate::request::RequestKind;

pub struct NullableBindingValidator;

impl BindingGraphPlugin for NullableBindingValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/Nullable"
    }

    fn visit_graph(&self, graph: &BindingGraph, env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        let Some(severity) = env.options.nullable_validation.severity() else {
            return;
        };
        let network = graph.network();
        for (node, _, binding) in network.binding_nodes() {
            if !binding.nullable {
                continue;
            }
            for edge in network.in_edges(node) {
                let Edge::Dependency { request, .. } = &edge.edge else {
                    continue;
                };
                // Provider<T> and friends may hand out null lazily
                if request.is_nullable || request.kind != RequestKind::Instance {
                    continue;
                }
                reporter.report_component(
                    severity,
                    network.node(edge.source).component_path(),
                    request.request_element,
                    format!("{} is not nullable, but is being provided by {}", binding.key, binding),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{provides, run};
    use super::*;
    use crate::diagnostics::Severity;
    use crate::framework::names;
    use crate::model::{Annotation, MethodSpec, ProgramBuilder, TypeMirror};
    use crate::options::{CompilerOptions, ValidationType};

    fn program(nullable_request: bool) -> crate::model::InMemoryProgram {
        let nullable = Annotation::new("javax.annotation.Nullable");
        let mut b = ProgramBuilder::new();
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("foo", TypeMirror::named("test.Foo")).annotate(nullable.clone()))
            .finish();
        let mut entry = MethodSpec::new("foo").returns(TypeMirror::named("test.Foo"));
        if nullable_request {
            entry = entry.annotate(nullable);
        }
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT).with_types("modules", vec![TypeMirror::named("test.M")]))
            .method(entry)
            .method(
                MethodSpec::new("fooProvider")
                    .returns(TypeMirror::declared(names::PROVIDER, vec![TypeMirror::named("test.Foo")])),
            )
            .finish();
        b.build()
    }

    #[test]
    fn test_nullable_into_non_nullable_request() {
        let diagnostics = run(&NullableBindingValidator, &program(false), "test.App", CompilerOptions::default(), false);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "test.Foo is not nullable, but is being provided by @Provides test.Foo test.M.foo()"
        );
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn test_nullable_request_and_warning_severity() {
        assert!(run(&NullableBindingValidator, &program(true), "test.App", CompilerOptions::default(), false).is_empty());

        let options = CompilerOptions {
            nullable_validation: ValidationType::Warning,
            ..CompilerOptions::default()
        };
        let diagnostics = run(&NullableBindingValidator, &program(false), "test.App", options, false);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }
}
