//! Production-specific dependency rules

use super::{entry_point_can_use_production, BindingGraphPlugin, ValidationEnv};
use crate::diagnostics::{DiagnosticReporter, Severity};
use crate::graph::{BindingGraph, BindingNetwork, Edge, NetworkEdge};
use crate::request::{production_executor_key, production_implementation_executor_key};
use ahash::AHashSet;
use std::sync::Arc;

/// Only the framework's own executor binding may request `@Production Executor`
pub struct DependsOnProductionExecutorValidator;

impl BindingGraphPlugin for DependsOnProductionExecutorValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/DependsOnProductionExecutor"
    }

    fn visit_graph(&self, graph: &BindingGraph, _env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        let network = graph.network();
        let executor = production_executor_key();
        let implementation = production_implementation_executor_key();
        let mut reported = AHashSet::new();

        let executor_nodes = (0..network.node_count()).filter(|&id| network.node(id).key() == Some(&executor));
        for node in executor_nodes {
            for edge in network.in_edges(node) {
                if !matches!(edge.edge, Edge::Dependency { .. }) {
                    continue;
                }
                let source = network.node(edge.source);
                let Some(binding) = source.binding() else {
                    continue;
                };
                if binding.key == implementation || !reported.insert(Arc::as_ptr(binding)) {
                    continue;
                }
                reporter.report_component(
                    Severity::Error,
                    source.component_path(),
                    binding.binding_element,
                    format!("{} may not depend on the production executor", binding.key),
                );
            }
        }
    }
}

/// Provisions (and non-production entry points) may not depend on
/// production bindings
pub struct ProvisionDependsOnProducerValidator;

impl BindingGraphPlugin for ProvisionDependsOnProducerValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/ProvisionDependsOnProduction"
    }

    fn visit_graph(&self, graph: &BindingGraph, _env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        let network = graph.network();
        for (_, edge) in network.dependency_edges() {
            let target_is_production = network
                .node(edge.target)
                .binding()
                .is_some_and(|b| b.is_production());
            if !target_is_production || dependency_can_use_production(network, edge) {
                continue;
            }
            let Some(request) = edge.edge.dependency_request() else {
                continue;
            };
            let source = network.node(edge.source);
            let message = if edge.edge.is_entry_point() {
                format!("{} is a provision entry-point, which cannot depend on a production.", request.key)
            } else {
                let key = source.key().map(ToString::to_string).unwrap_or_default();
                format!("{} is a provision, which cannot depend on a production.", key)
            };
            reporter.report_component(Severity::Error, source.component_path(), request.request_element, message);
        }
    }
}

fn dependency_can_use_production(network: &BindingNetwork, edge: &NetworkEdge) -> bool {
    match &edge.edge {
        Edge::Dependency {
            request,
            entry_point: true,
        } => entry_point_can_use_production(request.kind),
        Edge::Dependency { .. } => network
            .node(edge.source)
            .binding()
            .is_some_and(|b| b.is_production()),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{provides, run};
    use super::*;
    use crate::framework::names;
    use crate::model::{Annotation, MethodSpec, Modifier, ProgramBuilder, TypeMirror};
    use crate::options::CompilerOptions;

    fn produces(name: &str, returns: &str) -> MethodSpec {
        MethodSpec::new(name)
            .modifier(Modifier::Static)
            .annotate(Annotation::new(names::PRODUCES))
            .returns(TypeMirror::named(returns))
    }

    fn executor() -> TypeMirror {
        TypeMirror::named(names::EXECUTOR)
    }

    #[test]
    fn test_user_binding_depending_on_production_executor() {
        let mut b = ProgramBuilder::new();
        b.class("test.ExecutorModule")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("executor", executor()).annotate(Annotation::new(names::PRODUCTION)))
            .method(provides("foo", TypeMirror::named("test.Foo")).annotated_param(
                "executor",
                executor(),
                vec![Annotation::new(names::PRODUCTION)],
            ))
            .finish();
        b.interface("test.App")
            .annotate(
                Annotation::new(names::PRODUCTION_COMPONENT)
                    .with_types("modules", vec![TypeMirror::named("test.ExecutorModule")]),
            )
            .method(
                MethodSpec::new("foo")
                    .returns(TypeMirror::declared(names::LISTENABLE_FUTURE, vec![TypeMirror::named("test.Foo")])),
            )
            .finish();
        let program = b.build();

        let diagnostics = run(
            &DependsOnProductionExecutorValidator,
            &program,
            "test.App",
            CompilerOptions::default(),
            false,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "test.Foo may not depend on the production executor");
    }

    #[test]
    fn test_provision_entry_point_on_production() {
        let mut b = ProgramBuilder::new();
        b.class("test.PM")
            .annotate(Annotation::new(names::PRODUCER_MODULE))
            .method(produces("foo", "test.Foo"))
            .finish();
        b.class("test.ExecutorModule")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("executor", executor()).annotate(Annotation::new(names::PRODUCTION)))
            .finish();
        b.inject_class("test.Bar", &[TypeMirror::named("test.Foo")]);
        b.interface("test.App")
            .annotate(Annotation::new(names::PRODUCTION_COMPONENT).with_types(
                "modules",
                vec![TypeMirror::named("test.PM"), TypeMirror::named("test.ExecutorModule")],
            ))
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .method(
                MethodSpec::new("bar")
                    .returns(TypeMirror::declared(names::LISTENABLE_FUTURE, vec![TypeMirror::named("test.Bar")])),
            )
            .finish();
        let program = b.build();

        let diagnostics = run(
            &ProvisionDependsOnProducerValidator,
            &program,
            "test.App",
            CompilerOptions::default(),
            false,
        );
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "test.Foo is a provision entry-point, which cannot depend on a production.",
                "test.Bar is a provision, which cannot depend on a production.",
            ]
        );
    }

    #[test]
    fn test_future_entry_point_on_production_is_clean() {
        let mut b = ProgramBuilder::new();
        b.class("test.PM")
            .annotate(Annotation::new(names::PRODUCER_MODULE))
            .method(produces("foo", "test.Foo"))
            .finish();
        b.class("test.ExecutorModule")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("executor", executor()).annotate(Annotation::new(names::PRODUCTION)))
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::PRODUCTION_COMPONENT).with_types(
                "modules",
                vec![TypeMirror::named("test.PM"), TypeMirror::named("test.ExecutorModule")],
            ))
            .method(
                MethodSpec::new("foo")
                    .returns(TypeMirror::declared(names::LISTENABLE_FUTURE, vec![TypeMirror::named("test.Foo")])),
            )
            .finish();
        let program = b.build();

        let diagnostics = run(
            &ProvisionDependsOnProducerValidator,
            &program,
            "test.App",
            CompilerOptions::default(),
            false,
        );
        assert!(diagnostics.is_empty());
    }
}
