//! Requests nothing in the graph satisfies

use super::{dependency_trace, entry_point_can_use_production, BindingGraphPlugin, ValidationEnv};
use crate::binding::InjectBindingRegistry;
use crate::diagnostics::{DiagnosticReporter, Severity};
use crate::framework::names;
use crate::graph::{BindingGraph, BindingNetwork, Edge, NodeId};
use crate::key::Key;
use crate::model::{AnnotatedElement, ProgramModel};

pub struct MissingBindingValidator;

impl BindingGraphPlugin for MissingBindingValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/MissingBinding"
    }

    fn visit_graph(&self, graph: &BindingGraph, env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        // Full graphs include keys nothing requests yet
        if graph.is_full_binding_graph() || !graph.component().is_real_component() {
            return;
        }
        let network = graph.network();
        for (node, path, key) in network.missing_binding_nodes() {
            let trace = dependency_trace(network, env, node);
            let mut message = missing_binding_message(network, env.program, node, key);
            message.push_str(&trace.render());
            let component = trace.component.as_ref().unwrap_or(path);
            reporter.report_component(Severity::Error, component, trace.entry_point, message);
        }
    }
}

fn missing_binding_message(network: &BindingNetwork, program: &dyn ProgramModel, node: NodeId, key: &Key) -> String {
    let mut message = format!("{} cannot be provided without ", key);
    if is_valid_implicit_provision_key(program, key) {
        message.push_str("an @Inject constructor or ");
    }
    message.push_str("an @Provides-");
    if all_incoming_dependencies_can_use_production(network, node) {
        message.push_str(" or @Produces-");
    }
    message.push_str("annotated method.");
    if key.qualifier().is_none() && type_has_injection_sites(program, key) {
        message.push_str(" This type supports members injection but cannot be implicitly provided.");
    }

    let mut components = Vec::new();
    for (_, owner) in network.bindings_for_key(key) {
        if !components.contains(&owner.current()) {
            components.push(owner.current());
        }
    }
    for component in components {
        message.push_str(&format!("\nA binding with matching key exists in component: {}", component));
    }
    message
}

fn is_valid_implicit_provision_key(program: &dyn ProgramModel, key: &Key) -> bool {
    InjectBindingRegistry::is_eligible(program, key)
        && program
            .type_element_of(key.ty())
            .is_some_and(|element| !element.is_abstract_type())
}

fn all_incoming_dependencies_can_use_production(network: &BindingNetwork, node: NodeId) -> bool {
    network.in_edges(node).all(|edge| match &edge.edge {
        Edge::Dependency { request, entry_point: true } => entry_point_can_use_production(request.kind),
        Edge::Dependency { .. } => network
            .node(edge.source)
            .binding()
            .is_some_and(|b| b.is_production()),
        _ => true,
    })
}

fn type_has_injection_sites(program: &dyn ProgramModel, key: &Key) -> bool {
    let Some(name) = key.ty().declared_name() else {
        return false;
    };
    program.superclass_chain(name).iter().any(|element| {
        element.fields.iter().any(|f| f.has_annotation(names::INJECT))
            || element.methods.iter().any(|m| m.has_annotation(names::INJECT))
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{provides, run};
    use super::*;
    use crate::model::{Annotation, FieldSpec, MethodSpec, ProgramBuilder, TypeMirror};
    use crate::options::CompilerOptions;

    #[test]
    fn test_interface_key_has_no_inject_constructor_hint() {
        let mut b = ProgramBuilder::new();
        b.interface("test.Service").finish();
        b.inject_class("test.Client", &[TypeMirror::named("test.Service")]);
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("client").returns(TypeMirror::named("test.Client")))
            .finish();
        let program = b.build();

        let diagnostics = run(&MissingBindingValidator, &program, "test.App", CompilerOptions::default(), false);
        assert_eq!(diagnostics.len(), 1);
        let message = &diagnostics[0].message;
        assert!(message.starts_with("test.Service cannot be provided without an @Provides-annotated method."));
        assert!(message.contains("test.Client is requested at"));
        assert!(diagnostics[0].element.is_some());
    }

    #[test]
    fn test_class_key_mentions_inject_constructor_and_members_injection() {
        let mut b = ProgramBuilder::new();
        b.class("test.Widget")
            .field(FieldSpec::new("dep", TypeMirror::named(names::STRING)).annotate(Annotation::new(names::INJECT)))
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("widget").returns(TypeMirror::named("test.Widget")))
            .finish();
        let program = b.build();

        let diagnostics = run(&MissingBindingValidator, &program, "test.App", CompilerOptions::default(), false);
        assert_eq!(diagnostics.len(), 1);
        let message = &diagnostics[0].message;
        assert!(message.starts_with(
            "test.Widget cannot be provided without an @Inject constructor or an @Provides-annotated method."
        ));
        assert!(message.contains("This type supports members injection but cannot be implicitly provided."));
    }

    #[test]
    fn test_binding_in_child_is_named() {
        let mut b = ProgramBuilder::new();
        b.interface("test.Foo").finish();
        b.class("test.ChildModule")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("foo", TypeMirror::named("test.Foo")))
            .finish();
        b.interface("test.Child")
            .annotate(
                Annotation::new(names::SUBCOMPONENT)
                    .with_types("modules", vec![TypeMirror::named("test.ChildModule")]),
            )
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .method(MethodSpec::new("child").returns(TypeMirror::named("test.Child")))
            .finish();
        let program = b.build();

        let diagnostics = run(&MissingBindingValidator, &program, "test.App", CompilerOptions::default(), false);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .message
            .contains("\nA binding with matching key exists in component: test.Child"));
    }

    #[test]
    fn test_full_binding_graph_skips_missing() {
        let mut b = ProgramBuilder::new();
        b.interface("test.Service").finish();
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(
                provides("client", TypeMirror::named("test.Client"))
                    .param("service", TypeMirror::named("test.Service")),
            )
            .finish();
        let program = b.build();

        let diagnostics = super::super::tests::run_module(&MissingBindingValidator, &program, "test.M");
        assert!(diagnostics.is_empty());
    }
}
