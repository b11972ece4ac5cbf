//! Scoped bindings owned by components without that scope

use super::{BindingGraphPlugin, ValidationEnv, INDENT};
use crate::binding::{BindingKind, BindingRef};
use crate::diagnostics::{DiagnosticReporter, Severity};
use crate::graph::{BindingGraph, ComponentPath, Node};
use crate::scope::{readable_scopes, Scope};
use std::sync::Arc;

pub struct IncompatiblyScopedBindingsValidator;

impl BindingGraphPlugin for IncompatiblyScopedBindingsValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/IncompatiblyScopedBindings"
    }

    fn visit_graph(&self, graph: &BindingGraph, env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        let network = graph.network();
        let root_is_real = graph.component().is_real_component();
        let mut incompatible: Vec<(ComponentPath, Vec<&BindingRef>)> = Vec::new();

        for (_, owner, binding) in network.binding_nodes() {
            let Some(scope) = binding.scope.as_ref().filter(|s| !s.is_reusable()) else {
                continue;
            };
            let Some(component) = network.component_node(owner).and_then(|id| match network.node(id) {
                Node::Component { component, .. } => Some(component),
                _ => None,
            }) else {
                continue;
            };
            if component.scopes.contains(scope) {
                continue;
            }
            // @Inject bindings of module graphs land on a properly scoped
            // ancestor once installed
            if binding.kind() == BindingKind::Injection && !root_is_real {
                continue;
            }
            match incompatible.iter_mut().find(|(path, _)| path == owner) {
                Some((_, bindings)) => {
                    if !bindings.iter().any(|b| Arc::ptr_eq(b, binding)) {
                        bindings.push(binding);
                    }
                }
                None => incompatible.push((owner.clone(), vec![binding])),
            }
        }

        for (path, bindings) in incompatible {
            let Some(Node::Component { component, .. }) = network.component_node(&path).map(|id| network.node(id))
            else {
                continue;
            };
            let message = if component.is_real_component() {
                let mut message = path.current().to_string();
                if component.scopes.is_empty() {
                    message.push_str(" (unscoped) may not reference scoped bindings:");
                } else {
                    message.push_str(&format!(
                        " scoped with {} may not reference bindings with different scopes:",
                        readable_scopes(&component.scopes)
                    ));
                }
                message
            } else {
                let mut distinct: Vec<&Scope> = Vec::new();
                for scope in bindings.iter().filter_map(|b| b.scope.as_ref()) {
                    if !distinct.contains(&scope) {
                        distinct.push(scope);
                    }
                }
                // A module may use one scope; only mixing them is an error
                if distinct.len() < 2 {
                    continue;
                }
                format!("{} contains bindings with different scopes:", path.current())
            };
            let mut message = message;
            for binding in &bindings {
                message.push('\n');
                message.push_str(INDENT);
                message.push_str(&describe_scoped(binding, env));
            }
            reporter.report_component(Severity::Error, &path, Some(component.element), message);
        }
    }
}

fn describe_scoped(binding: &BindingRef, env: &ValidationEnv<'_>) -> String {
    match binding.kind() {
        BindingKind::Provision | BindingKind::Delegate | BindingKind::Production => {
            env.describe(binding.binding_element, || binding.describe())
        }
        BindingKind::Injection => {
            let scope = binding.scope.as_ref().map(Scope::readable_source).unwrap_or_default();
            let class = binding
                .binding_type_element
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| binding.key.to_string());
            format!("{} class {}", scope, class)
        }
        _ => binding.describe(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{provides, run, run_module};
    use super::*;
    use crate::framework::names;
    use crate::model::{Annotation, MethodSpec, ProgramBuilder, TypeMirror};
    use crate::options::CompilerOptions;

    #[test]
    fn test_unscoped_component_references_scoped_binding() {
        let mut b = ProgramBuilder::new();
        b.class("test.Cache")
            .annotate(Annotation::new(names::SINGLETON))
            .constructor(MethodSpec::constructor().annotate(Annotation::new(names::INJECT)))
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("cache").returns(TypeMirror::named("test.Cache")))
            .finish();
        let program = b.build();

        let diagnostics = run(
            &IncompatiblyScopedBindingsValidator,
            &program,
            "test.App",
            CompilerOptions::default(),
            false,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            format!("test.App (unscoped) may not reference scoped bindings:\n{}@Singleton class test.Cache", INDENT)
        );
    }

    #[test]
    fn test_component_with_different_scope() {
        let session = "test.SessionScope";
        let mut b = ProgramBuilder::new();
        b.scope(session);
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("foo", TypeMirror::named("test.Foo")).annotate(Annotation::new(session)))
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::SINGLETON))
            .annotate(Annotation::new(names::COMPONENT).with_types("modules", vec![TypeMirror::named("test.M")]))
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .finish();
        let program = b.build();

        let diagnostics = run(
            &IncompatiblyScopedBindingsValidator,
            &program,
            "test.App",
            CompilerOptions::default(),
            false,
        );
        assert_eq!(diagnostics.len(), 1);
        let message = &diagnostics[0].message;
        assert!(message.starts_with("test.App scoped with @Singleton may not reference bindings with different scopes:"));
        assert!(message.contains("test.M.foo()"));
    }

    #[test]
    fn test_reusable_and_matching_scopes_are_clean() {
        let mut b = ProgramBuilder::new();
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("foo", TypeMirror::named("test.Foo")).annotate(Annotation::new(names::SINGLETON)))
            .method(provides("bar", TypeMirror::named("test.Bar")).annotate(Annotation::new(names::REUSABLE)))
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::SINGLETON))
            .annotate(Annotation::new(names::COMPONENT).with_types("modules", vec![TypeMirror::named("test.M")]))
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .method(MethodSpec::new("bar").returns(TypeMirror::named("test.Bar")))
            .finish();
        let program = b.build();

        let diagnostics = run(
            &IncompatiblyScopedBindingsValidator,
            &program,
            "test.App",
            CompilerOptions::default(),
            false,
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_module_mixing_scopes() {
        let session = "test.SessionScope";
        let mut b = ProgramBuilder::new();
        b.scope(session);
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("foo", TypeMirror::named("test.Foo")).annotate(Annotation::new(names::SINGLETON)))
            .method(provides("bar", TypeMirror::named("test.Bar")).annotate(Annotation::new(session)))
            .finish();
        let program = b.build();

        let diagnostics = run_module(&IncompatiblyScopedBindingsValidator, &program, "test.M");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.starts_with("test.M contains bindings with different scopes:"));
    }
}
