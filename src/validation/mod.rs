//! Binding graph validation
//!
//! Each check is a [`BindingGraphPlugin`] that walks a root graph (and, via
//! its network, every subgraph) and reports to a [`DiagnosticReporter`].
//! [`BindingGraphValidator`] runs them in a fixed order and tags every
//! diagnostic with the plugin that produced it.

mod cycle;
mod duplicates;
mod floating;
mod hierarchy;
mod map_keys;
mod missing;
mod nullable;
mod production;
mod scopes;

pub use cycle::DependencyCycleValidator;
pub use duplicates::DuplicateBindingsValidator;
pub use floating::FloatingBindsValidator;
pub use hierarchy::ComponentHierarchyValidator;
pub use map_keys::MapMultibindingValidator;
pub use missing::MissingBindingValidator;
pub use nullable::NullableBindingValidator;
pub use production::{DependsOnProductionExecutorValidator, ProvisionDependsOnProducerValidator};
pub use scopes::IncompatiblyScopedBindingsValidator;

use crate::diagnostics::DiagnosticReporter;
use crate::graph::{BindingGraph, BindingNetwork, ComponentPath, Edge, NodeId};
use crate::model::{ElementId, ProgramModel};
use crate::options::CompilerOptions;
use crate::request::RequestKind;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Indent used for the nested lines of multi-line messages
pub(crate) const INDENT: &str = "    ";

/// What a plugin may consult besides the graph itself
#[derive(Clone, Copy)]
pub struct ValidationEnv<'a> {
    pub program: &'a dyn ProgramModel,
    pub options: &'a CompilerOptions,
}

impl<'a> ValidationEnv<'a> {
    pub fn new(program: &'a dyn ProgramModel, options: &'a CompilerOptions) -> Self {
        Self { program, options }
    }

    /// Readable form of `element`, falling back to `fallback`
    pub(crate) fn describe(&self, element: Option<ElementId>, fallback: impl FnOnce() -> String) -> String {
        element
            .and_then(|id| self.program.element_description(id))
            .unwrap_or_else(fallback)
    }
}

/// One validation over a complete binding graph
pub trait BindingGraphPlugin {
    /// Tag attached to every diagnostic, e.g. `Dagger/MissingBinding`
    fn plugin_name(&self) -> &'static str;

    fn visit_graph(&self, graph: &BindingGraph, env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter);
}

/// The built-in plugins, in the order they run
pub fn default_plugins() -> Vec<Box<dyn BindingGraphPlugin>> {
    vec![
        Box::new(DependencyCycleValidator),
        Box::new(DuplicateBindingsValidator),
        Box::new(MissingBindingValidator),
        Box::new(MapMultibindingValidator),
        Box::new(IncompatiblyScopedBindingsValidator),
        Box::new(ComponentHierarchyValidator),
        Box::new(DependsOnProductionExecutorValidator),
        Box::new(NullableBindingValidator),
        Box::new(FloatingBindsValidator),
        Box::new(ProvisionDependsOnProducerValidator),
    ]
}

/// Runs every plugin over a root graph
pub struct BindingGraphValidator {
    plugins: Vec<Box<dyn BindingGraphPlugin>>,
}

impl Default for BindingGraphValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingGraphValidator {
    pub fn new() -> Self {
        Self {
            plugins: default_plugins(),
        }
    }

    /// A validator running only `plugins`
    pub fn with_plugins(plugins: Vec<Box<dyn BindingGraphPlugin>>) -> Self {
        Self { plugins }
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.plugin_name()).collect()
    }

    /// Validates `graph` and returns what the plugins reported
    pub fn validate(&self, graph: &BindingGraph, env: &ValidationEnv<'_>) -> DiagnosticReporter {
        let mut reporter = DiagnosticReporter::new();
        for plugin in &self.plugins {
            reporter.set_plugin(Some(plugin.plugin_name()));
            let before = reporter.len();
            plugin.visit_graph(graph, env, &mut reporter);

            #[cfg(feature = "logging")]
            trace!(
                target: "dependency_injector_codegen",
                plugin = plugin.plugin_name(),
                reported = reporter.len() - before,
                "Ran binding graph plugin"
            );
            #[cfg(not(feature = "logging"))]
            let _ = before;
        }
        reporter.set_plugin(None);

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_injector_codegen",
            component = %graph.path(),
            full = graph.is_full_binding_graph(),
            errors = reporter.error_count(),
            warnings = reporter.warning_count(),
            "Validated binding graph"
        );

        reporter
    }

    /// Whether `graph` passes every plugin with no errors
    pub fn is_valid(&self, graph: &BindingGraph, env: &ValidationEnv<'_>) -> bool {
        !self.validate(graph, env).has_errors()
    }
}

/// Whether an entry point with this request kind may be satisfied by a
/// production binding
pub(crate) fn entry_point_can_use_production(kind: RequestKind) -> bool {
    kind.can_be_satisfied_by_production()
}

/// How a node is reached from the root's entry points
pub(crate) struct DependencyTrace {
    /// `X is injected at` / `Y is requested at` lines, nearest first
    pub lines: Vec<String>,
    /// The component method the trace starts from
    pub entry_point: Option<ElementId>,
    /// The component declaring that method
    pub component: Option<ComponentPath>,
}

impl DependencyTrace {
    /// The lines as a message suffix, each on its own indented line
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("\n{}{}", INDENT, line))
            .collect()
    }
}

/// The shortest trace from the root component to `target`
pub(crate) fn dependency_trace(network: &BindingNetwork, env: &ValidationEnv<'_>, target: NodeId) -> DependencyTrace {
    let path = network
        .shortest_path(network.root(), target, |_| true)
        .unwrap_or_default();
    trace_along(network, env, &path)
}

/// Renders the dependency edges of `path`, last edge first
pub(crate) fn trace_along(network: &BindingNetwork, env: &ValidationEnv<'_>, path: &[usize]) -> DependencyTrace {
    let mut trace = DependencyTrace {
        lines: Vec::new(),
        entry_point: None,
        component: None,
    };
    for &edge_id in path.iter().rev() {
        let edge = network.edge(edge_id);
        let Edge::Dependency { request, entry_point } = &edge.edge else {
            continue;
        };
        let source = network.node(edge.source);
        let site = env.describe(request.request_element, || match source.binding() {
            Some(binding) => binding.describe(),
            None => source.component_path().current().to_string(),
        });
        if *entry_point {
            trace
                .lines
                .push(format!("{} is requested at\n{}{}{}", request.key, INDENT, INDENT, site));
            trace.entry_point = request.request_element;
            trace.component = Some(source.component_path().clone());
        } else {
            trace
                .lines
                .push(format!("{} is injected at\n{}{}{}", request.key, INDENT, INDENT, site));
        }
    }
    trace
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::component::ComponentDescriptorFactory;
    use crate::context::RoundContext;
    use crate::diagnostics::Diagnostic;
    use crate::framework::names;
    use crate::graph::BindingGraphFactory;
    use crate::model::{Annotation, InMemoryProgram, MethodSpec, Modifier, TypeMirror, TypeName};

    pub fn provides(name: &str, returns: TypeMirror) -> MethodSpec {
        MethodSpec::new(name)
            .modifier(Modifier::Static)
            .annotate(Annotation::new(names::PROVIDES))
            .returns(returns)
    }

    /// Resolves `root` and runs `plugin` over it
    pub fn run(
        plugin: &dyn BindingGraphPlugin,
        program: &InMemoryProgram,
        root: &str,
        options: CompilerOptions,
        full: bool,
    ) -> Vec<Diagnostic> {
        let mut ctx = RoundContext::new(program, options.clone());
        let component = ComponentDescriptorFactory::new(&mut ctx)
            .root_component(&TypeName::new(root))
            .unwrap();
        let graph = BindingGraphFactory::new(&mut ctx).create(component, full).unwrap();
        let env = ValidationEnv::new(program, &options);
        let mut reporter = DiagnosticReporter::new();
        reporter.set_plugin(Some(plugin.plugin_name()));
        plugin.visit_graph(&graph, &env, &mut reporter);
        reporter.into_diagnostics()
    }

    /// Resolves `module` as a module graph and runs `plugin` over it
    pub fn run_module(plugin: &dyn BindingGraphPlugin, program: &InMemoryProgram, module: &str) -> Vec<Diagnostic> {
        let options = CompilerOptions::default();
        let mut ctx = RoundContext::new(program, options.clone());
        let component = ComponentDescriptorFactory::new(&mut ctx)
            .module_component(&TypeName::new(module))
            .unwrap();
        let graph = BindingGraphFactory::new(&mut ctx).create(component, true).unwrap();
        let env = ValidationEnv::new(program, &options);
        let mut reporter = DiagnosticReporter::new();
        plugin.visit_graph(&graph, &env, &mut reporter);
        reporter.into_diagnostics()
    }

    #[test]
    fn test_default_plugin_order() {
        let validator = BindingGraphValidator::new();
        assert_eq!(
            validator.plugin_names(),
            vec![
                "Dagger/DependencyCycle",
                "Dagger/DuplicateBindings",
                "Dagger/MissingBinding",
                "Dagger/MapKeys",
                "Dagger/IncompatiblyScopedBindings",
                "Dagger/ComponentHierarchy",
                "Dagger/DependsOnProductionExecutor",
                "Dagger/Nullable",
                "Dagger/FloatingBinds",
                "Dagger/ProvisionDependsOnProduction",
            ]
        );
    }

    #[test]
    fn test_validator_tags_plugin_and_traces_entry_point() {
        let mut b = crate::model::ProgramBuilder::new();
        b.inject_class("test.A", &[TypeMirror::named("test.Missing")]);
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("a").returns(TypeMirror::named("test.A")))
            .finish();
        let program = b.build();
        let options = CompilerOptions::default();
        let mut ctx = RoundContext::new(&program, options.clone());
        let component = ComponentDescriptorFactory::new(&mut ctx)
            .root_component(&TypeName::new("test.App"))
            .unwrap();
        let graph = BindingGraphFactory::new(&mut ctx).create(component, false).unwrap();
        let env = ValidationEnv::new(&program, &options);

        let reporter = BindingGraphValidator::new().validate(&graph, &env);
        assert_eq!(reporter.error_count(), 1);
        let error = reporter.errors().next().unwrap();
        assert_eq!(error.plugin, Some("Dagger/MissingBinding"));
        assert!(error.message.contains("test.Missing is injected at\n        test.A(dep0)"));
        assert!(error.message.contains("test.A is requested at\n        test.App.a()"));
        assert!(!BindingGraphValidator::new().is_valid(&graph, &env));
        assert!(BindingGraphValidator::with_plugins(Vec::new()).is_valid(&graph, &env));
    }
}
