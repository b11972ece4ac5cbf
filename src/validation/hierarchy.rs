//! Constraints between a component and the subcomponents below it

use super::{BindingGraphPlugin, ValidationEnv, INDENT};
use crate::binding::ModuleDescriptor;
use crate::component::ComponentDescriptor;
use crate::diagnostics::{DiagnosticReporter, Severity};
use crate::graph::{BindingGraph, ComponentPath};
use crate::model::TypeName;
use crate::scope::Scope;
use std::sync::Arc;

pub struct ComponentHierarchyValidator;

struct Frame<'a> {
    component: &'a ComponentDescriptor,
    path: ComponentPath,
}

impl BindingGraphPlugin for ComponentHierarchyValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/ComponentHierarchy"
    }

    fn visit_graph(&self, graph: &BindingGraph, env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        if !graph.component().is_real_component() {
            return;
        }
        let scope_severity = env.options.scope_cycle_validation.severity();
        let mut ancestors = Vec::new();
        walk(graph.component(), graph.path().clone(), &mut ancestors, &mut |frame, ancestors| {
            validate_factory_methods(frame, ancestors, reporter);
            if let Some(severity) = scope_severity {
                validate_scope_hierarchy(frame, ancestors, severity, reporter);
            }
            validate_repeated_scoped_modules(frame, ancestors, reporter);
            validate_producer_module_uniqueness(frame, ancestors, reporter);
        });
    }
}

/// Visits every descriptor below `component`, parents first
fn walk<'a>(
    component: &'a Arc<ComponentDescriptor>,
    path: ComponentPath,
    ancestors: &mut Vec<Frame<'a>>,
    visit: &mut dyn FnMut(&Frame<'a>, &[Frame<'a>]),
) {
    let frame = Frame {
        component: component.as_ref(),
        path,
    };
    visit(&frame, ancestors);
    let children = component.child_components();
    let path = frame.path.clone();
    ancestors.push(frame);
    for child in children {
        walk(child, path.child(child.type_name.clone()), ancestors, visit);
    }
    ancestors.pop();
}

fn validate_factory_methods(frame: &Frame<'_>, ancestors: &[Frame<'_>], reporter: &mut DiagnosticReporter) {
    for (method, child) in &frame.component.children_by_factory_method {
        if child.has_creator() {
            reporter.report_component(
                Severity::Error,
                &frame.path,
                Some(method.element),
                "Components may not have factory methods for subcomponents that define a builder.",
            );
        }
        for parameter in &method.parameters {
            let Some(module) = parameter.declared_name() else {
                continue;
            };
            let owner = std::iter::once(frame)
                .chain(ancestors.iter().rev())
                .find(|f| f.component.modules.iter().any(|m| &m.name == module));
            if let Some(owner) = owner {
                reporter.report_component(
                    Severity::Error,
                    &frame.path,
                    Some(method.element),
                    format!(
                        "{} is present in {}. A subcomponent cannot use an instance of a module that differs from its parent.",
                        module.simple_name(),
                        owner.component.type_name
                    ),
                );
            }
        }
    }
}

fn validate_scope_hierarchy(
    frame: &Frame<'_>,
    ancestors: &[Frame<'_>],
    severity: Severity,
    reporter: &mut DiagnosticReporter,
) {
    let component = frame.component;
    // Every production component carries @ProductionScope
    let relevant = |scope: &&Scope| !(component.is_production() && scope.is_production_scope());
    let own: Vec<&Scope> = component.scopes.iter().filter(relevant).collect();
    if own.is_empty() {
        return;
    }
    let mut message = format!("{} has conflicting scopes:", component.type_name);
    let mut conflicts = 0;
    for ancestor in ancestors {
        for scope in ancestor.component.scopes.iter().filter(|s| own.contains(s)) {
            message.push_str(&format!(
                "\n{}{} also has {}",
                INDENT,
                ancestor.component.type_name,
                scope.readable_source()
            ));
            conflicts += 1;
        }
    }
    if conflicts > 0 {
        reporter.report_component(severity, &frame.path, Some(component.element), message);
    }
}

/// Scopes used by a module's bindings and `@Binds` declarations
fn module_scopes(module: &ModuleDescriptor) -> Vec<&Scope> {
    let mut scopes: Vec<&Scope> = Vec::new();
    let declared = module
        .bindings
        .iter()
        .filter_map(|b| b.scope.as_ref())
        .chain(module.delegates.iter().filter_map(|d| d.scope.as_ref()));
    for scope in declared {
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }
    scopes
}

/// Modules of `frame` also installed by an ancestor, grouped by ancestor
fn repeated_modules<'a>(
    own: &[&Arc<ModuleDescriptor>],
    ancestors: &'a [Frame<'a>],
    filter: impl Fn(&ModuleDescriptor) -> bool,
) -> Vec<(&'a TypeName, Vec<&'a Arc<ModuleDescriptor>>)> {
    ancestors
        .iter()
        .filter_map(|ancestor| {
            let repeated: Vec<&Arc<ModuleDescriptor>> = ancestor
                .component
                .modules
                .iter()
                .filter(|m| !m.implicitly_included && filter(&***m) && own.iter().any(|o| o.name == m.name))
                .collect();
            (!repeated.is_empty()).then_some((&ancestor.component.type_name, repeated))
        })
        .collect()
}

fn validate_repeated_scoped_modules(frame: &Frame<'_>, ancestors: &[Frame<'_>], reporter: &mut DiagnosticReporter) {
    let own: Vec<&Arc<ModuleDescriptor>> = frame
        .component
        .modules
        .iter()
        .filter(|m| !m.implicitly_included && !module_scopes(m).is_empty())
        .collect();
    if own.is_empty() {
        return;
    }
    let repeated = repeated_modules(&own, ancestors, |m| !module_scopes(m).is_empty());
    if repeated.is_empty() {
        return;
    }
    let mut message = format!(
        "{} repeats modules with scoped bindings or declarations:",
        frame.component.type_name
    );
    for (ancestor, modules) in repeated {
        message.push_str(&format!("\n{}- {} also includes:", INDENT, ancestor));
        for module in modules {
            let scopes: Vec<String> = module_scopes(module).iter().map(|s| s.readable_source()).collect();
            message.push_str(&format!(
                "\n{}{}- {} with scopes: {}",
                INDENT,
                INDENT,
                module.name,
                scopes.join(", ")
            ));
        }
    }
    reporter.report_component(Severity::Error, &frame.path, Some(frame.component.element), message);
}

fn validate_producer_module_uniqueness(
    frame: &Frame<'_>,
    ancestors: &[Frame<'_>],
    reporter: &mut DiagnosticReporter,
) {
    let own: Vec<&Arc<ModuleDescriptor>> = frame
        .component
        .modules
        .iter()
        .filter(|m| !m.implicitly_included && m.is_producer_module())
        .collect();
    if own.is_empty() {
        return;
    }
    let repeated = repeated_modules(&own, ancestors, ModuleDescriptor::is_producer_module);
    if repeated.is_empty() {
        return;
    }
    let mut message = format!("{} repeats @ProducerModules:", frame.component.type_name);
    for (ancestor, modules) in repeated {
        let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
        message.push_str(&format!("\n{}{} also installs: {}", INDENT, ancestor, names.join(", ")));
    }
    reporter.report_component(Severity::Error, &frame.path, Some(frame.component.element), message);
}
