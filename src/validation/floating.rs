//! `@Binds` declarations resolved below the component that installs them
//!
//! A delegate whose target depends on bindings local to a subcomponent is
//! re-resolved there, so the subcomponent ends up owning a binding from a
//! module it never installed. With `dagger.floatingBindsMethods` enabled
//! each such delegate is recorded and gets a warning naming where it was
//! installed and where it actually resolves. Disabled, nothing is reported.

use super::{BindingGraphPlugin, ValidationEnv};
use crate::binding::BindingKind;
use crate::component::ComponentDescriptor;
use crate::diagnostics::{DiagnosticReporter, Severity};
use crate::graph::{BindingGraph, BindingNetwork, ComponentPath, Node};
use ahash::AHashSet;
use std::sync::Arc;

pub struct FloatingBindsValidator;

impl BindingGraphPlugin for FloatingBindsValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/FloatingBinds"
    }

    fn visit_graph(&self, graph: &BindingGraph, env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        if !env.options.floating_binds_methods() {
            return;
        }
        let network = graph.network();
        let mut reported = AHashSet::new();
        for (_, owner, binding) in network.binding_nodes() {
            if binding.kind() != BindingKind::Delegate {
                continue;
            }
            let Some(module) = &binding.contributing_module else {
                continue;
            };
            let installs = |path: &ComponentPath| {
                component_at(network, path).is_some_and(|c| c.modules.iter().any(|m| &m.name == module))
            };
            if installs(owner) {
                continue;
            }
            let mut ancestor = owner.parent();
            let installer = loop {
                match ancestor {
                    Some(path) if installs(&path) => break Some(path),
                    Some(path) => ancestor = path.parent(),
                    None => break None,
                }
            };
            let Some(installer) = installer else {
                continue;
            };
            if !reported.insert((owner.clone(), Arc::as_ptr(binding))) {
                continue;
            }
            reporter.report_component(
                Severity::Warning,
                owner,
                binding.binding_element,
                format!(
                    "{} is installed in {} but resolves in {}, where bindings it depends on are declared",
                    binding,
                    installer.current(),
                    owner.current()
                ),
            );
        }
    }
}

fn component_at<'n>(network: &'n BindingNetwork, path: &ComponentPath) -> Option<&'n Arc<ComponentDescriptor>> {
    network
        .component_node(path)
        .and_then(|id| match network.node(id) {
            Node::Component { component, .. } => Some(component),
            _ => None,
        })
}
