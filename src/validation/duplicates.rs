//! Keys bound more than once in the same component

use super::{BindingGraphPlugin, ValidationEnv, INDENT};
use crate::binding::{sorted_descriptions, BindingDeclaration, BindingKind, BindingRef};
use crate::diagnostics::{DiagnosticReporter, Severity};
use crate::graph::{BindingGraph, ComponentPath};
use crate::key::Key;
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;

pub struct DuplicateBindingsValidator;

impl BindingGraphPlugin for DuplicateBindingsValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/DuplicateBindings"
    }

    fn visit_graph(&self, graph: &BindingGraph, _env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        let network = graph.network();
        let mut order: Vec<(ComponentPath, Key)> = Vec::new();
        let mut groups: AHashMap<(ComponentPath, Key), Vec<&BindingRef>> = AHashMap::new();
        for (_, owner, binding) in network.binding_nodes() {
            if binding.kind() == BindingKind::MembersInjection {
                continue;
            }
            let group_key = (owner.clone(), binding.key.clone());
            groups
                .entry(group_key.clone())
                .or_insert_with(|| {
                    order.push(group_key);
                    Vec::new()
                })
                .push(binding);
        }

        // The same set may surface in several components; report it once
        let mut reported: AHashSet<Vec<usize>> = AHashSet::new();
        for group_key in &order {
            let bindings = &groups[group_key];
            if bindings.len() < 2 {
                continue;
            }
            let mut identity: Vec<usize> = bindings.iter().map(|b| Arc::as_ptr(b) as usize).collect();
            identity.sort_unstable();
            if !reported.insert(identity) {
                continue;
            }
            let (owner, key) = group_key;
            let element = bindings.iter().find_map(|b| b.binding_element);
            reporter.report_component(Severity::Error, owner, element, duplicate_message(key, bindings));
        }
    }
}

fn duplicate_message(key: &Key, bindings: &[&BindingRef]) -> String {
    let (multibindings, unique): (Vec<&BindingRef>, Vec<&BindingRef>) = bindings
        .iter()
        .copied()
        .partition(|b| b.kind().is_multibinding() || b.is_multibinding_contribution());

    if multibindings.is_empty() || unique.is_empty() {
        let mut message = format!("{} is bound multiple times:", key);
        append_descriptions(&mut message, bindings, INDENT);
        return message;
    }

    let mut message = format!("{} has incompatible bindings or declarations:", key);
    message.push_str(&format!("\n{}Unique bindings and declarations:", INDENT));
    append_descriptions(&mut message, &unique, &INDENT.repeat(2));
    message.push_str(&format!("\n{}Multibindings and declarations:", INDENT));
    append_descriptions(&mut message, &multibindings, &INDENT.repeat(2));
    message
}

fn append_descriptions(message: &mut String, bindings: &[&BindingRef], indent: &str) {
    let declarations = bindings.iter().map(|b| b.as_ref() as &dyn BindingDeclaration);
    for description in sorted_descriptions(declarations) {
        message.push('\n');
        message.push_str(indent);
        message.push_str(&description);
    }
}
