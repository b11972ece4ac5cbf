//! Dependency cycles that no request kind breaks

use super::{trace_along, BindingGraphPlugin, ValidationEnv, INDENT};
use crate::binding::BindingKind;
use crate::diagnostics::{DiagnosticReporter, Severity};
use crate::framework::{names, MapType, OptionalType};
use crate::graph::{BindingGraph, BindingNetwork, Edge, EdgeId, NetworkEdge, Node, NodeId};
use crate::model::TypeMirror;
use crate::request::{extract_key_type, request_kind_of, RequestKind};
use ahash::AHashSet;

/// Reports each cycle of dependency edges once
pub struct DependencyCycleValidator;

impl BindingGraphPlugin for DependencyCycleValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/DependencyCycle"
    }

    fn visit_graph(&self, graph: &BindingGraph, env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        let network = graph.network();
        let follow = |edge: &NetworkEdge| is_unbroken_dependency(network, edge);
        let mut visited: AHashSet<(NodeId, NodeId)> = AHashSet::new();

        for (edge_id, edge) in network.dependency_edges() {
            if !follow(edge) || visited.contains(&(edge.source, edge.target)) {
                continue;
            }
            let Some(back) = network.shortest_path(edge.target, edge.source, follow) else {
                continue;
            };
            let mut cycle = Vec::with_capacity(back.len() + 1);
            cycle.push(edge_id);
            cycle.extend(back);
            for &id in &cycle {
                let e = network.edge(id);
                visited.insert((e.source, e.target));
            }
            report_cycle(graph, network, env, &cycle, reporter);
        }
    }
}

/// A dependency edge whose request needs its target before the source can
/// be constructed
fn is_unbroken_dependency(network: &BindingNetwork, edge: &NetworkEdge) -> bool {
    match &edge.edge {
        Edge::Dependency { .. } => !breaks_cycle(network, edge),
        _ => false,
    }
}

fn breaks_cycle(network: &BindingNetwork, edge: &NetworkEdge) -> bool {
    let Some(request) = edge.edge.dependency_request() else {
        return false;
    };
    // Map<K, V> depends on its Map<K, Provider<V>> entries
    if request.key.contribution_identifier().is_some() {
        return false;
    }
    if kind_breaks_cycle(request.key.ty(), request.kind) {
        return true;
    }
    let target_is_optional = network
        .node(edge.target)
        .binding()
        .is_some_and(|b| b.kind() == BindingKind::Optional);
    if target_is_optional {
        let value = OptionalType::from(request.key.ty()).and_then(|o| o.value_type());
        if let Some(value) = value {
            let kind = request_kind_of(value);
            if let Some(key_type) = extract_key_type(kind, value) {
                return kind_breaks_cycle(&key_type, kind);
            }
        }
    }
    false
}

fn kind_breaks_cycle(requested: &TypeMirror, kind: RequestKind) -> bool {
    if kind.breaks_cycles() {
        return true;
    }
    kind == RequestKind::Instance
        && MapType::from(requested).is_some_and(|m| !m.is_raw() && m.values_are_type_of(names::PROVIDER))
}

fn report_cycle(
    graph: &BindingGraph,
    network: &BindingNetwork,
    env: &ValidationEnv<'_>,
    cycle: &[EdgeId],
    reporter: &mut DiagnosticReporter,
) {
    let cycle_nodes: Vec<NodeId> = cycle.iter().map(|&id| network.edge(id).source).collect();

    // The shortest route in from an entry point, and where it enters the cycle
    let entry = cycle_nodes
        .iter()
        .enumerate()
        .filter_map(|(i, &node)| {
            network
                .shortest_path(network.root(), node, |e| !matches!(e.edge, Edge::SubcomponentCreatorBinding))
                .map(|path| (i, path))
        })
        .min_by_key(|(_, path)| path.len());

    let (start, entry_path) = match &entry {
        Some((i, path)) => (*i, path.as_slice()),
        None => (0, &[][..]),
    };
    let rotated: Vec<EdgeId> = cycle[start..].iter().chain(&cycle[..start]).copied().collect();
    let cycle_trace = trace_along(network, env, &rotated);
    let mut message = String::from("Found a dependency cycle:");
    for line in &cycle_trace.lines {
        message.push('\n');
        message.push_str(INDENT);
        message.push_str(line);
    }

    let entry_trace = trace_along(network, env, entry_path);
    if !entry_trace.lines.is_empty() {
        message.push_str("\n\nThe cycle is requested via:");
        message.push_str(&entry_trace.render());
    }

    if graph.is_full_binding_graph() || entry.is_none() {
        let path = network.node(cycle_nodes[0]).component_path().clone();
        let element = network
            .component_node(&path)
            .and_then(|id| match network.node(id) {
                Node::Component { component, .. } => Some(component.element),
                _ => None,
            });
        reporter.report_component(Severity::Error, &path, element, message);
        return;
    }

    // Nearest an entry point: the request that enters the cycle
    let entering = entry_path
        .last()
        .and_then(|&id| network.edge(id).edge.dependency_request())
        .and_then(|r| r.request_element);
    let path = network.node(cycle_nodes[start]).component_path().clone();
    reporter.report_component(Severity::Error, &path, entering.or(entry_trace.entry_point), message);
}
