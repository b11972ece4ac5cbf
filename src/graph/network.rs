//! Node-and-edge view of a binding graph tree
//!
//! Components, bindings and missing bindings are nodes. Edges are
//! dependency requests (from entry points or bindings), child factory
//! methods, and module-declared subcomponent creators.

use super::{BindingGraph, ComponentPath, ResolvedBindings};
use crate::binding::{BindingKind, BindingRef};
use crate::component::{ComponentDescriptor, ComponentMethodDescriptor};
use crate::key::Key;
use crate::request::DependencyRequest;
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use std::sync::Arc;

pub type NodeId = usize;
pub type EdgeId = usize;

#[derive(Debug, Clone)]
pub enum Node {
    Component {
        path: ComponentPath,
        component: Arc<ComponentDescriptor>,
    },
    Binding {
        /// The component that owns the binding
        owner: ComponentPath,
        binding: BindingRef,
    },
    MissingBinding {
        /// The component where the key was requested
        path: ComponentPath,
        key: Key,
    },
}

impl Node {
    /// The component path the node belongs to
    pub fn component_path(&self) -> &ComponentPath {
        match self {
            Node::Component { path, .. } => path,
            Node::Binding { owner, .. } => owner,
            Node::MissingBinding { path, .. } => path,
        }
    }

    pub fn binding(&self) -> Option<&BindingRef> {
        match self {
            Node::Binding { binding, .. } => Some(binding),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Node::Binding { binding, .. } => Some(&binding.key),
            Node::MissingBinding { key, .. } => Some(key),
            Node::Component { .. } => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, Node::Component { .. })
    }
}

#[derive(Debug, Clone)]
pub enum Edge {
    Dependency {
        request: DependencyRequest,
        /// The request is a component method
        entry_point: bool,
    },
    ChildFactoryMethod {
        method: ComponentMethodDescriptor,
    },
    SubcomponentCreatorBinding,
}

impl Edge {
    pub fn dependency_request(&self) -> Option<&DependencyRequest> {
        match self {
            Edge::Dependency { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn is_entry_point(&self) -> bool {
        matches!(self, Edge::Dependency { entry_point: true, .. })
    }
}

#[derive(Debug, Clone)]
pub struct NetworkEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub edge: Edge,
}

#[derive(Debug, Default)]
pub struct BindingNetwork {
    nodes: Vec<Node>,
    edges: Vec<NetworkEdge>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
    components: AHashMap<ComponentPath, NodeId>,
    bindings: AHashMap<(ComponentPath, usize), NodeId>,
    missing: AHashMap<(ComponentPath, Key), NodeId>,
    full_binding_graph: bool,
}

impl BindingNetwork {
    /// Builds the network for `root` and all its subgraphs
    pub fn from_graph(root: &BindingGraph) -> Self {
        let mut network = Self {
            full_binding_graph: root.is_full_binding_graph(),
            ..Self::default()
        };
        let graphs = root.graphs();
        for graph in &graphs {
            network.add_node(Node::Component {
                path: graph.path().clone(),
                component: Arc::clone(graph.component()),
            });
        }
        for graph in &graphs {
            network.visit(graph);
        }
        network
    }

    fn visit(&mut self, graph: &BindingGraph) {
        let component = self.components[graph.path()];

        if let (Some(parent), Some(method)) = (graph.path().parent(), graph.factory_method()) {
            if let Some(&parent_node) = self.components.get(&parent) {
                self.add_edge(
                    parent_node,
                    component,
                    Edge::ChildFactoryMethod { method: method.clone() },
                );
            }
        }

        for method in graph.component().entry_point_methods() {
            let Some(request) = &method.request else {
                continue;
            };
            self.add_dependency_edges(graph, component, request, true);
        }

        for binding in graph.owned_bindings() {
            let node = self.binding_node_for(graph.path(), binding);
            for dependency in &binding.dependencies {
                self.add_dependency_edges(graph, node, dependency, false);
            }
            if binding.kind() == BindingKind::SubcomponentCreator {
                self.add_subcomponent_creator_edge(graph, node, binding);
            }
        }
    }

    fn add_dependency_edges(&mut self, graph: &BindingGraph, source: NodeId, request: &DependencyRequest, entry_point: bool) {
        let targets: Vec<NodeId> = match graph.resolved_for_request(request) {
            Some(resolved) if !resolved.is_empty() => self.binding_nodes_of(resolved),
            _ => vec![self.missing_node_for(graph.path(), &request.key)],
        };
        for target in targets {
            self.add_edge(
                source,
                target,
                Edge::Dependency {
                    request: request.clone(),
                    entry_point,
                },
            );
        }
    }

    fn add_subcomponent_creator_edge(&mut self, graph: &BindingGraph, node: NodeId, binding: &BindingRef) {
        let Some(creator) = binding.key.ty().declared_name() else {
            return;
        };
        let declared_by_module = graph
            .resolved_bindings(&binding.key)
            .is_some_and(|rb| !rb.subcomponent_declarations.is_empty());
        if !declared_by_module {
            return;
        }
        if let Some(child) = graph.component().child_with_creator(creator) {
            let child_path = graph.path().child(child.type_name.clone());
            if let Some(&child_node) = self.components.get(&child_path) {
                self.add_edge(node, child_node, Edge::SubcomponentCreatorBinding);
            }
        }
    }

    fn binding_nodes_of(&mut self, resolved: &ResolvedBindings) -> Vec<NodeId> {
        resolved
            .bindings()
            .map(|(owner, binding)| self.binding_node_for(owner, binding))
            .collect()
    }

    fn binding_node_for(&mut self, owner: &ComponentPath, binding: &BindingRef) -> NodeId {
        let index = (owner.clone(), Arc::as_ptr(binding) as usize);
        if let Some(&node) = self.bindings.get(&index) {
            return node;
        }
        let node = self.add_node(Node::Binding {
            owner: owner.clone(),
            binding: Arc::clone(binding),
        });
        self.bindings.insert(index, node);
        node
    }

    fn missing_node_for(&mut self, path: &ComponentPath, key: &Key) -> NodeId {
        let index = (path.clone(), key.clone());
        if let Some(&node) = self.missing.get(&index) {
            return node;
        }
        let node = self.add_node(Node::MissingBinding {
            path: path.clone(),
            key: key.clone(),
        });
        self.missing.insert(index, node);
        node
    }

    fn add_node(&mut self, node: Node) -> NodeId {
        if let Node::Component { path, .. } = &node {
            self.components.insert(path.clone(), self.nodes.len());
        }
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.nodes.len() - 1
    }

    fn add_edge(&mut self, source: NodeId, target: NodeId, edge: Edge) -> EdgeId {
        let id = self.edges.len();
        self.edges.push(NetworkEdge { source, target, edge });
        self.outgoing[source].push(id);
        self.incoming[target].push(id);
        id
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[inline]
    pub fn is_full_binding_graph(&self) -> bool {
        self.full_binding_graph
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &NetworkEdge {
        &self.edges[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The root component's node
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn component_node(&self, path: &ComponentPath) -> Option<NodeId> {
        self.components.get(path).copied()
    }

    pub fn component_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(|&id| self.nodes[id].is_component())
    }

    pub fn binding_nodes(&self) -> impl Iterator<Item = (NodeId, &ComponentPath, &BindingRef)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(id, node)| match node {
            Node::Binding { owner, binding } => Some((id, owner, binding)),
            _ => None,
        })
    }

    /// The node for `binding` as owned by `owner`
    pub fn binding_node(&self, owner: &ComponentPath, binding: &BindingRef) -> Option<NodeId> {
        self.bindings
            .get(&(owner.clone(), Arc::as_ptr(binding) as usize))
            .copied()
    }

    pub fn missing_binding_nodes(&self) -> impl Iterator<Item = (NodeId, &ComponentPath, &Key)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(id, node)| match node {
            Node::MissingBinding { path, key } => Some((id, path, key)),
            _ => None,
        })
    }

    pub fn dependency_edges(&self) -> impl Iterator<Item = (EdgeId, &NetworkEdge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e.edge, Edge::Dependency { .. }))
    }

    pub fn in_edges(&self, node: NodeId) -> impl Iterator<Item = &NetworkEdge> + '_ {
        self.incoming[node].iter().map(|&id| &self.edges[id])
    }

    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = &NetworkEdge> + '_ {
        self.outgoing[node].iter().map(|&id| &self.edges[id])
    }

    pub fn in_edge_ids(&self, node: NodeId) -> &[EdgeId] {
        &self.incoming[node]
    }

    pub fn out_edge_ids(&self, node: NodeId) -> &[EdgeId] {
        &self.outgoing[node]
    }

    /// Binding nodes for `key`, across all components
    pub fn bindings_for_key<'a>(&'a self, key: &'a Key) -> impl Iterator<Item = (NodeId, &'a ComponentPath)> + 'a {
        self.binding_nodes()
            .filter(move |(_, _, b)| &b.key == key)
            .map(|(id, owner, _)| (id, owner))
    }

    /// Binding nodes the dependency edges out of `node` point at
    pub fn requested_bindings(&self, node: NodeId) -> Vec<NodeId> {
        let mut seen = AHashSet::new();
        self.out_edges(node)
            .filter(|e| matches!(e.edge, Edge::Dependency { .. }))
            .map(|e| e.target)
            .filter(|t| matches!(self.nodes[*t], Node::Binding { .. }) && seen.insert(*t))
            .collect()
    }

    /// Shortest path of edges from `from` to `to`, following only edges
    /// accepted by `follow`; breadth first so ties resolve in insertion order
    pub fn shortest_path(&self, from: NodeId, to: NodeId, follow: impl Fn(&NetworkEdge) -> bool) -> Option<Vec<EdgeId>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut came_from: AHashMap<NodeId, EdgeId> = AHashMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = AHashSet::new();
        seen.insert(from);
        while let Some(node) = queue.pop_front() {
            for &edge_id in &self.outgoing[node] {
                let edge = &self.edges[edge_id];
                if !follow(edge) || !seen.insert(edge.target) {
                    continue;
                }
                came_from.insert(edge.target, edge_id);
                if edge.target == to {
                    let mut path = vec![edge_id];
                    let mut current = node;
                    while current != from {
                        let back = came_from[&current];
                        path.push(back);
                        current = self.edges[back].source;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(edge.target);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentDescriptorFactory;
    use crate::context::RoundContext;
    use crate::framework::names;
    use crate::graph::BindingGraphFactory;
    use crate::model::{Annotation, MethodSpec, ProgramBuilder, TypeMirror, TypeName};
    use crate::options::CompilerOptions;

    fn chain_program() -> crate::model::InMemoryProgram {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.C", &[]);
        b.inject_class("test.B", &[TypeMirror::named("test.C")]);
        b.inject_class("test.A", &[TypeMirror::named("test.B"), TypeMirror::named("test.Missing")]);
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("a").returns(TypeMirror::named("test.A")))
            .finish();
        b.build()
    }

    fn build(program: &crate::model::InMemoryProgram) -> BindingGraph {
        let mut ctx = RoundContext::new(program, CompilerOptions::default());
        let component = ComponentDescriptorFactory::new(&mut ctx)
            .root_component(&TypeName::new("test.App"))
            .unwrap();
        BindingGraphFactory::new(&mut ctx).create(component, false).unwrap()
    }

    #[test]
    fn test_nodes_and_edges() {
        let program = chain_program();
        let graph = build(&program);
        let network = graph.network();

        assert!(network.node(network.root()).is_component());
        assert_eq!(network.binding_nodes().count(), 3);
        let missing: Vec<_> = network.missing_binding_nodes().map(|(_, _, k)| k.to_string()).collect();
        assert_eq!(missing, vec!["test.Missing"]);
        assert_eq!(network.dependency_edges().count(), 4);
        assert_eq!(network.out_edges(network.root()).filter(|e| e.edge.is_entry_point()).count(), 1);
    }

    #[test]
    fn test_shortest_path() {
        let program = chain_program();
        let graph = build(&program);
        let network = graph.network();
        let c = network.bindings_for_key(&Key::named("test.C")).next().unwrap().0;
        let path = network.shortest_path(network.root(), c, |_| true).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(network.edge(path[0]).source, network.root());
        assert_eq!(network.edge(path[2]).target, c);
        assert!(network.shortest_path(c, network.root(), |_| true).is_none());
    }

    #[test]
    fn test_network_is_built_once() {
        let program = chain_program();
        let graph = build(&program);
        assert!(std::ptr::eq(graph.network(), graph.network()));
    }
}
