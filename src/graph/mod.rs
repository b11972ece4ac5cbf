//! Binding graphs
//!
//! A [`BindingGraph`] holds, for one component, every key it resolved and
//! the child graphs of its subcomponents. Validators read the derived
//! [`BindingNetwork`], which is built lazily for the whole tree below the
//! graph it is requested from.

mod factory;
mod network;
mod resolved;

pub use factory::*;
pub use network::*;
pub use resolved::*;

use crate::binding::{BindingRef, ModuleDescriptor};
use crate::component::{ComponentDescriptor, ComponentMethodDescriptor};
use crate::key::Key;
use crate::model::TypeName;
use crate::request::{DependencyRequest, RequestKind};
use ahash::AHashMap;
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Root-first sequence of component types naming one node of the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentPath {
    components: Vec<TypeName>,
}

impl ComponentPath {
    pub fn root(component: TypeName) -> Self {
        Self {
            components: vec![component],
        }
    }

    pub fn from_components(components: Vec<TypeName>) -> Self {
        Self { components }
    }

    pub fn child(&self, component: TypeName) -> Self {
        let mut components = self.components.clone();
        components.push(component);
        Self { components }
    }

    pub fn parent(&self) -> Option<Self> {
        (self.components.len() > 1).then(|| Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// The component this path ends at
    pub fn current(&self) -> &TypeName {
        &self.components[self.components.len() - 1]
    }

    pub fn root_component(&self) -> &TypeName {
        &self.components[0]
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.components.len() == 1
    }

    pub fn components(&self) -> &[TypeName] {
        &self.components
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Whether `self` is `other` or one of its ancestors
    pub fn is_ancestor_or_self(&self, other: &ComponentPath) -> bool {
        other.components.starts_with(&self.components)
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.components.iter().map(TypeName::as_str).collect();
        f.write_str(&names.join(" -> "))
    }
}

/// The resolved graph of one component and, through its subgraphs, every
/// subcomponent reachable from it
pub struct BindingGraph {
    component: Arc<ComponentDescriptor>,
    path: ComponentPath,
    contribution_order: Vec<Key>,
    contribution_bindings: AHashMap<Key, ResolvedBindings>,
    members_order: Vec<Key>,
    members_injection_bindings: AHashMap<Key, ResolvedBindings>,
    subgraphs: Vec<BindingGraph>,
    owned_modules: Vec<Arc<ModuleDescriptor>>,
    factory_method: Option<ComponentMethodDescriptor>,
    full_binding_graph: bool,
    network: OnceCell<BindingNetwork>,
}

impl fmt::Debug for BindingGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingGraph")
            .field("path", &self.path)
            .field("keys", &self.contribution_order.len())
            .field("members_injection", &self.members_order.len())
            .field("subgraphs", &self.subgraphs)
            .field("full_binding_graph", &self.full_binding_graph)
            .finish()
    }
}

pub(crate) struct GraphParts {
    pub component: Arc<ComponentDescriptor>,
    pub path: ComponentPath,
    pub contribution_order: Vec<Key>,
    pub contribution_bindings: AHashMap<Key, ResolvedBindings>,
    pub members_order: Vec<Key>,
    pub members_injection_bindings: AHashMap<Key, ResolvedBindings>,
    pub subgraphs: Vec<BindingGraph>,
    pub owned_modules: Vec<Arc<ModuleDescriptor>>,
    pub factory_method: Option<ComponentMethodDescriptor>,
    pub full_binding_graph: bool,
}

impl BindingGraph {
    pub(crate) fn from_parts(parts: GraphParts) -> Self {
        Self {
            component: parts.component,
            path: parts.path,
            contribution_order: parts.contribution_order,
            contribution_bindings: parts.contribution_bindings,
            members_order: parts.members_order,
            members_injection_bindings: parts.members_injection_bindings,
            subgraphs: parts.subgraphs,
            owned_modules: parts.owned_modules,
            factory_method: parts.factory_method,
            full_binding_graph: parts.full_binding_graph,
            network: OnceCell::new(),
        }
    }

    #[inline]
    pub fn component(&self) -> &Arc<ComponentDescriptor> {
        &self.component
    }

    #[inline]
    pub fn path(&self) -> &ComponentPath {
        &self.path
    }

    #[inline]
    pub fn is_full_binding_graph(&self) -> bool {
        self.full_binding_graph
    }

    pub fn subgraphs(&self) -> &[BindingGraph] {
        &self.subgraphs
    }

    /// Modules installed here and not in an ancestor
    pub fn owned_modules(&self) -> &[Arc<ModuleDescriptor>] {
        &self.owned_modules
    }

    /// The parent's method creating this subcomponent, if any
    pub fn factory_method(&self) -> Option<&ComponentMethodDescriptor> {
        self.factory_method.as_ref()
    }

    pub fn resolved_bindings(&self, key: &Key) -> Option<&ResolvedBindings> {
        self.contribution_bindings.get(key)
    }

    pub fn members_injection_bindings(&self, key: &Key) -> Option<&ResolvedBindings> {
        self.members_injection_bindings.get(key)
    }

    /// The bindings satisfying `request` as seen from this component
    pub fn resolved_for_request(&self, request: &DependencyRequest) -> Option<&ResolvedBindings> {
        match request.kind {
            RequestKind::MembersInjection => self.members_injection_bindings(&request.key),
            _ => self.resolved_bindings(&request.key),
        }
    }

    /// Every resolved key, in resolution order
    pub fn contribution_bindings(&self) -> impl Iterator<Item = &ResolvedBindings> {
        self.contribution_order
            .iter()
            .filter_map(|k| self.contribution_bindings.get(k))
    }

    pub fn all_members_injection_bindings(&self) -> impl Iterator<Item = &ResolvedBindings> {
        self.members_order
            .iter()
            .filter_map(|k| self.members_injection_bindings.get(k))
    }

    /// Bindings this component owns, each once
    pub fn owned_bindings(&self) -> Vec<&BindingRef> {
        let mut seen = ahash::AHashSet::new();
        self.contribution_bindings()
            .chain(self.all_members_injection_bindings())
            .flat_map(|rb| rb.owned_by(&self.path))
            .filter(|b| seen.insert(Arc::as_ptr(b)))
            .collect()
    }

    /// This graph and all subgraphs, parents before children
    pub fn graphs(&self) -> Vec<&BindingGraph> {
        let mut graphs = Vec::new();
        let mut stack = vec![self];
        while let Some(graph) = stack.pop() {
            graphs.push(graph);
            stack.extend(graph.subgraphs.iter().rev());
        }
        graphs
    }

    pub fn subgraph(&self, path: &ComponentPath) -> Option<&BindingGraph> {
        self.graphs().into_iter().find(|g| &g.path == path)
    }

    /// The node-and-edge view validators run over
    pub fn network(&self) -> &BindingNetwork {
        self.network.get_or_init(|| BindingNetwork::from_graph(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_path() {
        let root = ComponentPath::root(TypeName::new("test.App"));
        let child = root.child(TypeName::new("test.Session"));
        assert!(root.is_root());
        assert!(!child.is_root());
        assert_eq!(child.current().as_str(), "test.Session");
        assert_eq!(child.root_component().as_str(), "test.App");
        assert_eq!(child.parent(), Some(root.clone()));
        assert!(root.is_ancestor_or_self(&child));
        assert!(!child.is_ancestor_or_self(&root));
        assert_eq!(child.to_string(), "test.App -> test.Session");
    }
}
