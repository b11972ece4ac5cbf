//! Binding graph construction
//!
//! [`BindingGraphFactory`] walks a component tree top-down. Each component
//! gets a resolver that indexes the explicit bindings and declarations of the
//! modules it owns, then resolves its entry points and everything they reach.
//! Resolvers live in an arena indexed root-first, so a child reaches its
//! ancestors by index while it is being resolved, and ancestors are complete
//! before any child starts.

use super::{BindingGraph, ComponentPath, GraphParts, ResolvedBindings};
use crate::binding::{
    BindingFactory, BindingKind, BindingRef, BindingType, DelegateDeclaration, ModuleDescriptor,
    MultibindingDeclaration, OptionalBindingDeclaration, SubcomponentDeclaration,
};
use crate::component::ComponentDescriptor;
use crate::context::RoundContext;
use crate::error::{CodegenError, Result};
use crate::framework::names;
use crate::key::Key;
use crate::model::{AnnotatedElement, ExecutableElement, TypeName};
use crate::request::RequestKind;
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Per-component resolution state
struct Resolver {
    parent: Option<usize>,
    component: Arc<ComponentDescriptor>,
    path: ComponentPath,
    owned_modules: Vec<Arc<ModuleDescriptor>>,
    producer_modules: AHashSet<TypeName>,

    /// Every explicit binding, by its full key
    explicit_bindings: AHashMap<Key, Vec<BindingRef>>,
    explicit_set: AHashSet<BindingRef>,
    /// Multibinding contributions, by key without contribution identifier
    explicit_multibinding_contributions: AHashMap<Key, Vec<BindingRef>>,
    delegates: AHashMap<Key, Vec<DelegateDeclaration>>,
    delegate_multibindings: AHashMap<Key, Vec<DelegateDeclaration>>,
    multibinding_declarations: AHashMap<Key, Vec<MultibindingDeclaration>>,
    /// By the key of the optional value
    optional_declarations: AHashMap<Key, Vec<OptionalBindingDeclaration>>,
    subcomponent_declarations: AHashMap<Key, Vec<SubcomponentDeclaration>>,

    contribution_order: Vec<Key>,
    resolved_contributions: AHashMap<Key, ResolvedBindings>,
    members_order: Vec<Key>,
    resolved_members: AHashMap<Key, ResolvedBindings>,

    cycle_stack: Vec<Key>,
    depends_on_local_cache: AHashMap<Key, bool>,
    subcomponents_to_resolve: VecDeque<Arc<ComponentDescriptor>>,
}

impl Resolver {
    fn new(parent: Option<usize>, component: Arc<ComponentDescriptor>, path: ComponentPath) -> Self {
        Self {
            parent,
            component,
            path,
            owned_modules: Vec::new(),
            producer_modules: AHashSet::new(),
            explicit_bindings: AHashMap::new(),
            explicit_set: AHashSet::new(),
            explicit_multibinding_contributions: AHashMap::new(),
            delegates: AHashMap::new(),
            delegate_multibindings: AHashMap::new(),
            multibinding_declarations: AHashMap::new(),
            optional_declarations: AHashMap::new(),
            subcomponent_declarations: AHashMap::new(),
            contribution_order: Vec::new(),
            resolved_contributions: AHashMap::new(),
            members_order: Vec::new(),
            resolved_members: AHashMap::new(),
            cycle_stack: Vec::new(),
            depends_on_local_cache: AHashMap::new(),
            subcomponents_to_resolve: VecDeque::new(),
        }
    }

    fn index_binding(&mut self, binding: BindingRef) {
        if binding.is_multibinding_contribution() {
            self.explicit_multibinding_contributions
                .entry(binding.key.without_contribution_identifier())
                .or_default()
                .push(binding.clone());
        }
        self.explicit_bindings
            .entry(binding.key.clone())
            .or_default()
            .push(binding.clone());
        self.explicit_set.insert(binding);
    }

    fn index_module(&mut self, module: &ModuleDescriptor) {
        for binding in &module.bindings {
            self.index_binding(binding.clone());
        }
        for delegate in &module.delegates {
            if delegate.contribution_type.is_multibinding() {
                self.delegate_multibindings
                    .entry(delegate.key.without_contribution_identifier())
                    .or_default()
                    .push(delegate.clone());
            }
            self.delegates
                .entry(delegate.key.clone())
                .or_default()
                .push(delegate.clone());
        }
        for declaration in &module.multibinding_declarations {
            self.multibinding_declarations
                .entry(declaration.key.clone())
                .or_default()
                .push(declaration.clone());
        }
        for declaration in &module.optional_declarations {
            self.optional_declarations
                .entry(declaration.key.clone())
                .or_default()
                .push(declaration.clone());
        }
        for declaration in &module.subcomponent_declarations {
            self.subcomponent_declarations
                .entry(declaration.key.clone())
                .or_default()
                .push(declaration.clone());
        }
        if module.is_producer_module() {
            self.producer_modules.insert(module.name.clone());
        }
    }

    fn has_local_explicit_bindings(&self, key: &Key) -> bool {
        self.explicit_bindings.get(key).is_some_and(|b| !b.is_empty())
            || self.delegates.get(key).is_some_and(|d| !d.is_empty())
    }

    fn has_local_multibinding_contributions(&self, key: &Key) -> bool {
        self.explicit_multibinding_contributions
            .get(key)
            .is_some_and(|b| !b.is_empty())
            || self.delegate_multibindings.get(key).is_some_and(|d| !d.is_empty())
    }

    fn contains_explicit_binding(&self, binding: &BindingRef) -> bool {
        if self.explicit_set.contains(binding) {
            return true;
        }
        if binding.kind() == BindingKind::Delegate
            && self.delegates.get(&binding.key).is_some_and(|decls| {
                decls.iter().any(|d| {
                    Some(d.element) == binding.binding_element
                        && Some(&d.contributing_module) == binding.contributing_module.as_ref()
                })
            })
        {
            return true;
        }
        self.subcomponent_declarations.contains_key(&binding.key)
    }

    fn record_contribution(&mut self, key: Key, resolved: ResolvedBindings) {
        if self.resolved_contributions.insert(key.clone(), resolved).is_none() {
            self.contribution_order.push(key);
        }
    }

    fn record_members_injection(&mut self, key: Key, resolved: ResolvedBindings) {
        if self.resolved_members.insert(key.clone(), resolved).is_none() {
            self.members_order.push(key);
        }
    }
}

/// Builds [`BindingGraph`]s for component descriptors
pub struct BindingGraphFactory<'c, 'p> {
    ctx: &'c mut RoundContext<'p>,
    resolvers: Vec<Resolver>,
}

impl<'c, 'p> BindingGraphFactory<'c, 'p> {
    pub fn new(ctx: &'c mut RoundContext<'p>) -> Self {
        Self {
            ctx,
            resolvers: Vec::new(),
        }
    }

    /// Resolves the graph for `component` and every subcomponent it reaches.
    ///
    /// With `full_binding_graph`, every binding the owned modules declare is
    /// resolved whether or not an entry point requests it, and every child
    /// component gets a subgraph.
    pub fn create(&mut self, component: Arc<ComponentDescriptor>, full_binding_graph: bool) -> Result<BindingGraph> {
        self.resolvers.clear();
        let graph = self.create_graph(None, component, full_binding_graph)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_injector_codegen",
            component = %graph.path(),
            subgraphs = graph.graphs().len() - 1,
            full = full_binding_graph,
            "Built binding graph"
        );

        Ok(graph)
    }

    fn create_graph(
        &mut self,
        parent: Option<usize>,
        component: Arc<ComponentDescriptor>,
        full: bool,
    ) -> Result<BindingGraph> {
        let path = match parent {
            Some(p) => self.resolvers[p].path.child(component.type_name.clone()),
            None => ComponentPath::root(component.type_name.clone()),
        };
        let mut resolver = Resolver::new(parent, Arc::clone(&component), path);
        for binding in self.component_bindings(&component)? {
            resolver.index_binding(binding);
        }

        let inherited: AHashSet<TypeName> = self
            .lineage(parent)
            .into_iter()
            .flat_map(|i| self.resolvers[i].owned_modules.iter().map(|m| m.name.clone()))
            .collect();
        resolver.owned_modules = component
            .modules
            .iter()
            .filter(|m| !inherited.contains(&m.name))
            .cloned()
            .collect();
        for module in resolver.owned_modules.clone() {
            resolver.index_module(&module);
        }

        self.resolvers.push(resolver);
        let idx = self.resolvers.len() - 1;

        for method in component.entry_point_methods() {
            let Some(request) = &method.request else {
                continue;
            };
            if request.kind == RequestKind::MembersInjection {
                self.resolve_members_injection(idx, &request.key)?;
            } else {
                self.resolve(idx, &request.key)?;
            }
        }

        if full {
            let keys: Vec<Key> = self.resolvers[idx]
                .owned_modules
                .iter()
                .flat_map(|m| {
                    m.bindings
                        .iter()
                        .map(|b| b.key.clone())
                        .chain(m.delegates.iter().map(|d| d.key.clone()))
                        .chain(m.multibinding_declarations.iter().map(|d| d.key.clone()))
                        .chain(m.subcomponent_declarations.iter().map(|d| d.key.clone()))
                })
                .map(|k| k.without_contribution_identifier())
                .collect();
            for key in keys {
                self.resolve(idx, &key)?;
            }
        }

        let children: Vec<Arc<ComponentDescriptor>> = if full {
            component.child_components().into_iter().cloned().collect()
        } else {
            component
                .children_by_factory_method
                .iter()
                .chain(&component.children_by_creator_method)
                .map(|(_, c)| Arc::clone(c))
                .collect()
        };
        self.resolvers[idx].subcomponents_to_resolve.extend(children);

        let mut resolved_children = AHashSet::new();
        let mut subgraphs = Vec::new();
        while let Some(child) = self.resolvers[idx].subcomponents_to_resolve.pop_front() {
            if resolved_children.insert(child.type_name.clone()) {
                subgraphs.push(self.create_graph(Some(idx), child, full)?);
            }
        }

        let resolver = self
            .resolvers
            .pop()
            .ok_or_else(|| CodegenError::internal("resolver arena underflow"))?;
        let factory_method = parent.and_then(|p| {
            self.resolvers[p]
                .component
                .factory_method_for(&component.type_name)
                .cloned()
        });

        Ok(BindingGraph::from_parts(GraphParts {
            component,
            path: resolver.path,
            contribution_order: resolver.contribution_order,
            contribution_bindings: resolver.resolved_contributions,
            members_order: resolver.members_order,
            members_injection_bindings: resolver.resolved_members,
            subgraphs,
            owned_modules: resolver.owned_modules,
            factory_method,
            full_binding_graph: full,
        }))
    }

    /// Bindings the component itself contributes: its own type, its
    /// dependencies and their methods, bound instances, and creators of
    /// children returned by component methods
    fn component_bindings(&mut self, component: &ComponentDescriptor) -> Result<Vec<BindingRef>> {
        let program = self.ctx.program();
        let factory = &mut self.ctx.bindings;
        let mut bindings = Vec::new();

        if component.is_real_component() {
            if let Some(element) = program.type_element(&component.type_name) {
                bindings.push(factory.component_binding(element));
            }
        }

        for dependency in &component.dependencies {
            let Some(element) = dependency.type_name().and_then(|n| program.type_element(n)) else {
                continue;
            };
            bindings.push(factory.component_dependency_binding(element));
            for method in program.all_methods(&element.name) {
                if is_contribution_method(method) {
                    bindings.push(factory.component_method_binding(element, method, component.is_production())?);
                }
            }
        }

        if let Some(creator) = &component.creator {
            for requirement in creator.bound_instance_requirements() {
                if let (Some(key), Some(element)) = (&requirement.key, requirement.element) {
                    bindings.push(factory.bound_instance_binding(
                        key.clone(),
                        element,
                        &requirement.variable_name,
                        requirement.nullable,
                    ));
                }
            }
        }

        for (method, child) in &component.children_by_creator_method {
            if component.declared_by_modules(&child.type_name) {
                continue;
            }
            if let Some(creator) = &child.creator {
                bindings.push(factory.subcomponent_creator_method_binding(
                    &creator.type_name,
                    &child.type_name,
                    method.element,
                ));
            }
        }

        Ok(bindings)
    }

    // ========================================================================
    // Lineage
    // ========================================================================

    /// Resolver indexes from the root down to `idx`
    fn lineage(&self, idx: Option<usize>) -> Vec<usize> {
        let mut lineage = Vec::new();
        let mut current = idx;
        while let Some(i) = current {
            lineage.push(i);
            current = self.resolvers[i].parent;
        }
        lineage.reverse();
        lineage
    }

    fn previously_resolved(&self, idx: usize, key: &Key) -> Option<&ResolvedBindings> {
        let mut current = Some(idx);
        while let Some(i) = current {
            if let Some(resolved) = self.resolvers[i].resolved_contributions.get(key) {
                return Some(resolved);
            }
            current = self.resolvers[i].parent;
        }
        None
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Every binding and declaration that can satisfy `request_key` from the
    /// component at `idx`
    fn lookup(&mut self, idx: usize, request_key: &Key) -> Result<ResolvedBindings> {
        let lineage = self.lineage(Some(idx));
        let mut keys = vec![request_key.clone()];
        keys.extend(request_key.implicit_matching_keys());

        let mut bindings: Vec<BindingRef> = Vec::new();
        let mut contributions: Vec<BindingRef> = Vec::new();
        let mut multibinding_declarations = Vec::new();
        let mut subcomponent_declarations: Vec<SubcomponentDeclaration> = Vec::new();
        let mut optional_declarations = Vec::new();

        for key in &keys {
            // Explicit bindings from the closest component that has any
            let closest = lineage
                .iter()
                .rev()
                .copied()
                .find(|&i| self.resolvers[i].has_local_explicit_bindings(key));
            if let Some(i) = closest {
                let resolver = &self.resolvers[i];
                bindings.extend(resolver.explicit_bindings.get(key).into_iter().flatten().cloned());
                let delegates: Vec<DelegateDeclaration> =
                    resolver.delegates.get(key).into_iter().flatten().cloned().collect();
                for delegate in &delegates {
                    bindings.push(self.delegate_binding(idx, delegate)?);
                }
            }

            let mut delegate_contributions = Vec::new();
            for &i in &lineage {
                let resolver = &self.resolvers[i];
                contributions.extend(
                    resolver
                        .explicit_multibinding_contributions
                        .get(key)
                        .into_iter()
                        .flatten()
                        .cloned(),
                );
                delegate_contributions.extend(resolver.delegate_multibindings.get(key).into_iter().flatten().cloned());
                multibinding_declarations.extend(
                    resolver
                        .multibinding_declarations
                        .get(key)
                        .into_iter()
                        .flatten()
                        .cloned(),
                );
                subcomponent_declarations.extend(
                    resolver
                        .subcomponent_declarations
                        .get(key)
                        .into_iter()
                        .flatten()
                        .cloned(),
                );
            }
            for delegate in &delegate_contributions {
                contributions.push(self.delegate_binding(idx, delegate)?);
            }
        }

        if !contributions.is_empty() || !multibinding_declarations.is_empty() {
            bindings.push(self.ctx.bindings.multibinding(request_key, &contributions, false));
        }

        if let Some(value_key) = BindingFactory::optional_value_key(request_key) {
            for &i in &lineage {
                optional_declarations.extend(
                    self.resolvers[i]
                        .optional_declarations
                        .get(&value_key)
                        .into_iter()
                        .flatten()
                        .cloned(),
                );
            }
        }
        if !optional_declarations.is_empty() {
            let underlying = match BindingFactory::optional_value_request(request_key) {
                Some(value) => binding_type_of(&self.lookup(idx, &value.key)?),
                None => None,
            };
            bindings.push(self.ctx.bindings.optional_binding(request_key, underlying));
        }

        if !subcomponent_declarations.is_empty() {
            let declarations: Vec<&SubcomponentDeclaration> = subcomponent_declarations.iter().collect();
            if let Some(binding) = self.ctx.bindings.subcomponent_creator_binding(&declarations) {
                self.enqueue_subcomponent(idx, &binding);
                bindings.push(binding);
            }
        }

        if bindings.is_empty() {
            if let Some(binding) = self.implicit_binding(idx, request_key)? {
                bindings.push(binding);
            }
        }

        let mut resolved = ResolvedBindings::new(request_key.clone());
        for binding in bindings {
            let owner = self.owning_path(idx, request_key, &binding)?;
            resolved.add(owner, binding);
        }
        resolved.multibinding_declarations = multibinding_declarations;
        resolved.optional_declarations = optional_declarations;
        resolved.subcomponent_declarations = subcomponent_declarations;
        Ok(resolved)
    }

    /// Just-in-time binding for a key nothing declares: a members injector,
    /// or an `@Inject` constructor
    fn implicit_binding(&mut self, idx: usize, key: &Key) -> Result<Option<BindingRef>> {
        if key.ty().is_type_of(names::MEMBERS_INJECTOR) {
            let Some(members_type) = key.ty().only_type_arg().cloned() else {
                return Ok(None);
            };
            let Some(members) = self.ctx.members_injection_binding(&members_type)? else {
                return Ok(None);
            };
            return Ok(Some(self.ctx.bindings.members_injector_binding(key, &members)));
        }
        let Some(binding) = self.ctx.injection_binding(key)? else {
            return Ok(None);
        };
        if self.is_incorrectly_scoped_in_partial_graph(idx, &binding) {
            return Ok(None);
        }
        Ok(Some(binding))
    }

    /// A scoped `@Inject` type in a module's graph that no component of the
    /// lineage can hold
    fn is_incorrectly_scoped_in_partial_graph(&self, idx: usize, binding: &BindingRef) -> bool {
        let Some(scope) = &binding.scope else {
            return false;
        };
        let root_is_real = self.resolvers[0].component.is_real_component();
        let owner = self.owning_resolver(idx, binding).unwrap_or(idx);
        !root_is_real && !self.resolvers[owner].component.scopes.contains(scope)
    }

    fn delegate_binding(&mut self, idx: usize, declaration: &DelegateDeclaration) -> Result<BindingRef> {
        let target_key = declaration.delegate_request.key.clone();
        let production_module = self
            .lineage(Some(idx))
            .iter()
            .any(|&i| self.resolvers[i].producer_modules.contains(&declaration.contributing_module));

        if self.resolvers[idx].cycle_stack.contains(&target_key) {
            return Ok(self.ctx.bindings.delegate_binding(declaration, None, production_module));
        }
        self.resolvers[idx].cycle_stack.push(target_key.clone());
        let target = self.lookup(idx, &target_key);
        self.resolvers[idx].cycle_stack.pop();

        let target = target?
            .binding_refs()
            .next()
            .map(|b| (b.binding_type, b.nullable));
        Ok(self.ctx.bindings.delegate_binding(declaration, target, production_module))
    }

    fn enqueue_subcomponent(&mut self, idx: usize, creator_binding: &BindingRef) {
        let owner = self.owning_resolver(idx, creator_binding).unwrap_or(idx);
        let Some(creator) = creator_binding.key.ty().declared_name() else {
            return;
        };
        if let Some(child) = self.resolvers[owner].component.child_with_creator(creator).cloned() {
            self.resolvers[owner].subcomponents_to_resolve.push_back(child);
        }
    }

    // ========================================================================
    // Ownership
    // ========================================================================

    /// The resolver whose component must hold `binding`, if any is forced
    fn owning_resolver(&self, idx: usize, binding: &BindingRef) -> Option<usize> {
        let lineage = self.lineage(Some(idx));

        let production_scoped = binding.scope.as_ref().is_some_and(|s| s.is_production_scope());
        if production_scoped || binding.binding_type == BindingType::Production {
            for &i in &lineage {
                let resolver = &self.resolvers[i];
                if binding.kind() == BindingKind::Injection && resolver.component.is_production() {
                    return Some(i);
                }
                if resolver.contains_explicit_binding(binding) {
                    return Some(i);
                }
            }
        }

        if binding.scope.as_ref().is_some_and(|s| s.is_reusable()) {
            return lineage.iter().rev().copied().find(|&i| {
                self.resolvers[i]
                    .resolved_contributions
                    .get(&binding.key)
                    .is_some_and(|rb| rb.contains(binding))
            });
        }

        if let Some(i) = lineage
            .iter()
            .rev()
            .copied()
            .find(|&i| self.resolvers[i].contains_explicit_binding(binding))
        {
            return Some(i);
        }

        let scope = binding.scope.as_ref()?;
        lineage
            .iter()
            .rev()
            .copied()
            .find(|&i| self.resolvers[i].component.scopes.contains(scope))
    }

    /// The component path that owns `binding` when `request_key` is
    /// resolved at `idx`
    fn owning_path(&mut self, idx: usize, request_key: &Key, binding: &BindingRef) -> Result<ComponentPath> {
        let owner = self.owning_resolver(idx, binding);
        let here = self.resolvers[idx].path.clone();
        let (Some(owner), Some(parent)) = (owner, self.resolvers[idx].parent) else {
            return Ok(here);
        };
        if owner == idx {
            return Ok(here);
        }
        self.resolve(parent, request_key)?;
        if self.binding_depends_on_local_bindings(idx, binding, &mut Visited::default()) {
            return Ok(here);
        }
        Ok(self.resolvers[parent]
            .resolved_contributions
            .get(request_key)
            .and_then(|rb| rb.owner_of(binding))
            .cloned()
            .unwrap_or(here))
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolves `key` at `idx` and, transitively, the dependencies of the
    /// bindings owned there
    fn resolve(&mut self, idx: usize, key: &Key) -> Result<()> {
        {
            let resolver = &self.resolvers[idx];
            if resolver.cycle_stack.contains(key) || resolver.resolved_contributions.contains_key(key) {
                return Ok(());
            }
        }

        if let Some(parent) = self.resolvers[idx].parent {
            if self.previously_resolved(parent, key).is_some() {
                // An intermediate component may add contributions or conflicts
                self.resolve(parent, key)?;
                if !self.key_depends_on_local_bindings(idx, key, &mut Visited::default())
                    && !self.resolvers[idx].has_local_explicit_bindings(key)
                {
                    if let Some(inherited) = self.previously_resolved(parent, key).cloned() {
                        #[cfg(feature = "logging")]
                        trace!(
                            target: "dependency_injector_codegen",
                            key = %key,
                            component = %self.resolvers[idx].path,
                            "Reusing ancestor resolution"
                        );
                        self.resolvers[idx].record_contribution(key.clone(), inherited);
                        return Ok(());
                    }
                }
            }
        }

        self.resolvers[idx].cycle_stack.push(key.clone());
        let outcome = self.resolve_here(idx, key);
        self.resolvers[idx].cycle_stack.pop();
        outcome
    }

    fn resolve_here(&mut self, idx: usize, key: &Key) -> Result<()> {
        let resolved = self.lookup(idx, key)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_injector_codegen",
            key = %key,
            component = %self.resolvers[idx].path,
            bindings = resolved.len(),
            "Resolved key"
        );

        let dependencies = self.owned_dependency_keys(idx, &resolved);
        self.resolvers[idx].record_contribution(key.clone(), resolved);
        for dependency in dependencies {
            self.resolve(idx, &dependency)?;
        }
        Ok(())
    }

    fn resolve_members_injection(&mut self, idx: usize, key: &Key) -> Result<()> {
        let mut resolved = ResolvedBindings::new(key.clone());
        if let Some(binding) = self.ctx.members_injection_binding(key.ty())? {
            resolved.add(self.resolvers[idx].path.clone(), binding);
        }
        let dependencies = self.owned_dependency_keys(idx, &resolved);
        self.resolvers[idx].record_members_injection(key.clone(), resolved);
        for dependency in dependencies {
            self.resolve(idx, &dependency)?;
        }
        Ok(())
    }

    fn owned_dependency_keys(&self, idx: usize, resolved: &ResolvedBindings) -> Vec<Key> {
        resolved
            .owned_by(&self.resolvers[idx].path)
            .flat_map(|b| b.dependencies.iter().map(|d| d.key.clone()))
            .collect()
    }

    // ========================================================================
    // Local dependencies
    // ========================================================================

    /// Whether the resolution of `key` inherited from an ancestor would
    /// change at `idx`: it reaches multibinding or optional contributions
    /// declared here
    fn key_depends_on_local_bindings(&mut self, idx: usize, key: &Key, visited: &mut Visited) -> bool {
        if !visited.keys.insert(key.clone()) {
            return false;
        }
        if let Some(&cached) = self.resolvers[idx].depends_on_local_cache.get(key) {
            return cached;
        }
        let result = self.key_depends_on_local_bindings_uncached(idx, key, visited);
        self.resolvers[idx].depends_on_local_cache.insert(key.clone(), result);
        result
    }

    fn key_depends_on_local_bindings_uncached(&mut self, idx: usize, key: &Key, visited: &mut Visited) -> bool {
        let Some(previous) = self.previously_resolved(idx, key) else {
            return true;
        };
        let bindings: Vec<BindingRef> = previous.binding_refs().cloned().collect();
        let has_optional = bindings.iter().any(|b| b.kind() == BindingKind::Optional);

        let resolver = &self.resolvers[idx];
        let mut matching = vec![key.clone()];
        matching.extend(key.implicit_matching_keys());
        if matching.iter().any(|k| resolver.has_local_multibinding_contributions(k)) {
            return true;
        }
        let local_optional = if has_optional {
            BindingFactory::optional_value_key(key)
                .is_some_and(|value| resolver.has_local_explicit_bindings(&value))
        } else {
            BindingFactory::optional_value_key(key)
                .is_some_and(|value| resolver.optional_declarations.contains_key(&value))
        };
        if local_optional {
            return true;
        }

        bindings
            .iter()
            .any(|b| self.binding_depends_on_local_bindings(idx, b, visited))
    }

    fn binding_depends_on_local_bindings(&mut self, idx: usize, binding: &BindingRef, visited: &mut Visited) -> bool {
        if !visited.bindings.insert(Arc::as_ptr(binding)) {
            return false;
        }
        let unscoped = binding.scope.as_ref().map_or(true, |s| s.is_reusable());
        if !unscoped || binding.is_production() {
            return false;
        }
        binding
            .dependencies
            .iter()
            .any(|d| self.key_depends_on_local_bindings(idx, &d.key, visited))
    }
}

#[derive(Default)]
struct Visited {
    keys: AHashSet<Key>,
    bindings: AHashSet<*const crate::binding::Binding>,
}

/// No-arg, non-void instance methods of a component dependency, excluding
/// those inherited from `Object`
fn is_contribution_method(method: &ExecutableElement) -> bool {
    method.parameters.is_empty()
        && !method.return_type.is_void()
        && !method.is_static()
        && !method.enclosing.is(names::OBJECT)
}

fn binding_type_of(resolved: &ResolvedBindings) -> Option<BindingType> {
    if resolved.is_empty() {
        None
    } else if resolved.binding_refs().any(|b| b.is_production()) {
        Some(BindingType::Production)
    } else {
        Some(BindingType::Provision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingVariant;
    use crate::component::ComponentDescriptorFactory;
    use crate::framework::{self, names};
    use crate::model::{Annotation, InMemoryProgram, MethodSpec, Modifier, ProgramBuilder, TypeMirror};
    use crate::options::CompilerOptions;
    use crate::scope::Scope;

    fn provides(name: &str, returns: &str) -> MethodSpec {
        MethodSpec::new(name)
            .modifier(Modifier::Static)
            .annotate(Annotation::new(names::PROVIDES))
            .returns(TypeMirror::named(returns))
    }

    fn into_set(name: &str, element: &str) -> MethodSpec {
        provides(name, element).annotate(Annotation::new(names::INTO_SET))
    }

    fn graph_for(program: &InMemoryProgram, root: &str, full: bool) -> BindingGraph {
        let mut ctx = RoundContext::new(program, CompilerOptions::default());
        let component = ComponentDescriptorFactory::new(&mut ctx)
            .root_component(&TypeName::new(root))
            .unwrap();
        BindingGraphFactory::new(&mut ctx).create(component, full).unwrap()
    }

    /// test.App installs ParentModule and has a Child subcomponent (created
    /// by factory method) that installs ChildModule
    fn parent_child_program() -> InMemoryProgram {
        let mut b = ProgramBuilder::new();
        b.class("test.ParentModule")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("provideFoo", "test.Foo"))
            .method(into_set("parentString", names::STRING))
            .finish();
        b.class("test.ChildModule")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("childFoo", "test.Foo"))
            .method(into_set("childString", names::STRING))
            .finish();
        b.inject_class("test.Bar", &[TypeMirror::named("test.Foo")]);
        b.interface("test.Child")
            .annotate(
                Annotation::new(names::SUBCOMPONENT)
                    .with_types("modules", vec![TypeMirror::named("test.ChildModule")]),
            )
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .method(MethodSpec::new("strings").returns(framework::set_of(TypeMirror::named(names::STRING))))
            .method(MethodSpec::new("bar").returns(TypeMirror::named("test.Bar")))
            .finish();
        b.interface("test.App")
            .annotate(
                Annotation::new(names::COMPONENT)
                    .with_types("modules", vec![TypeMirror::named("test.ParentModule")]),
            )
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .method(MethodSpec::new("strings").returns(framework::set_of(TypeMirror::named(names::STRING))))
            .method(MethodSpec::new("child").returns(TypeMirror::named("test.Child")))
            .finish();
        b.build()
    }

    #[test]
    fn test_entry_points_resolved() {
        let program = parent_child_program();
        let graph = graph_for(&program, "test.App", false);
        let foo = graph.resolved_bindings(&Key::named("test.Foo")).unwrap();
        let (owner, binding) = foo.single().unwrap();
        assert_eq!(owner, graph.path());
        assert_eq!(binding.kind(), BindingKind::Provision);
        assert_eq!(graph.subgraphs().len(), 1);
        assert!(graph.subgraphs()[0].factory_method().is_some());
    }

    #[test]
    fn test_child_shadows_ancestor_binding() {
        let program = parent_child_program();
        let graph = graph_for(&program, "test.App", false);
        let child = &graph.subgraphs()[0];
        let foo = child.resolved_bindings(&Key::named("test.Foo")).unwrap();
        let (owner, binding) = foo.single().unwrap();
        assert_eq!(owner, child.path());
        assert_eq!(binding.contributing_module.as_ref().unwrap().as_str(), "test.ChildModule");
    }

    #[test]
    fn test_multibindings_aggregate_across_lineage() {
        let program = parent_child_program();
        let graph = graph_for(&program, "test.App", false);
        let key = Key::of(framework::set_of(TypeMirror::named(names::STRING)));

        let parent_set = graph.resolved_bindings(&key).unwrap();
        assert_eq!(parent_set.single().unwrap().1.dependencies.len(), 1);

        let child = &graph.subgraphs()[0];
        let child_set = child.resolved_bindings(&key).unwrap();
        let (owner, binding) = child_set.single().unwrap();
        assert_eq!(owner, child.path());
        assert!(matches!(binding.variant, BindingVariant::MultiboundSet));
        assert_eq!(binding.dependencies.len(), 2);
    }

    #[test]
    fn test_set_contributions_from_two_modules() {
        let mut b = ProgramBuilder::new();
        b.class("test.A")
            .annotate(Annotation::new(names::MODULE))
            .method(into_set("a", names::STRING))
            .finish();
        b.class("test.B")
            .annotate(Annotation::new(names::MODULE))
            .method(into_set("b", names::STRING))
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT).with_types(
                "modules",
                vec![TypeMirror::named("test.A"), TypeMirror::named("test.B")],
            ))
            .method(MethodSpec::new("strings").returns(framework::set_of(TypeMirror::named(names::STRING))))
            .finish();
        let program = b.build();
        let graph = graph_for(&program, "test.App", false);

        let key = Key::of(framework::set_of(TypeMirror::named(names::STRING)));
        let (_, set) = graph.resolved_bindings(&key).unwrap().single().unwrap();
        assert!(matches!(set.variant, BindingVariant::MultiboundSet));
        assert_eq!(set.dependencies.len(), 2);
    }

    #[test]
    fn test_child_inject_binding_depends_on_local_binding() {
        let program = parent_child_program();
        let graph = graph_for(&program, "test.App", false);
        let child = &graph.subgraphs()[0];
        let bar = child.resolved_bindings(&Key::named("test.Bar")).unwrap();
        assert_eq!(bar.single().unwrap().0, child.path());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let program = parent_child_program();
        let first = graph_for(&program, "test.App", false);
        let second = graph_for(&program, "test.App", false);
        let keys = |g: &BindingGraph| g.contribution_bindings().map(|rb| rb.key.to_string()).collect::<Vec<_>>();
        assert_eq!(keys(&first), keys(&second));
        for rb in first.contribution_bindings() {
            let other = second.resolved_bindings(&rb.key).unwrap();
            assert_eq!(rb, other);
        }
    }

    #[test]
    fn test_inherited_resolution_is_reused() {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.Dep", &[]);
        b.interface("test.Child")
            .annotate(Annotation::new(names::SUBCOMPONENT))
            .method(MethodSpec::new("dep").returns(TypeMirror::named("test.Dep")))
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("dep").returns(TypeMirror::named("test.Dep")))
            .method(MethodSpec::new("child").returns(TypeMirror::named("test.Child")))
            .finish();
        let program = b.build();
        let graph = graph_for(&program, "test.App", false);
        let child = &graph.subgraphs()[0];
        let dep = child.resolved_bindings(&Key::named("test.Dep")).unwrap();
        assert_eq!(dep.single().unwrap().0, graph.path());
        assert!(child.owned_bindings().is_empty());
    }

    #[test]
    fn test_scoped_inject_binding_owned_by_scoped_ancestor() {
        let mut b = ProgramBuilder::new();
        b.class("test.Cache")
            .annotate(Annotation::new(names::SINGLETON))
            .constructor(MethodSpec::constructor().annotate(Annotation::new(names::INJECT)))
            .finish();
        b.interface("test.Child")
            .annotate(Annotation::new(names::SUBCOMPONENT))
            .method(MethodSpec::new("cache").returns(TypeMirror::named("test.Cache")))
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .annotate(Annotation::new(names::SINGLETON))
            .method(MethodSpec::new("child").returns(TypeMirror::named("test.Child")))
            .finish();
        let program = b.build();
        let graph = graph_for(&program, "test.App", false);
        let child = &graph.subgraphs()[0];
        let cache = child.resolved_bindings(&Key::named("test.Cache")).unwrap();
        let (owner, binding) = cache.single().unwrap();
        assert_eq!(binding.scope, Some(Scope::singleton()));
        assert_eq!(owner, graph.path());
        assert!(graph.resolved_bindings(&Key::named("test.Cache")).is_some());
    }

    #[test]
    fn test_module_subcomponent_enqueued_by_creator_request() {
        let mut b = ProgramBuilder::new();
        b.class("test.AppModule")
            .annotate(
                Annotation::new(names::MODULE)
                    .with_types("subcomponents", vec![TypeMirror::named("test.Session")]),
            )
            .finish();
        b.interface("test.Session")
            .annotate(Annotation::new(names::SUBCOMPONENT))
            .finish();
        b.interface("test.Session.Builder")
            .nested_in("test.Session")
            .annotate(Annotation::new(names::SUBCOMPONENT_BUILDER))
            .method(MethodSpec::new("build").returns(TypeMirror::named("test.Session")))
            .finish();
        b.inject_class("test.Launcher", &[TypeMirror::named("test.Session.Builder")]);
        b.interface("test.App")
            .annotate(
                Annotation::new(names::COMPONENT)
                    .with_types("modules", vec![TypeMirror::named("test.AppModule")]),
            )
            .method(MethodSpec::new("launcher").returns(TypeMirror::named("test.Launcher")))
            .finish();
        let program = b.build();

        let graph = graph_for(&program, "test.App", false);
        let creator = graph
            .resolved_bindings(&Key::named("test.Session.Builder"))
            .unwrap();
        assert_eq!(creator.single().unwrap().1.kind(), BindingKind::SubcomponentCreator);
        assert_eq!(graph.subgraphs().len(), 1);
        assert_eq!(graph.subgraphs()[0].path().current().as_str(), "test.Session");
        assert!(graph.subgraphs()[0].factory_method().is_none());
    }

    #[test]
    fn test_unrequested_module_subcomponent_skipped_outside_full_mode() {
        let program = crate::component::tests::tree_program();
        let graph = graph_for(&program, "test.App", false);
        let children: Vec<_> = graph.subgraphs().iter().map(|g| g.path().current().to_string()).collect();
        assert_eq!(children, vec!["test.Request"]);

        let full = graph_for(&program, "test.App", true);
        assert!(full.is_full_binding_graph());
        assert_eq!(full.subgraphs().len(), 2);
    }

    #[test]
    fn test_component_and_dependency_bindings() {
        let program = crate::component::tests::tree_program();
        let graph = graph_for(&program, "test.App", true);
        let app = graph.resolved_bindings(&Key::named("test.App"));
        assert!(app.is_none(), "nothing requests the component type");

        let mut ctx = RoundContext::new(&program, CompilerOptions::default());
        let component = ComponentDescriptorFactory::new(&mut ctx)
            .root_component(&TypeName::new("test.App"))
            .unwrap();
        let mut factory = BindingGraphFactory::new(&mut ctx);
        let bindings = factory.component_bindings(&component).unwrap();
        let kinds: Vec<BindingKind> = bindings.iter().map(|b| b.kind()).collect();
        assert!(kinds.contains(&BindingKind::Component));
        assert!(kinds.contains(&BindingKind::ComponentDependency));
        assert!(kinds.contains(&BindingKind::ComponentProvision));
        assert!(kinds.contains(&BindingKind::BoundInstance));
    }

    #[test]
    fn test_delegate_to_missing_target_is_unresolved() {
        let mut b = ProgramBuilder::new();
        b.class("test.Module")
            .modifier(Modifier::Abstract)
            .annotate(Annotation::new(names::MODULE))
            .method(
                MethodSpec::abstract_method("bind")
                    .annotate(Annotation::new(names::BINDS))
                    .param("impl", TypeMirror::named("test.FooImpl"))
                    .returns(TypeMirror::named("test.Foo")),
            )
            .finish();
        b.interface("test.FooImpl").finish();
        b.interface("test.App")
            .annotate(
                Annotation::new(names::COMPONENT).with_types("modules", vec![TypeMirror::named("test.Module")]),
            )
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .finish();
        let program = b.build();
        let graph = graph_for(&program, "test.App", false);
        let foo = graph.resolved_bindings(&Key::named("test.Foo")).unwrap();
        assert!(foo.single().unwrap().1.is_unresolved_delegate());
        let target = graph.resolved_bindings(&Key::named("test.FooImpl")).unwrap();
        assert!(target.is_empty());
    }

    #[test]
    fn test_optional_binding_present_and_absent() {
        let mut b = ProgramBuilder::new();
        b.class("test.Module")
            .modifier(Modifier::Abstract)
            .annotate(Annotation::new(names::MODULE))
            .method(
                MethodSpec::abstract_method("optionalFoo")
                    .annotate(Annotation::new(names::BINDS_OPTIONAL_OF))
                    .returns(TypeMirror::named("test.Foo")),
            )
            .method(
                MethodSpec::abstract_method("optionalBar")
                    .annotate(Annotation::new(names::BINDS_OPTIONAL_OF))
                    .returns(TypeMirror::named("test.Bar")),
            )
            .method(provides("provideFoo", "test.Foo"))
            .finish();
        let optional = |name: &str| TypeMirror::declared(names::OPTIONAL, vec![TypeMirror::named(name)]);
        b.interface("test.App")
            .annotate(
                Annotation::new(names::COMPONENT).with_types("modules", vec![TypeMirror::named("test.Module")]),
            )
            .method(MethodSpec::new("foo").returns(optional("test.Foo")))
            .method(MethodSpec::new("bar").returns(optional("test.Bar")))
            .finish();
        let program = b.build();
        let graph = graph_for(&program, "test.App", false);

        let foo = graph.resolved_bindings(&Key::of(optional("test.Foo"))).unwrap();
        assert!(matches!(foo.single().unwrap().1.variant, BindingVariant::OptionalPresent { .. }));
        assert_eq!(foo.optional_declarations.len(), 1);
        let bar = graph.resolved_bindings(&Key::of(optional("test.Bar"))).unwrap();
        assert!(matches!(bar.single().unwrap().1.variant, BindingVariant::OptionalAbsent));
    }

    #[test]
    fn test_optional_of_provider_uses_value_declaration() {
        let mut b = ProgramBuilder::new();
        b.class("test.Module")
            .modifier(Modifier::Abstract)
            .annotate(Annotation::new(names::MODULE))
            .method(
                MethodSpec::abstract_method("optionalFoo")
                    .annotate(Annotation::new(names::BINDS_OPTIONAL_OF))
                    .returns(TypeMirror::named("test.Foo")),
            )
            .method(provides("provideFoo", "test.Foo"))
            .finish();
        let optional_provider = TypeMirror::declared(
            names::OPTIONAL,
            vec![TypeMirror::declared(names::PROVIDER, vec![TypeMirror::named("test.Foo")])],
        );
        b.interface("test.App")
            .annotate(
                Annotation::new(names::COMPONENT).with_types("modules", vec![TypeMirror::named("test.Module")]),
            )
            .method(MethodSpec::new("foo").returns(optional_provider.clone()))
            .finish();
        let program = b.build();
        let graph = graph_for(&program, "test.App", false);

        let foo = graph.resolved_bindings(&Key::of(optional_provider)).unwrap();
        assert_eq!(foo.optional_declarations.len(), 1);
        assert!(matches!(foo.single().unwrap().1.variant, BindingVariant::OptionalPresent { .. }));
    }
}
