//! Planning component implementations
//!
//! [`ComponentPlanner`] walks a validated graph top-down. Each component in
//! the current lineage has a [`ComponentState`] on a stack, so a request for
//! a binding owned by an ancestor is planned in that ancestor's state and may
//! add fields there. Every `(key, request kind)` is planned at most once per
//! component: the slot is reserved before its dependencies are planned, which
//! also lets requests that close a cycle through a provider terminate.

use super::*;
use crate::binding::{BindingKind, BindingRef, BindingVariant, ContributionType};
use crate::component::{ComponentDescriptor, ComponentMethodKind, ComponentRequirement, CreatorKind, lower_camel};
use crate::error::{CodegenError, Result};
use crate::graph::{BindingGraph, Edge, ResolvedBindings};
use crate::options::CompilerOptions;
use crate::request::DependencyRequest;
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Per-component state
// =============================================================================

struct ComponentState<'g> {
    graph: &'g BindingGraph,
    class_name: String,
    fields: Vec<FieldPlan>,
    methods: Vec<MethodPlan>,
    shapes: Vec<Option<RequestShape>>,
    memo: AHashMap<(Key, RequestKind), ShapeId>,
    names: AHashSet<String>,
    field_names: AHashSet<String>,
    requirement_fields: AHashMap<(RequirementKind, String), FieldId>,
    child_classes: AHashMap<TypeName, String>,
    modifiable: ModifiableBindingMethods,
    previous: ModifiableBindingMethods,
    children: Vec<ComponentPlan>,
    next_switch_id: usize,
}

impl<'g> ComponentState<'g> {
    fn new(graph: &'g BindingGraph, class_name: String, previous: ModifiableBindingMethods) -> Self {
        let mut modifiable = ModifiableBindingMethods::new();
        for method in previous.iter().filter(|m| m.finalized) {
            // Records are unique per request, so this cannot collide
            let _ = modifiable.add(method.clone());
        }
        let names = graph.component().methods.iter().map(|m| m.name.clone()).collect();
        Self {
            graph,
            class_name,
            fields: Vec::new(),
            methods: Vec::new(),
            shapes: Vec::new(),
            memo: AHashMap::new(),
            names,
            field_names: AHashSet::new(),
            requirement_fields: AHashMap::new(),
            child_classes: AHashMap::new(),
            modifiable,
            previous,
            children: Vec::new(),
            next_switch_id: 0,
        }
    }

    #[inline]
    fn path(&self) -> &ComponentPath {
        self.graph.path()
    }

    fn unique_name(&mut self, base: &str) -> String {
        unique_name(&mut self.names, base)
    }

    fn reserve(&mut self, key: &Key, kind: RequestKind) -> ShapeId {
        self.shapes.push(None);
        let id = self.shapes.len() - 1;
        self.memo.insert((key.clone(), kind), id);
        id
    }

    /// Adds a shape that is not memoized, such as the body of a method
    fn push_shape(&mut self, key: &Key, kind: RequestKind, shape: CodeShape) -> ShapeRef {
        self.shapes.push(Some(RequestShape {
            key: key.clone(),
            kind,
            shape,
        }));
        ShapeRef {
            component: self.path().clone(),
            shape: self.shapes.len() - 1,
        }
    }

    fn add_field(
        &mut self,
        base_name: &str,
        ty: TypeMirror,
        kind: FieldKind,
        key: Option<Key>,
        initializer: Option<ShapeRef>,
    ) -> FieldId {
        let name = unique_name(&mut self.field_names, base_name);
        self.fields.push(FieldPlan {
            name,
            ty,
            kind,
            key,
            initializer,
        });
        self.fields.len() - 1
    }

    fn add_method(&mut self, method: MethodPlan) -> MethodId {
        self.methods.push(method);
        self.methods.len() - 1
    }

    fn requirement_field(&mut self, requirement: &ComponentRequirement) -> FieldRef {
        let index = (requirement.kind, requirement.variable_name.clone());
        let field = match self.requirement_fields.get(&index) {
            Some(&field) => field,
            None => {
                let field = self.add_field(
                    &requirement.variable_name,
                    requirement.ty.clone(),
                    FieldKind::Requirement(requirement.kind),
                    requirement.key.clone(),
                    None,
                );
                self.requirement_fields.insert(index, field);
                field
            }
        };
        FieldRef {
            component: self.path().clone(),
            field,
        }
    }

    fn into_plan(self, is_abstract: bool) -> Result<ComponentPlan> {
        let component = self.graph.component();
        let mut shapes = Vec::with_capacity(self.shapes.len());
        for (id, shape) in self.shapes.into_iter().enumerate() {
            shapes.push(
                shape.ok_or_else(|| CodegenError::internal(format!("Shape {} of {} was never completed", id, self.class_name)))?,
            );
        }
        Ok(ComponentPlan {
            path: self.graph.path().clone(),
            class_name: self.class_name,
            component: component.type_name.clone(),
            is_abstract,
            supertypes: vec![component.ty.clone()],
            creator_class: creator_class_name(component),
            fields: self.fields,
            methods: self.methods,
            shapes,
            children: self.children,
            modifiable_methods: self.modifiable,
        })
    }
}

// =============================================================================
// Planner
// =============================================================================

/// Plans the implementation of a root component and every subcomponent
pub struct ComponentPlanner<'g> {
    root: &'g BindingGraph,
    options: &'g CompilerOptions,
    previous: AHashMap<ComponentPath, ModifiableBindingMethods>,
    states: Vec<ComponentState<'g>>,
}

impl<'g> ComponentPlanner<'g> {
    pub fn new(root: &'g BindingGraph, options: &'g CompilerOptions) -> Self {
        Self {
            root,
            options,
            previous: AHashMap::new(),
            states: Vec::new(),
        }
    }

    /// Modifiable methods an earlier compilation unit recorded for the
    /// subcomponent at `path`
    pub fn with_previous_methods(mut self, path: ComponentPath, methods: ModifiableBindingMethods) -> Self {
        self.previous.insert(path, methods);
        self
    }

    pub fn plan(mut self) -> Result<ComponentPlan> {
        let class_name = format!("Dagger{}", self.root.component().type_name.simple_name());
        let plan = self.plan_component(self.root, class_name)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_injector_codegen",
            component = %plan.path,
            classes = plan.plans().len(),
            fields = plan.fields.len(),
            methods = plan.methods.len(),
            "Planned component"
        );

        Ok(plan)
    }

    fn enter(&mut self, graph: &'g BindingGraph, class_name: String) -> usize {
        let previous = self.previous.remove(graph.path()).unwrap_or_default();
        let mut state = ComponentState::new(graph, class_name, previous);
        let mut classes = AHashSet::new();
        for subgraph in graph.subgraphs() {
            let child = &subgraph.component().type_name;
            let class = unique_name(&mut classes, &format!("{}Impl", child.simple_name()));
            state.child_classes.insert(child.clone(), class);
        }
        self.states.push(state);
        self.states.len() - 1
    }

    fn plan_component(&mut self, graph: &'g BindingGraph, class_name: String) -> Result<ComponentPlan> {
        let depth = self.enter(graph, class_name);
        self.plan_component_methods(depth)?;
        self.finish_modifiable_methods(depth)?;

        for subgraph in graph.subgraphs() {
            let class_name = self.child_class(depth, &subgraph.component().type_name)?;
            let child = self.plan_component(subgraph, class_name)?;
            self.states[depth].children.push(child);
        }

        let is_abstract = self.is_aot_subcomponent(depth);
        let state = self
            .states
            .pop()
            .ok_or_else(|| CodegenError::internal("Component state stack is empty"))?;
        state.into_plan(is_abstract)
    }

    fn plan_component_methods(&mut self, depth: usize) -> Result<()> {
        let component = Arc::clone(self.states[depth].graph.component());
        for method in &component.methods {
            let (kind, body) = match method.kind {
                ComponentMethodKind::Provision
                | ComponentMethodKind::Production
                | ComponentMethodKind::MembersInjection => {
                    let Some(request) = &method.request else {
                        continue;
                    };
                    let shape = self.plan_request(depth, &request.key, request.kind)?;
                    (MethodKind::ComponentMethod, MethodBody::Returns(shape))
                }
                ComponentMethodKind::SubcomponentFactory => {
                    let Some(child) = &method.subcomponent else {
                        continue;
                    };
                    let class_name = self.child_class(depth, child)?;
                    (
                        MethodKind::ChildFactory { child: child.clone() },
                        MethodBody::NewChild { class_name },
                    )
                }
                ComponentMethodKind::SubcomponentCreator => {
                    let Some(child) = &method.subcomponent else {
                        continue;
                    };
                    let class_name = self.child_creator_class(depth, child)?;
                    (
                        MethodKind::ChildCreator { child: child.clone() },
                        MethodBody::NewChildCreator { class_name },
                    )
                }
            };
            self.states[depth].add_method(MethodPlan {
                name: method.name.clone(),
                kind,
                return_type: method.return_type.clone(),
                parameters: method.parameters.clone(),
                body,
            });
        }
        Ok(())
    }

    #[inline]
    fn is_aot_subcomponent(&self, depth: usize) -> bool {
        self.options.ahead_of_time_subcomponents() && !self.states[depth].path().is_root()
    }

    fn child_class(&self, depth: usize, child: &TypeName) -> Result<String> {
        self.states[depth]
            .child_classes
            .get(child)
            .cloned()
            .ok_or_else(|| CodegenError::internal(format!("{} has no subgraph for {}", self.states[depth].path(), child)))
    }

    fn child_creator_class(&self, depth: usize, child: &TypeName) -> Result<String> {
        let parent = self.states[depth].graph.component();
        let creator = parent
            .child(child)
            .and_then(|c| c.creator.as_ref())
            .ok_or_else(|| CodegenError::internal(format!("{} has no creator", child)))?;
        let suffix = match creator.kind {
            CreatorKind::Builder => "Builder",
            CreatorKind::Factory => "Factory",
        };
        Ok(format!("{}{}", child.simple_name(), suffix))
    }

    fn depth_of(&self, path: &ComponentPath) -> Result<usize> {
        self.states
            .iter()
            .position(|s| s.path() == path)
            .ok_or_else(|| CodegenError::internal(format!("{} is not in the current lineage", path)))
    }

    fn resolved(&self, depth: usize, key: &Key, kind: RequestKind) -> Option<&'g ResolvedBindings> {
        let graph = self.states[depth].graph;
        match kind {
            RequestKind::MembersInjection => graph.members_injection_bindings(key),
            _ => graph.resolved_bindings(key),
        }
    }

    fn binding_for(&self, depth: usize, key: &Key, kind: RequestKind) -> Result<Option<(ComponentPath, BindingRef)>> {
        match self.resolved(depth, key, kind) {
            Some(resolved) if resolved.len() > 1 => Err(CodegenError::internal(format!(
                "{} is bound multiple times in {}",
                key,
                self.states[depth].path()
            ))),
            Some(resolved) => Ok(resolved.single().map(|(owner, b)| (owner.clone(), Arc::clone(b)))),
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// The shape satisfying `key` requested as `kind` from the component at
    /// `depth`; the same request always yields the same shape
    fn plan_request(&mut self, depth: usize, key: &Key, kind: RequestKind) -> Result<ShapeRef> {
        if let Some(&shape) = self.states[depth].memo.get(&(key.clone(), kind)) {
            #[cfg(feature = "logging")]
            trace!(
                target: "dependency_injector_codegen",
                key = %key,
                kind = ?kind,
                component = %self.states[depth].path(),
                "Reusing planned shape"
            );
            return Ok(ShapeRef {
                component: self.states[depth].path().clone(),
                shape,
            });
        }

        let binding = self.binding_for(depth, key, kind)?;
        if let Some((owner, _)) = &binding {
            if owner != self.states[depth].path() {
                let owner_depth = self.depth_of(owner)?;
                return self.plan_request(owner_depth, key, kind);
            }
        }

        let id = self.states[depth].reserve(key, kind);
        let shape = match binding {
            Some((_, binding)) => {
                let shape = self.choose_shape(depth, key, kind, &binding)?;
                self.wrap_modifiable(depth, key, kind, Some(&binding), shape)?
            }
            None if self.is_aot_subcomponent(depth) => self.modifiable_method(depth, key, kind, None, None)?,
            None => {
                return Err(CodegenError::internal(format!(
                    "No binding for {} in {}",
                    key,
                    self.states[depth].path()
                )));
            }
        };
        self.states[depth].shapes[id] = Some(RequestShape {
            key: key.clone(),
            kind,
            shape,
        });
        Ok(ShapeRef {
            component: self.states[depth].path().clone(),
            shape: id,
        })
    }

    fn choose_shape(&mut self, depth: usize, key: &Key, kind: RequestKind, binding: &BindingRef) -> Result<CodeShape> {
        let derived = |from: ShapeRef, conversion: Conversion| Ok(CodeShape::Derived { from, conversion });
        match kind {
            RequestKind::Instance => self.instance_shape(depth, binding),
            RequestKind::Provider => self.framework_shape(depth, binding, FrameworkType::Provider),
            RequestKind::Producer if binding.is_production() => {
                self.framework_shape(depth, binding, FrameworkType::Producer)
            }
            RequestKind::Producer => derived(
                self.plan_request(depth, key, RequestKind::Provider)?,
                Conversion::ProducerFromProvider,
            ),
            RequestKind::Lazy => derived(self.plan_request(depth, key, RequestKind::Provider)?, Conversion::Lazy),
            RequestKind::ProviderOfLazy => derived(
                self.plan_request(depth, key, RequestKind::Provider)?,
                Conversion::ProviderOfLazy,
            ),
            RequestKind::Produced => derived(self.plan_request(depth, key, RequestKind::Producer)?, Conversion::Produced),
            RequestKind::Future if binding.is_production() => {
                derived(self.plan_request(depth, key, RequestKind::Producer)?, Conversion::Future)
            }
            RequestKind::Future => derived(
                self.plan_request(depth, key, RequestKind::Instance)?,
                Conversion::ImmediateFuture,
            ),
            RequestKind::MembersInjection => self.members_injection_shape(depth, binding),
        }
    }

    fn instance_shape(&mut self, depth: usize, binding: &BindingRef) -> Result<CodeShape> {
        let key = &binding.key;
        if binding.is_production() {
            return Ok(CodeShape::Derived {
                from: self.plan_request(depth, key, RequestKind::Producer)?,
                conversion: Conversion::Future,
            });
        }
        if let (BindingVariant::Delegate { delegate_key, .. }, None) = (&binding.variant, &binding.scope) {
            let target = self.plan_request(depth, delegate_key, RequestKind::Instance)?;
            return Ok(CodeShape::Inline {
                expression: Expression::Delegate { target },
            });
        }

        if let Some(scope) = &binding.scope {
            let memoization = Memoization::for_scope(scope);
            if !self.options.fast_init() {
                // The framework field carries the memoization
                return Ok(CodeShape::Derived {
                    from: self.plan_request(depth, key, RequestKind::Provider)?,
                    conversion: Conversion::Get,
                });
            }
            let expression = self.instance_expression(depth, binding)?;
            let state = &mut self.states[depth];
            let initializer = state.push_shape(key, RequestKind::Instance, CodeShape::Inline { expression });
            let field = state.add_field(
                &field_name(key, ""),
                key.ty().clone(),
                FieldKind::MemoizedInstance(memoization),
                Some(key.clone()),
                Some(initializer),
            );
            return Ok(CodeShape::MemoizedField { field, memoization });
        }

        let expression = self.instance_expression(depth, binding)?;
        if self.needs_private_method(depth, binding) {
            let state = &mut self.states[depth];
            let body = state.push_shape(key, RequestKind::Instance, CodeShape::Inline { expression });
            let name = state.unique_name(&format!("get{}", key.ty().name_hint()));
            let method = state.add_method(MethodPlan {
                name,
                kind: MethodKind::Private,
                return_type: key.ty().clone(),
                parameters: Vec::new(),
                body: MethodBody::Returns(body),
            });
            return Ok(CodeShape::PrivateMethod { method });
        }
        Ok(CodeShape::Inline { expression })
    }

    fn framework_shape(&mut self, depth: usize, binding: &BindingRef, framework: FrameworkType) -> Result<CodeShape> {
        let key = &binding.key;
        let request_kind = match framework {
            FrameworkType::Provider => RequestKind::Provider,
            FrameworkType::Producer => RequestKind::Producer,
        };
        let scoped = binding.scope.as_ref().map(Memoization::for_scope);

        let (expression, memoization) = match &binding.variant {
            BindingVariant::Delegate { delegate_key, .. } => {
                let target = self.plan_request(depth, delegate_key, request_kind)?;
                if scoped.is_none() {
                    return Ok(CodeShape::Inline {
                        expression: Expression::Delegate { target },
                    });
                }
                (Expression::Delegate { target }, scoped)
            }
            _ if self.options.fast_init() && framework == FrameworkType::Provider => {
                let instance = self.plan_request(depth, key, RequestKind::Instance)?;
                let state = &mut self.states[depth];
                let id = state.next_switch_id;
                state.next_switch_id += 1;
                // The instance shape already memoizes scoped bindings
                (Expression::SwitchingProvider { id, instance }, None)
            }
            BindingVariant::Component
            | BindingVariant::BoundInstance { .. }
            | BindingVariant::ComponentDependency { .. }
            | BindingVariant::SubcomponentCreator { .. } => {
                let instance = self.plan_request(depth, key, RequestKind::Instance)?;
                (Expression::InstanceFactory { instance }, None)
            }
            _ => {
                let mut arguments = Vec::with_capacity(binding.dependencies.len());
                for dependency in &binding.dependencies {
                    let kind = self.framework_request_kind(depth, dependency);
                    arguments.push(self.plan_request(depth, &dependency.key, kind)?);
                }
                let expression = Expression::Factory {
                    factory: factory_name(self.states[depth].graph.component(), binding),
                    arguments,
                    memoization: scoped,
                };
                (expression, scoped)
            }
        };

        let state = &mut self.states[depth];
        let initializer = state.push_shape(key, request_kind, CodeShape::Inline { expression });
        let field = state.add_field(
            &field_name(key, framework_suffix(framework)),
            framework.wrap(key.ty()),
            FieldKind::FrameworkInstance { framework, memoization },
            Some(key.clone()),
            Some(initializer),
        );
        Ok(CodeShape::FrameworkField { field })
    }

    fn members_injection_shape(&mut self, depth: usize, binding: &BindingRef) -> Result<CodeShape> {
        let key = &binding.key;
        let mut arguments = Vec::with_capacity(binding.dependencies.len());
        for dependency in &binding.dependencies {
            arguments.push(self.plan_request(depth, &dependency.key, dependency.kind)?);
        }
        let ty = type_name_of(binding);
        let state = &mut self.states[depth];
        let body = state.push_shape(
            key,
            RequestKind::MembersInjection,
            CodeShape::Inline {
                expression: Expression::InjectMembers {
                    ty: ty.clone(),
                    arguments,
                },
            },
        );
        let name = state.unique_name(&format!("inject{}", ty.simple_name()));
        let method = state.add_method(MethodPlan {
            name,
            kind: MethodKind::Private,
            return_type: key.ty().clone(),
            parameters: vec![key.ty().clone()],
            body: MethodBody::Returns(body),
        });
        Ok(CodeShape::PrivateMethod { method })
    }

    fn instance_expression(&mut self, depth: usize, binding: &BindingRef) -> Result<Expression> {
        let expression = match &binding.variant {
            BindingVariant::Injection { injection_sites, .. } => {
                let member_count: usize = injection_sites.iter().map(|s| s.dependencies.len()).sum();
                let constructor_count = binding.dependencies.len().saturating_sub(member_count);
                let mut planned = self.plan_dependencies(depth, &binding.dependencies)?;
                let members = planned.split_off(constructor_count);
                Expression::Construct {
                    ty: type_name_of(binding),
                    arguments: planned,
                    members,
                }
            }
            BindingVariant::Provision {
                method_name,
                requires_module_instance,
                ..
            } => {
                let module = binding
                    .contributing_module
                    .clone()
                    .ok_or_else(|| CodegenError::internal(format!("{} has no contributing module", binding)))?;
                let instance = if *requires_module_instance {
                    let ty = TypeMirror::named(module.as_str());
                    Some(self.requirement_field(depth, RequirementKind::Module, |r| r.ty == ty)?)
                } else {
                    None
                };
                Expression::ModuleMethod {
                    module,
                    method: method_name.clone(),
                    instance,
                    arguments: self.plan_dependencies(depth, &binding.dependencies)?,
                }
            }
            BindingVariant::Delegate { delegate_key, .. } => {
                let kind = binding.dependencies.first().map_or(RequestKind::Instance, |d| d.kind);
                Expression::Delegate {
                    target: self.plan_request(depth, delegate_key, kind)?,
                }
            }
            BindingVariant::MultiboundSet => {
                let mut contributions = Vec::with_capacity(binding.dependencies.len());
                for dependency in &binding.dependencies {
                    let contribution_type = self
                        .contribution(depth, &dependency.key)
                        .map_or(ContributionType::Set, |b| b.contribution_type);
                    contributions.push((contribution_type, self.plan_request(depth, &dependency.key, dependency.kind)?));
                }
                Expression::SetOf { contributions }
            }
            BindingVariant::MultiboundMap => {
                let mut entries = Vec::with_capacity(binding.dependencies.len());
                for dependency in &binding.dependencies {
                    let map_key = self.contribution(depth, &dependency.key).and_then(|b| b.map_key.clone());
                    entries.push((map_key, self.plan_request(depth, &dependency.key, dependency.kind)?));
                }
                Expression::MapOf { entries }
            }
            BindingVariant::OptionalPresent { .. } => {
                let dependency = binding
                    .dependencies
                    .first()
                    .ok_or_else(|| CodegenError::internal(format!("{} has no underlying request", binding)))?;
                Expression::Present {
                    value: self.plan_request(depth, &dependency.key, dependency.kind)?,
                }
            }
            BindingVariant::OptionalAbsent => Expression::Absent,
            BindingVariant::Component => Expression::ThisComponent,
            BindingVariant::ComponentDependency { dependency } => {
                let ty = TypeMirror::named(dependency.as_str());
                Expression::Requirement {
                    field: self.requirement_field(depth, RequirementKind::Dependency, |r| r.ty == ty)?,
                }
            }
            BindingVariant::ComponentProvision { dependency, method_name }
            | BindingVariant::ComponentProduction { dependency, method_name } => {
                let ty = TypeMirror::named(dependency.as_str());
                Expression::DependencyMethod {
                    dependency: self.requirement_field(depth, RequirementKind::Dependency, |r| r.ty == ty)?,
                    method: method_name.clone(),
                }
            }
            BindingVariant::BoundInstance { .. } => {
                let key = binding.key.clone();
                Expression::Requirement {
                    field: self.requirement_field(depth, RequirementKind::BoundInstance, |r| r.key.as_ref() == Some(&key))?,
                }
            }
            BindingVariant::SubcomponentCreator { subcomponent } => Expression::ChildCreator {
                class_name: self.child_creator_class(depth, subcomponent)?,
            },
            BindingVariant::MembersInjector { members_key } => {
                let mut arguments = Vec::with_capacity(binding.dependencies.len());
                for dependency in &binding.dependencies {
                    arguments.push(self.plan_request(depth, &dependency.key, RequestKind::Provider)?);
                }
                let injector = members_key
                    .ty()
                    .declared_name()
                    .map(|n| TypeName::new(format!("{}_MembersInjector", n)))
                    .ok_or_else(|| CodegenError::internal(format!("{} is not a declared type", members_key)))?;
                Expression::MembersInjector { injector, arguments }
            }
            BindingVariant::Production { .. } | BindingVariant::MembersInjection { .. } => {
                return Err(CodegenError::internal(format!("{} has no instance expression", binding)));
            }
        };
        Ok(expression)
    }

    fn plan_dependencies(&mut self, depth: usize, dependencies: &[DependencyRequest]) -> Result<Vec<ShapeRef>> {
        let mut planned = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            planned.push(self.plan_request(depth, &dependency.key, dependency.kind)?);
        }
        Ok(planned)
    }

    /// The field for the nearest requirement accepted by `matches`, created
    /// in whichever component of the lineage declares it
    fn requirement_field(
        &mut self,
        depth: usize,
        kind: RequirementKind,
        matches: impl Fn(&ComponentRequirement) -> bool,
    ) -> Result<FieldRef> {
        for d in (0..=depth).rev() {
            let requirement = self.states[d]
                .graph
                .component()
                .requirements()
                .into_iter()
                .find(|r| r.kind == kind && matches(r));
            if let Some(requirement) = requirement {
                return Ok(self.states[d].requirement_field(&requirement));
            }
        }
        Err(CodegenError::internal(format!(
            "No {:?} requirement in {}",
            kind,
            self.states[depth].path()
        )))
    }

    fn contribution(&self, depth: usize, key: &Key) -> Option<&'g BindingRef> {
        self.states[depth]
            .graph
            .resolved_bindings(key)
            .and_then(|r| r.binding_refs().next())
    }

    fn framework_request_kind(&self, depth: usize, dependency: &DependencyRequest) -> RequestKind {
        match dependency.kind {
            RequestKind::Producer | RequestKind::Produced | RequestKind::Future => RequestKind::Producer,
            _ if self.contribution(depth, &dependency.key).is_some_and(|b| b.is_production()) => RequestKind::Producer,
            _ => RequestKind::Provider,
        }
    }

    /// Whether the instance expression belongs in a method of its own
    fn needs_private_method(&self, depth: usize, binding: &BindingRef) -> bool {
        if binding.dependencies.is_empty()
            || !matches!(
                binding.kind(),
                BindingKind::Injection | BindingKind::Provision | BindingKind::MultiboundSet | BindingKind::MultiboundMap
            )
        {
            return false;
        }
        let network = self.root.network();
        let Some(node) = network.binding_node(self.states[depth].path(), binding) else {
            return false;
        };
        let is_dependency = |e: &crate::graph::NetworkEdge| matches!(e.edge, Edge::Dependency { .. });
        let requests = network.in_edges(node).filter(|e| is_dependency(e)).count();
        requests > 1
            || network
                .out_edges(node)
                .filter(|e| is_dependency(e))
                .any(|e| e.target == node || network.shortest_path(e.target, node, is_dependency).is_some())
    }

    // -------------------------------------------------------------------------
    // Ahead-of-time subcomponents
    // -------------------------------------------------------------------------

    fn wrap_modifiable(
        &mut self,
        depth: usize,
        key: &Key,
        kind: RequestKind,
        binding: Option<&BindingRef>,
        shape: CodeShape,
    ) -> Result<CodeShape> {
        if !self.is_aot_subcomponent(depth)
            || !matches!(
                kind,
                RequestKind::Instance | RequestKind::Provider | RequestKind::Producer | RequestKind::MembersInjection
            )
            || self.states[depth].modifiable.get(key, kind).is_some_and(|m| m.finalized)
        {
            return Ok(shape);
        }
        let Some(modifiable_type) = ModifiableBindingType::of(binding.map(|b| &**b)) else {
            return Ok(shape);
        };
        let body = self.states[depth].push_shape(key, kind, shape);
        self.modifiable_method(depth, key, kind, Some(modifiable_type), Some(body))
    }

    /// Declares the overridable method for a request, reusing the name an
    /// earlier compilation unit gave it
    fn modifiable_method(
        &mut self,
        depth: usize,
        key: &Key,
        kind: RequestKind,
        modifiable_type: Option<ModifiableBindingType>,
        body: Option<ShapeRef>,
    ) -> Result<CodeShape> {
        let modifiable_type = modifiable_type.unwrap_or(ModifiableBindingType::Missing);
        let state = &mut self.states[depth];
        let name = match state.previous.get(key, kind) {
            Some(previous) => {
                let name = previous.method_name.clone();
                state.names.insert(name.clone());
                name
            }
            None => state.unique_name(&format!("get{}{}", key.ty().name_hint(), kind.name_suffix())),
        };
        state.modifiable.add(ModifiableBindingMethod {
            key: key.clone(),
            request_kind: kind,
            method_name: name.clone(),
            modifiable_type,
            finalized: false,
        })?;
        let body = match body {
            Some(body) if !modifiable_type.is_abstract() => MethodBody::Returns(body),
            _ => MethodBody::Abstract,
        };
        let method = state.add_method(MethodPlan {
            name,
            kind: MethodKind::Modifiable {
                modifiable_type,
                finalized: false,
            },
            return_type: kind.request_type(key.ty()),
            parameters: Vec::new(),
            body,
        });
        Ok(CodeShape::ModifiableMethod { method })
    }

    /// Overrides or prunes what earlier compilation units left open
    fn finish_modifiable_methods(&mut self, depth: usize) -> Result<()> {
        let open: Vec<ModifiableBindingMethod> = self.states[depth].previous.unfinalized().cloned().collect();
        let aot = self.is_aot_subcomponent(depth);
        for record in open {
            let resolvable = self
                .resolved(depth, &record.key, record.request_kind)
                .is_some_and(|r| !r.is_empty());

            if !resolvable {
                let state = &mut self.states[depth];
                if aot {
                    // Still open; the inherited abstract method stays as is
                    if state.modifiable.get(&record.key, record.request_kind).is_none() {
                        state.modifiable.add(record)?;
                    }
                    continue;
                }
                state.names.insert(record.method_name.clone());
                state.add_method(MethodPlan {
                    name: record.method_name.clone(),
                    kind: MethodKind::Pruned,
                    return_type: record.request_kind.request_type(record.key.ty()),
                    parameters: Vec::new(),
                    body: MethodBody::Throws {
                        message: format!(
                            "{} was pruned from the binding graph; reaching it is a code generation bug",
                            record.key
                        ),
                    },
                });
                state.modifiable.add(ModifiableBindingMethod {
                    finalized: true,
                    ..record
                })?;
                continue;
            }

            let shape = self.plan_request(depth, &record.key, record.request_kind)?;
            let state = &mut self.states[depth];
            let still_open = state
                .modifiable
                .get(&record.key, record.request_kind)
                .is_some_and(|m| !m.finalized);
            if still_open {
                continue;
            }
            state.names.insert(record.method_name.clone());
            state.add_method(MethodPlan {
                name: record.method_name.clone(),
                kind: MethodKind::Modifiable {
                    modifiable_type: record.modifiable_type,
                    finalized: true,
                },
                return_type: record.request_kind.request_type(record.key.ty()),
                parameters: Vec::new(),
                body: MethodBody::Returns(shape),
            });
            let (key, kind) = (record.key.clone(), record.request_kind);
            state.modifiable.add(record)?;
            state.modifiable.finalize(&key, kind)?;
        }
        Ok(())
    }
}

// =============================================================================
// Naming
// =============================================================================

/// `base`, or `base` with the first free numeric suffix
fn unique_name(taken: &mut AHashSet<String>, base: &str) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}{}", base, suffix);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn framework_suffix(framework: FrameworkType) -> &'static str {
    match framework {
        FrameworkType::Provider => "Provider",
        FrameworkType::Producer => "Producer",
    }
}

fn field_name(key: &Key, suffix: &str) -> String {
    let mut name = lower_camel(&key.ty().name_hint());
    if let Some(qualifier) = key.qualifier() {
        name = format!("{}{}", lower_camel(qualifier.annotation_type.simple_name()), key.ty().name_hint());
    }
    name.push_str(suffix);
    name
}

fn type_name_of(binding: &BindingRef) -> TypeName {
    binding
        .binding_type_element
        .clone()
        .or_else(|| binding.key.ty().declared_name().cloned())
        .unwrap_or_else(|| TypeName::new(binding.key.ty().to_string()))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The generated or framework factory class creating `binding`'s instances
fn factory_name(component: &ComponentDescriptor, binding: &BindingRef) -> TypeName {
    let production = binding.is_production();
    match &binding.variant {
        BindingVariant::Injection { .. } => TypeName::new(format!("{}_Factory", type_name_of(binding))),
        BindingVariant::Provision { method_name, .. } | BindingVariant::Production { method_name, .. } => {
            let module = binding
                .contributing_module
                .as_ref()
                .map_or_else(|| component.type_name.to_string(), ToString::to_string);
            TypeName::new(format!("{}_{}Factory", module, capitalize(method_name)))
        }
        BindingVariant::MultiboundSet if production => TypeName::new("dagger.producers.internal.SetProducer"),
        BindingVariant::MultiboundSet => TypeName::new("dagger.internal.SetFactory"),
        BindingVariant::MultiboundMap if production => TypeName::new("dagger.producers.internal.MapProducer"),
        BindingVariant::MultiboundMap => TypeName::new("dagger.internal.MapFactory"),
        BindingVariant::OptionalPresent { .. } => TypeName::new("dagger.internal.PresentFactory"),
        BindingVariant::OptionalAbsent => TypeName::new("dagger.internal.AbsentFactory"),
        BindingVariant::ComponentProvision { dependency, method_name }
        | BindingVariant::ComponentProduction { dependency, method_name } => TypeName::new(format!(
            "{}.{}_{}",
            component.type_name,
            dependency.simple_name(),
            capitalize(method_name)
        )),
        BindingVariant::MembersInjector { members_key } => TypeName::new(format!("{}_MembersInjector", members_key.ty())),
        _ => TypeName::new("dagger.internal.InstanceFactory"),
    }
}

fn creator_class_name(component: &ComponentDescriptor) -> Option<String> {
    let creator = component.creator.as_ref()?;
    if component.is_root() {
        return Some(creator.type_name.simple_name().to_string());
    }
    let suffix = match creator.kind {
        CreatorKind::Builder => "Builder",
        CreatorKind::Factory => "Factory",
    };
    Some(format!("{}{}", component.type_name.simple_name(), suffix))
}
