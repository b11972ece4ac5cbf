//! Component descriptors
//!
//! A [`ComponentDescriptor`] is the immutable summary of one component
//! type: its kind, scopes, installed modules, dependencies, creator, entry
//! points and child subcomponents. Descriptors are created once per type
//! per round by [`ComponentDescriptorFactory`] and cached on the
//! [`RoundContext`].

use crate::binding::{CREATOR_ANNOTATIONS, ModuleDescriptor};
use crate::context::RoundContext;
use crate::diagnostics::Diagnostic;
use crate::error::{CodegenError, Result};
use crate::framework::names;
use crate::key::Key;
use crate::model::{AnnotatedElement, ElementId, ExecutableElement, ProgramModel, TypeElement, TypeMirror, TypeName};
use crate::request::DependencyRequest;
use crate::scope::Scope;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Component,
    Subcomponent,
    ProductionComponent,
    ProductionSubcomponent,
    /// A module validated on its own as a full binding graph
    Module,
}

impl ComponentKind {
    pub fn annotation(self) -> &'static str {
        match self {
            Self::Component => names::COMPONENT,
            Self::Subcomponent => names::SUBCOMPONENT,
            Self::ProductionComponent => names::PRODUCTION_COMPONENT,
            Self::ProductionSubcomponent => names::PRODUCTION_SUBCOMPONENT,
            Self::Module => names::MODULE,
        }
    }

    /// The component kind a type is annotated as
    pub fn of(element: &TypeElement) -> Option<Self> {
        [
            Self::Component,
            Self::Subcomponent,
            Self::ProductionComponent,
            Self::ProductionSubcomponent,
        ]
        .into_iter()
        .find(|kind| element.has_annotation(kind.annotation()))
    }

    #[inline]
    pub fn is_root(self) -> bool {
        matches!(self, Self::Component | Self::ProductionComponent | Self::Module)
    }

    #[inline]
    pub fn is_production(self) -> bool {
        matches!(self, Self::ProductionComponent | Self::ProductionSubcomponent)
    }

    #[inline]
    pub fn is_real_component(self) -> bool {
        self != Self::Module
    }

    pub fn builder_annotation(self) -> Option<&'static str> {
        match self {
            Self::Component => Some(names::COMPONENT_BUILDER),
            Self::Subcomponent => Some(names::SUBCOMPONENT_BUILDER),
            Self::ProductionComponent => Some(names::PRODUCTION_COMPONENT_BUILDER),
            Self::ProductionSubcomponent => Some(names::PRODUCTION_SUBCOMPONENT_BUILDER),
            Self::Module => None,
        }
    }

    pub fn factory_annotation(self) -> Option<&'static str> {
        match self {
            Self::Component => Some(names::COMPONENT_FACTORY),
            Self::Subcomponent => Some(names::SUBCOMPONENT_FACTORY),
            Self::ProductionComponent => Some(names::PRODUCTION_COMPONENT_FACTORY),
            Self::ProductionSubcomponent => Some(names::PRODUCTION_SUBCOMPONENT_FACTORY),
            Self::Module => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// A module instance
    Module,
    /// A `dependencies = ...` instance
    Dependency,
    /// A `@BindsInstance` value
    BoundInstance,
}

/// Something a component needs handed to it when it is created
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRequirement {
    pub kind: RequirementKind,
    pub ty: TypeMirror,
    /// Bound-instance key
    pub key: Option<Key>,
    pub nullable: bool,
    pub element: Option<ElementId>,
    pub variable_name: String,
}

impl ComponentRequirement {
    fn for_type(kind: RequirementKind, ty: TypeMirror) -> Self {
        let variable_name = lower_camel(&ty.name_hint());
        Self {
            kind,
            ty,
            key: None,
            nullable: false,
            element: None,
            variable_name,
        }
    }

    pub fn module(ty: TypeMirror) -> Self {
        Self::for_type(RequirementKind::Module, ty)
    }

    pub fn dependency(ty: TypeMirror) -> Self {
        Self::for_type(RequirementKind::Dependency, ty)
    }

    pub fn bound_instance(key: Key, nullable: bool, element: ElementId, name: &str) -> Self {
        Self {
            kind: RequirementKind::BoundInstance,
            ty: key.ty().clone(),
            key: Some(key),
            nullable,
            element: Some(element),
            variable_name: name.to_string(),
        }
    }

    pub fn type_name(&self) -> Option<&TypeName> {
        self.ty.declared_name()
    }
}

/// `fooBar` from `FooBar`
pub(crate) fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreatorKind {
    Builder,
    Factory,
}

/// A component's `@Builder` or `@Factory`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorDescriptor {
    pub kind: CreatorKind,
    pub type_name: TypeName,
    pub element: ElementId,
    /// `build()` or `create(...)`
    pub factory_method: Option<String>,
    /// Setters or factory parameters, in declaration order
    pub requirements: Vec<ComponentRequirement>,
}

impl CreatorDescriptor {
    pub fn bound_instance_requirements(&self) -> impl Iterator<Item = &ComponentRequirement> {
        self.requirements
            .iter()
            .filter(|r| r.kind == RequirementKind::BoundInstance)
    }

    pub fn has_requirement_for(&self, ty: &TypeMirror) -> bool {
        self.requirements.iter().any(|r| &r.ty == ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentMethodKind {
    Provision,
    Production,
    MembersInjection,
    /// Returns a subcomponent, taking its modules as parameters
    SubcomponentFactory,
    /// Returns a subcomponent's builder or factory
    SubcomponentCreator,
}

/// One abstract method of a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentMethodDescriptor {
    pub kind: ComponentMethodKind,
    pub element: ElementId,
    pub name: String,
    pub return_type: TypeMirror,
    pub parameters: Vec<TypeMirror>,
    /// Entry-point request for provision, production and members-injection methods
    pub request: Option<DependencyRequest>,
    pub subcomponent: Option<TypeName>,
}

impl ComponentMethodDescriptor {
    #[inline]
    pub fn is_entry_point(&self) -> bool {
        self.request.is_some()
    }
}

/// One node of the component tree
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    pub kind: ComponentKind,
    pub type_name: TypeName,
    pub element: ElementId,
    pub ty: TypeMirror,
    pub scopes: Vec<Scope>,
    /// Transitively installed modules
    pub modules: Vec<Arc<ModuleDescriptor>>,
    pub dependencies: Vec<ComponentRequirement>,
    pub methods: Vec<ComponentMethodDescriptor>,
    pub creator: Option<CreatorDescriptor>,
    pub children_by_factory_method: Vec<(ComponentMethodDescriptor, Arc<ComponentDescriptor>)>,
    pub children_by_creator_method: Vec<(ComponentMethodDescriptor, Arc<ComponentDescriptor>)>,
    pub children_by_modules: Vec<Arc<ComponentDescriptor>>,
}

impl ComponentDescriptor {
    #[inline]
    pub fn is_production(&self) -> bool {
        self.kind.is_production()
    }

    #[inline]
    pub fn is_real_component(&self) -> bool {
        self.kind.is_real_component()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.kind.is_root()
    }

    pub fn has_creator(&self) -> bool {
        self.creator.is_some()
    }

    /// Methods that request keys from the graph
    pub fn entry_point_methods(&self) -> impl Iterator<Item = &ComponentMethodDescriptor> {
        self.methods.iter().filter(|m| m.is_entry_point())
    }

    /// Every child, each once, in declaration order
    pub fn child_components(&self) -> Vec<&Arc<ComponentDescriptor>> {
        let mut seen = AHashSet::new();
        self.children_by_factory_method
            .iter()
            .map(|(_, c)| c)
            .chain(self.children_by_creator_method.iter().map(|(_, c)| c))
            .chain(&self.children_by_modules)
            .filter(|c| seen.insert(c.type_name.clone()))
            .collect()
    }

    pub fn child(&self, name: &TypeName) -> Option<&Arc<ComponentDescriptor>> {
        self.child_components().into_iter().find(|c| &c.type_name == name)
    }

    /// The child whose creator is `creator`
    pub fn child_with_creator(&self, creator: &TypeName) -> Option<&Arc<ComponentDescriptor>> {
        self.child_components()
            .into_iter()
            .find(|c| c.creator.as_ref().is_some_and(|cr| &cr.type_name == creator))
    }

    /// The factory method creating `child`, if it is created by one
    pub fn factory_method_for(&self, child: &TypeName) -> Option<&ComponentMethodDescriptor> {
        self.children_by_factory_method
            .iter()
            .find(|(_, c)| &c.type_name == child)
            .map(|(m, _)| m)
    }

    pub fn declared_by_modules(&self, child: &TypeName) -> bool {
        self.children_by_modules.iter().any(|c| &c.type_name == child)
    }

    pub fn module_types(&self) -> Vec<TypeName> {
        self.modules.iter().map(|m| m.name.clone()).collect()
    }

    /// Everything the generated component must be given: modules with
    /// instance bindings, dependencies and bound instances
    pub fn requirements(&self) -> Vec<ComponentRequirement> {
        let mut requirements: Vec<ComponentRequirement> = self
            .modules
            .iter()
            .filter(|m| m.requires_instance())
            .map(|m| ComponentRequirement::module(m.module_type.clone()))
            .collect();
        requirements.extend(self.dependencies.iter().cloned());
        if let Some(creator) = &self.creator {
            requirements.extend(creator.bound_instance_requirements().cloned());
        }
        requirements
    }
}

// ============================================================================
// Descriptor factory
// ============================================================================

const INVALID_COMPONENT_METHOD: &str = "This method isn't a valid provision method, members injection method or \
                                        subcomponent factory method. Dagger cannot implement this method";

/// Creates component descriptors, following child subcomponents
pub struct ComponentDescriptorFactory<'c, 'p> {
    ctx: &'c mut RoundContext<'p>,
    stack: Vec<TypeName>,
    diagnostics: Vec<Diagnostic>,
}

impl<'c, 'p> ComponentDescriptorFactory<'c, 'p> {
    pub fn new(ctx: &'c mut RoundContext<'p>) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Problems found while describing components
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Descriptor for a `@Component` or `@ProductionComponent`
    pub fn root_component(&mut self, name: &TypeName) -> Result<Arc<ComponentDescriptor>> {
        let program = self.ctx.program();
        let element = program
            .type_element(name)
            .ok_or_else(|| CodegenError::type_not_present(name.as_str()))?;
        match ComponentKind::of(element) {
            Some(kind) if kind.is_root() => self
                .create(element, kind)?
                .ok_or_else(|| CodegenError::internal(format!("{} could not be described", name))),
            _ => Err(CodegenError::UnknownElement(format!("{} is not a root component", name))),
        }
    }

    /// Synthetic root component for validating a module as a full binding
    /// graph
    pub fn module_component(&mut self, module: &TypeName) -> Result<Arc<ComponentDescriptor>> {
        let program = self.ctx.program();
        let element = program
            .type_element(module)
            .ok_or_else(|| CodegenError::type_not_present(module.as_str()))?;
        self.create(element, ComponentKind::Module)?
            .ok_or_else(|| CodegenError::internal(format!("{} could not be described", module)))
    }

    fn create(&mut self, element: &'p TypeElement, kind: ComponentKind) -> Result<Option<Arc<ComponentDescriptor>>> {
        if kind.is_real_component() {
            if let Some(cached) = self.ctx.components.get(&element.name) {
                #[cfg(feature = "logging")]
                trace!(target: "dependency_injector_codegen", component = %element.name, "Descriptor cache hit");
                return Ok(Some(Arc::clone(cached)));
            }
        }
        if let Some(start) = self.stack.iter().position(|n| n == &element.name) {
            let mut cycle: Vec<String> = self.stack[start..].iter().map(ToString::to_string).collect();
            cycle.push(element.name.to_string());
            self.diagnostics.push(
                Diagnostic::error(format!("Subcomponent cycle: {}", cycle.join(" -> "))).at_element(Some(element.id)),
            );
            return Ok(None);
        }
        self.stack.push(element.name.clone());
        let descriptor = self.describe(element, kind);
        self.stack.pop();
        let descriptor = Arc::new(descriptor?);

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_injector_codegen",
            component = %descriptor.type_name,
            modules = descriptor.modules.len(),
            entry_points = descriptor.entry_point_methods().count(),
            children = descriptor.child_components().len(),
            "Created component descriptor"
        );

        if kind.is_real_component() {
            self.ctx
                .components
                .insert(element.name.clone(), Arc::clone(&descriptor));
        }
        Ok(Some(descriptor))
    }

    fn describe(&mut self, element: &'p TypeElement, kind: ComponentKind) -> Result<ComponentDescriptor> {
        let program = self.ctx.program();
        let injection = self.ctx.injection();
        let annotation = element.annotation(kind.annotation());

        let module_types = match kind {
            ComponentKind::Module => vec![element.as_type()],
            _ => annotation.map(|a| a.type_list("modules")).unwrap_or_default(),
        };
        for module in &module_types {
            program.check_type_present(module)?;
        }
        let mut modules = self.ctx.transitive_modules(&module_types)?;

        let mut scopes = injection.scopes(&element.annotations);
        if kind.is_production() {
            if !scopes.iter().any(Scope::is_production_scope) {
                scopes.push(Scope::production_scope());
            }
            modules.push(self.ctx.production_executor_module());
        }

        let mut dependencies = Vec::new();
        if kind.is_root() && kind.is_real_component() {
            for dependency in annotation.map(|a| a.type_list("dependencies")).unwrap_or_default() {
                program.check_type_present(&dependency)?;
                dependencies.push(ComponentRequirement::dependency(dependency));
            }
        }

        let creator = self.creator(element, kind)?;

        let mut descriptor = ComponentDescriptor {
            kind,
            type_name: element.name.clone(),
            element: element.id,
            ty: element.as_type(),
            scopes,
            modules,
            dependencies,
            methods: Vec::new(),
            creator,
            children_by_factory_method: Vec::new(),
            children_by_creator_method: Vec::new(),
            children_by_modules: Vec::new(),
        };

        if kind.is_real_component() {
            for method in program.all_methods(&element.name) {
                if method.enclosing.is(names::OBJECT) || !is_abstract_member(program, method) {
                    continue;
                }
                self.component_method(&mut descriptor, method)?;
            }
        }

        let declared: Vec<TypeName> = descriptor
            .modules
            .iter()
            .flat_map(|m| m.subcomponent_declarations.iter().map(|d| d.subcomponent.clone()))
            .collect();
        for subcomponent in declared {
            if descriptor.children_by_modules.iter().any(|c| c.type_name == subcomponent) {
                continue;
            }
            if let Some(child) = self.child(&subcomponent)? {
                descriptor.children_by_modules.push(child);
            }
        }

        Ok(descriptor)
    }

    fn child(&mut self, name: &TypeName) -> Result<Option<Arc<ComponentDescriptor>>> {
        let program = self.ctx.program();
        let element = program
            .type_element(name)
            .ok_or_else(|| CodegenError::type_not_present(name.as_str()))?;
        match ComponentKind::of(element) {
            Some(kind) if !kind.is_root() => self.create(element, kind),
            _ => {
                self.diagnostics.push(
                    Diagnostic::error(format!("{} is not a @Subcomponent or @ProductionSubcomponent", name))
                        .at_element(Some(element.id)),
                );
                Ok(None)
            }
        }
    }

    fn component_method(&mut self, descriptor: &mut ComponentDescriptor, method: &'p ExecutableElement) -> Result<()> {
        let program = self.ctx.program();
        let injection = self.ctx.injection();
        let signature = program.method_as_member_of(&descriptor.ty, method);
        let return_type = signature.return_type;
        program.check_type_present(&return_type)?;
        for param in &signature.parameter_types {
            program.check_type_present(param)?;
        }

        let returned = program.type_element_of(&return_type);
        let method_descriptor = |kind, request, subcomponent| ComponentMethodDescriptor {
            kind,
            element: method.id,
            name: method.name.clone(),
            return_type: return_type.clone(),
            parameters: signature.parameter_types.clone(),
            request,
            subcomponent,
        };

        if let Some(child) = returned.filter(|t| ComponentKind::of(t).is_some_and(|k| !k.is_root())) {
            let factory = method_descriptor(ComponentMethodKind::SubcomponentFactory, None, Some(child.name.clone()));
            if let Some(child) = self.child(&child.name)? {
                descriptor.children_by_factory_method.push((factory.clone(), child));
            }
            descriptor.methods.push(factory);
            return Ok(());
        }

        let subcomponent_creator = returned
            .filter(|t| t.has_any_annotation(SUBCOMPONENT_CREATOR_ANNOTATIONS))
            .and_then(|t| t.enclosing.clone());
        if let Some(subcomponent) = subcomponent_creator {
            if !signature.parameter_types.is_empty() {
                self.invalid_method(method);
                return Ok(());
            }
            let creator_method =
                method_descriptor(ComponentMethodKind::SubcomponentCreator, None, Some(subcomponent.clone()));
            if let Some(child) = self.child(&subcomponent)? {
                descriptor.children_by_creator_method.push((creator_method.clone(), child));
            }
            descriptor.methods.push(creator_method);
            return Ok(());
        }

        match signature.parameter_types.as_slice() {
            [] if !return_type.is_void() => {
                match DependencyRequest::for_component_method(&injection, method, &return_type, descriptor.is_production())
                {
                    Ok(request) => {
                        let kind = if request.kind.can_be_satisfied_by_production() {
                            ComponentMethodKind::Production
                        } else {
                            ComponentMethodKind::Provision
                        };
                        descriptor.methods.push(method_descriptor(kind, Some(request), None));
                    }
                    Err(err) if err.is_deferrable() => return Err(err),
                    Err(err) => self
                        .diagnostics
                        .push(Diagnostic::error(err.to_string()).at_element(Some(method.id))),
                }
            }
            [members] if return_type.is_void() || &return_type == members => {
                let request = DependencyRequest::for_members_injection(members, Some(method.id));
                descriptor.methods.push(method_descriptor(
                    ComponentMethodKind::MembersInjection,
                    Some(request),
                    None,
                ));
            }
            _ => self.invalid_method(method),
        }
        Ok(())
    }

    fn invalid_method(&mut self, method: &ExecutableElement) {
        self.diagnostics
            .push(Diagnostic::error(INVALID_COMPONENT_METHOD).at_element(Some(method.id)));
    }

    fn creator(&mut self, component: &TypeElement, kind: ComponentKind) -> Result<Option<CreatorDescriptor>> {
        let (Some(builder), Some(factory)) = (kind.builder_annotation(), kind.factory_annotation()) else {
            return Ok(None);
        };
        let program = self.ctx.program();
        let injection = self.ctx.injection();
        let Some(creator) = program
            .enclosed_types(&component.name)
            .into_iter()
            .find(|t| t.has_annotation(builder) || t.has_annotation(factory))
        else {
            return Ok(None);
        };
        let creator_kind = if creator.has_annotation(builder) {
            CreatorKind::Builder
        } else {
            CreatorKind::Factory
        };

        let mut descriptor = CreatorDescriptor {
            kind: creator_kind,
            type_name: creator.name.clone(),
            element: creator.id,
            factory_method: None,
            requirements: Vec::new(),
        };
        for method in program.all_methods(&creator.name) {
            if method.enclosing.is(names::OBJECT) || !is_abstract_member(program, method) {
                continue;
            }
            let signature = program.method_as_member_of(&creator.as_type(), method);
            let returns_component = signature
                .return_type
                .declared_name()
                .is_some_and(|n| n == &component.name);
            match creator_kind {
                CreatorKind::Builder if method.parameters.is_empty() => {
                    descriptor.factory_method = Some(method.name.clone());
                }
                CreatorKind::Builder => {
                    for (param, ty) in method.parameters.iter().zip(&signature.parameter_types) {
                        program.check_type_present(ty)?;
                        let binds_instance =
                            method.has_annotation(names::BINDS_INSTANCE) || param.has_annotation(names::BINDS_INSTANCE);
                        let mut annotations = param.annotations.clone();
                        annotations.extend(method.annotations.iter().cloned());
                        descriptor.requirements.push(requirement(
                            program,
                            &injection,
                            binds_instance,
                            &annotations,
                            ty,
                            param.id,
                            &method.name,
                        ));
                    }
                }
                CreatorKind::Factory if returns_component => {
                    descriptor.factory_method = Some(method.name.clone());
                    for (param, ty) in method.parameters.iter().zip(&signature.parameter_types) {
                        program.check_type_present(ty)?;
                        let binds_instance = param.has_annotation(names::BINDS_INSTANCE);
                        descriptor.requirements.push(requirement(
                            program,
                            &injection,
                            binds_instance,
                            &param.annotations,
                            ty,
                            param.id,
                            &param.name,
                        ));
                    }
                }
                CreatorKind::Factory => {}
            }
        }
        Ok(Some(descriptor))
    }
}

const SUBCOMPONENT_CREATOR_ANNOTATIONS: &[&str] = &[
    names::SUBCOMPONENT_BUILDER,
    names::SUBCOMPONENT_FACTORY,
    names::PRODUCTION_SUBCOMPONENT_BUILDER,
    names::PRODUCTION_SUBCOMPONENT_FACTORY,
];

fn requirement(
    program: &dyn ProgramModel,
    injection: &crate::injection::InjectionAnnotations<'_>,
    binds_instance: bool,
    annotations: &[crate::model::Annotation],
    ty: &TypeMirror,
    element: ElementId,
    name: &str,
) -> ComponentRequirement {
    if binds_instance {
        let key = Key::qualified(injection.qualifier(annotations), ty.clone());
        return ComponentRequirement::bound_instance(key, injection.is_nullable(annotations), element, name);
    }
    let is_module = program
        .type_element_of(ty)
        .is_some_and(|t| t.has_any_annotation(&[names::MODULE, names::PRODUCER_MODULE]));
    if is_module {
        ComponentRequirement::module(ty.clone())
    } else {
        ComponentRequirement::dependency(ty.clone())
    }
}

/// Abstract methods, and non-static interface methods
fn is_abstract_member(program: &dyn ProgramModel, method: &ExecutableElement) -> bool {
    method.is_abstract()
        || (!method.is_static()
            && program
                .type_element(&method.enclosing)
                .is_some_and(TypeElement::is_interface))
}

/// Whether `element` is annotated as a creator of some component
pub fn is_creator(element: &TypeElement) -> bool {
    element.has_any_annotation(CREATOR_ANNOTATIONS)
}
