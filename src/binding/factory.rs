//! Binding construction and interning
//!
//! Every binding is built here and handed out as a [`BindingRef`]. Bindings
//! are interned by structural equality, so asking twice for the binding of
//! the same element yields the same `Arc`.

use super::declaration::{
    DelegateDeclaration, MultibindingDeclaration, OptionalBindingDeclaration, SubcomponentDeclaration,
};
use super::{
    Binding, BindingRef, BindingType, BindingVariant, ContributionType, InjectionSite, InjectionSiteKind,
};
use crate::error::{CodegenError, Result};
use crate::framework::{self, FrameworkType, MapType, SetType, names};
use crate::injection::InjectionAnnotations;
use crate::key::{Key, MultibindingContributionIdentifier};
use crate::model::{
    AnnotatedElement, Annotation, ExecutableElement, ProgramModel, TypeElement, TypeMirror, TypeName, VariableElement,
};
use crate::request::{self, DependencyRequest, RequestKind};
use crate::scope::Scope;
use ahash::AHashSet;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Builds bindings from program elements and interns them
pub struct BindingFactory<'p> {
    program: &'p dyn ProgramModel,
    injection: InjectionAnnotations<'p>,
    interned: AHashSet<BindingRef>,
}

impl<'p> BindingFactory<'p> {
    pub fn new(program: &'p dyn ProgramModel) -> Self {
        Self {
            program,
            injection: InjectionAnnotations::new(program),
            interned: AHashSet::new(),
        }
    }

    #[inline]
    pub fn injection_annotations(&self) -> InjectionAnnotations<'p> {
        self.injection
    }

    /// Returns the interned copy of `binding`
    pub fn intern(&mut self, binding: Binding) -> BindingRef {
        if let Some(existing) = self.interned.get(&binding) {
            #[cfg(feature = "logging")]
            trace!(target: "dependency_injector_codegen", key = %binding.key, "Interned binding hit");
            return Arc::clone(existing);
        }
        let binding = Arc::new(binding);
        self.interned.insert(Arc::clone(&binding));
        binding
    }

    /// Number of distinct bindings built so far
    pub fn interned_count(&self) -> usize {
        self.interned.len()
    }

    /// Drops every interned binding
    pub fn clear(&mut self) {
        self.interned.clear();
    }

    fn describe(&self, element: &ExecutableElement) -> String {
        self.program
            .element_description(element.id)
            .unwrap_or_else(|| element.signature())
    }

    fn first_scope(&self, annotations: &[Annotation]) -> Option<Scope> {
        self.injection.scopes(annotations).into_iter().next()
    }

    // ========================================================================
    // @Inject types
    // ========================================================================

    /// Binding for an `@Inject` constructor. `resolved` is the concrete type
    /// for generic classes; the unresolved template is linked from the result.
    pub fn injection_binding(
        &mut self,
        ty: &TypeElement,
        ctor: &ExecutableElement,
        resolved: Option<&TypeMirror>,
    ) -> Result<BindingRef> {
        let declared = ty.as_type();
        let concrete = resolved.cloned().unwrap_or_else(|| declared.clone());
        self.program.check_type_present(&concrete)?;

        let signature = self.program.method_as_member_of(&concrete, ctor);
        let mut dependencies = Vec::with_capacity(ctor.parameters.len());
        for (param, param_type) in ctor.parameters.iter().zip(&signature.parameter_types) {
            dependencies.extend(self.variable_request(param, param_type)?);
        }
        let injection_sites = self.injection_sites(&concrete)?;
        for site in &injection_sites {
            dependencies.extend(site.dependencies.iter().cloned());
        }

        let unresolved = if concrete != declared && !ty.type_parameters.is_empty() {
            let template = self.injection_binding(ty, ctor, None)?;
            Some(Box::new((*template).clone()))
        } else {
            None
        };

        let binding = Binding {
            key: Key::of(concrete),
            binding_type: BindingType::Provision,
            contribution_type: ContributionType::Unique,
            dependencies,
            scope: self.first_scope(&ty.annotations),
            binding_element: Some(ctor.id),
            element_description: Some(self.describe(ctor)),
            contributing_module: None,
            binding_type_element: Some(ty.name.clone()),
            map_key: None,
            nullable: false,
            unresolved,
            variant: BindingVariant::Injection {
                constructor: ctor.id,
                injection_sites,
            },
        };
        Ok(self.intern(binding))
    }

    /// `@Inject` fields and methods of `container` and its superclasses,
    /// superclass members first
    pub fn injection_sites(&self, container: &TypeMirror) -> Result<Vec<InjectionSite>> {
        let Some(name) = container.declared_name() else {
            return Ok(Vec::new());
        };
        let chain = self.program.superclass_chain(name);
        let mut sites = Vec::new();
        for (depth, element) in chain.iter().enumerate().rev() {
            for field in &element.fields {
                if !field.has_annotation(names::INJECT) || field.is_static() {
                    continue;
                }
                let field_type = self.program.field_as_member_of(container, field);
                sites.push(InjectionSite {
                    kind: InjectionSiteKind::Field,
                    element: field.id,
                    name: field.name.clone(),
                    enclosing: element.name.clone(),
                    dependencies: self.variable_request(field, &field_type)?.into_iter().collect(),
                });
            }
            for method in &element.methods {
                if !method.has_annotation(names::INJECT) || method.is_static() {
                    continue;
                }
                let overridden = chain[..depth]
                    .iter()
                    .any(|sub| sub.methods.iter().any(|m| m.overrides_signature_of(method)));
                if overridden {
                    continue;
                }
                let signature = self.program.method_as_member_of(container, method);
                let mut dependencies = Vec::with_capacity(method.parameters.len());
                for (param, param_type) in method.parameters.iter().zip(&signature.parameter_types) {
                    dependencies.extend(self.variable_request(param, param_type)?);
                }
                sites.push(InjectionSite {
                    kind: InjectionSiteKind::Method,
                    element: method.id,
                    name: method.name.clone(),
                    enclosing: element.name.clone(),
                    dependencies,
                });
            }
        }
        Ok(sites)
    }

    /// The request a parameter or field makes. A request type that cannot be
    /// classified yields `None`; the declaration validator reports it.
    fn variable_request(&self, variable: &VariableElement, ty: &TypeMirror) -> Result<Option<DependencyRequest>> {
        self.program.check_type_present(ty)?;
        match DependencyRequest::for_variable(&self.injection, variable, ty) {
            Ok(request) => Ok(Some(request)),
            Err(err) if err.is_deferrable() => Err(err),
            Err(_) => Ok(None),
        }
    }

    /// Members-injection binding for `ty`, the target of `inject(T)` methods
    pub fn members_injection_binding(&mut self, ty: &TypeMirror) -> Result<BindingRef> {
        self.program.check_type_present(ty)?;
        let injection_sites = self.injection_sites(ty)?;
        let element = self.program.type_element_of(ty);
        let mut binding = Binding::synthetic(
            Key::of(ty.clone()),
            BindingType::MembersInjection,
            BindingVariant::MembersInjection {
                injection_sites: injection_sites.clone(),
            },
        );
        binding.dependencies = injection_sites
            .iter()
            .flat_map(|site| site.dependencies.iter().cloned())
            .collect();
        binding.binding_element = element.map(|e| e.id);
        binding.element_description = element.map(|e| e.name.to_string());
        binding.binding_type_element = element.map(|e| e.name.clone());
        Ok(self.intern(binding))
    }

    /// `MembersInjector<T>` backed by the members-injection binding for `T`
    pub fn members_injector_binding(&mut self, key: &Key, members: &Binding) -> BindingRef {
        let mut binding = Binding::synthetic(
            key.clone(),
            BindingType::Provision,
            BindingVariant::MembersInjector {
                members_key: members.key.clone(),
            },
        );
        binding.dependencies = members.dependencies.clone();
        binding.binding_element = members.binding_element;
        binding.element_description = members.element_description.clone();
        binding.binding_type_element = members.binding_type_element.clone();
        self.intern(binding)
    }

    // ========================================================================
    // Module methods
    // ========================================================================

    /// Key of a binding method's contribution, including the contribution
    /// identifier for multibindings
    pub fn binding_method_key(
        &self,
        module_type: &TypeMirror,
        method: &ExecutableElement,
        framework: FrameworkType,
    ) -> Result<(Key, ContributionType)> {
        let signature = self.program.method_as_member_of(module_type, method);
        let mut return_type = signature.return_type;
        if framework == FrameworkType::Producer && return_type.is_type_of(names::LISTENABLE_FUTURE) {
            return_type = return_type
                .only_type_arg()
                .cloned()
                .ok_or_else(|| CodegenError::invalid_request(&return_type, "futures must be parameterized"))?;
        }
        self.program.check_type_present(&return_type)?;

        let contribution_type = ContributionType::from_annotations(&method.annotations);
        let key_type = match contribution_type {
            ContributionType::Unique | ContributionType::SetValues => return_type,
            ContributionType::Set => framework::set_of(return_type),
            ContributionType::Map => {
                let map_key_type = self
                    .injection
                    .map_keys(&method.annotations)
                    .first()
                    .map(|k| self.injection.map_key_type(k))
                    .unwrap_or_else(|| TypeMirror::named(names::OBJECT));
                framework::map_of(map_key_type, framework.wrap(&return_type))
            }
        };
        let mut key = Key::qualified(self.injection.qualifier(&method.annotations), key_type);
        if contribution_type.is_multibinding() {
            key = key.with_contribution_identifier(MultibindingContributionIdentifier {
                module: module_type
                    .declared_name()
                    .cloned()
                    .unwrap_or_else(|| method.enclosing.clone()),
                binding_element: method.name.clone(),
            });
        }
        Ok((key, contribution_type))
    }

    fn method_dependencies(&self, module_type: &TypeMirror, method: &ExecutableElement) -> Result<Vec<DependencyRequest>> {
        let signature = self.program.method_as_member_of(module_type, method);
        let mut dependencies = Vec::with_capacity(method.parameters.len());
        for (param, ty) in method.parameters.iter().zip(&signature.parameter_types) {
            dependencies.extend(self.variable_request(param, ty)?);
        }
        Ok(dependencies)
    }

    fn contributing_module_name(module_type: &TypeMirror, method: &ExecutableElement) -> TypeName {
        module_type
            .declared_name()
            .cloned()
            .unwrap_or_else(|| method.enclosing.clone())
    }

    /// Binding for a `@Provides` method
    pub fn provision_binding(&mut self, module_type: &TypeMirror, method: &ExecutableElement) -> Result<BindingRef> {
        let (key, contribution_type) = self.binding_method_key(module_type, method, FrameworkType::Provider)?;
        let requires_module_instance = !method.is_static() && !method.is_abstract();
        let binding = Binding {
            key,
            binding_type: BindingType::Provision,
            contribution_type,
            dependencies: self.method_dependencies(module_type, method)?,
            scope: self.first_scope(&method.annotations),
            binding_element: Some(method.id),
            element_description: Some(self.describe(method)),
            contributing_module: Some(Self::contributing_module_name(module_type, method)),
            binding_type_element: None,
            map_key: self.injection.map_keys(&method.annotations).into_iter().next(),
            nullable: self.injection.is_nullable(&method.annotations),
            unresolved: None,
            variant: BindingVariant::Provision {
                method: method.id,
                method_name: method.name.clone(),
                requires_module_instance,
            },
        };
        Ok(self.intern(binding))
    }

    /// Binding for a `@Produces` method. Producers also depend on the
    /// executor the component runs them on.
    pub fn production_binding(&mut self, module_type: &TypeMirror, method: &ExecutableElement) -> Result<BindingRef> {
        let (key, contribution_type) = self.binding_method_key(module_type, method, FrameworkType::Producer)?;
        let returns_future = self
            .program
            .method_as_member_of(module_type, method)
            .return_type
            .is_type_of(names::LISTENABLE_FUTURE);
        let mut dependencies = self.method_dependencies(module_type, method)?;
        dependencies.push(DependencyRequest::for_production_implementation_executor());
        let binding = Binding {
            key,
            binding_type: BindingType::Production,
            contribution_type,
            dependencies,
            scope: None,
            binding_element: Some(method.id),
            element_description: Some(self.describe(method)),
            contributing_module: Some(Self::contributing_module_name(module_type, method)),
            binding_type_element: None,
            map_key: self.injection.map_keys(&method.annotations).into_iter().next(),
            nullable: false,
            unresolved: None,
            variant: BindingVariant::Production {
                method: method.id,
                method_name: method.name.clone(),
                requires_module_instance: !method.is_static() && !method.is_abstract(),
                returns_future,
            },
        };
        Ok(self.intern(binding))
    }

    /// The binding the implicit production executor module contributes:
    /// `@ProductionImplementation Executor` backed by the user's
    /// `@Production Executor`
    pub fn production_executor_binding(&mut self) -> BindingRef {
        let mut binding = Binding::synthetic(
            request::production_implementation_executor_key(),
            BindingType::Provision,
            BindingVariant::Provision {
                method: crate::model::ElementId(0),
                method_name: "executor".to_string(),
                requires_module_instance: false,
            },
        );
        binding.dependencies = vec![DependencyRequest::new(
            RequestKind::Instance,
            request::production_executor_key(),
        )];
        binding.scope = Some(Scope::production_scope());
        binding.contributing_module = Some(TypeName::new(names::PRODUCTION_EXECUTOR_MODULE));
        binding.element_description = Some(format!("{}.executor()", names::PRODUCTION_EXECUTOR_MODULE));
        self.intern(binding)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Declaration for a `@Binds` method
    pub fn delegate_declaration(&self, module_type: &TypeMirror, method: &ExecutableElement) -> Result<DelegateDeclaration> {
        let (key, contribution_type) = self.binding_method_key(module_type, method, FrameworkType::Provider)?;
        let param = method
            .parameters
            .first()
            .ok_or_else(|| CodegenError::internal(format!("@Binds method {} has no parameter", method.signature())))?;
        let param_type = self
            .program
            .method_as_member_of(module_type, method)
            .parameter_types
            .into_iter()
            .next()
            .unwrap_or_else(|| param.ty.clone());
        Ok(DelegateDeclaration {
            key,
            contributing_module: Self::contributing_module_name(module_type, method),
            element: method.id,
            description: self.describe(method),
            delegate_request: match self.variable_request(param, &param_type)? {
                Some(request) => request,
                None => DependencyRequest::new(
                    RequestKind::Instance,
                    Key::qualified(self.injection.qualifier(&param.annotations), param_type),
                ),
            },
            contribution_type,
            map_key: self.injection.map_keys(&method.annotations).into_iter().next(),
            scope: self.first_scope(&method.annotations),
        })
    }

    /// Declaration for a `@Multibinds` method. Map declarations are keyed
    /// like map contributions, with framework-wrapped values.
    pub fn multibinding_declaration(
        &self,
        module_type: &TypeMirror,
        method: &ExecutableElement,
        production_module: bool,
    ) -> Result<MultibindingDeclaration> {
        let return_type = self.program.method_as_member_of(module_type, method).return_type;
        self.program.check_type_present(&return_type)?;
        let (key_type, contribution_type) = match MapType::from(&return_type) {
            Some(map) => {
                let (Some(k), Some(v)) = (map.key_type(), map.value_type()) else {
                    return Err(CodegenError::invalid_request(&return_type, "maps must be parameterized"));
                };
                let framework = if production_module {
                    FrameworkType::Producer
                } else {
                    FrameworkType::Provider
                };
                (framework::map_of(k.clone(), framework.wrap(v)), ContributionType::Map)
            }
            None if SetType::from(&return_type).is_some() => (return_type, ContributionType::Set),
            None => {
                return Err(CodegenError::invalid_request(&return_type, "@Multibinds must return a Set or Map"));
            }
        };
        Ok(MultibindingDeclaration {
            key: Key::qualified(self.injection.qualifier(&method.annotations), key_type),
            contributing_module: Self::contributing_module_name(module_type, method),
            element: method.id,
            description: self.describe(method),
            contribution_type,
        })
    }

    /// Declaration for a `@BindsOptionalOf` method
    pub fn optional_declaration(
        &self,
        module_type: &TypeMirror,
        method: &ExecutableElement,
    ) -> Result<OptionalBindingDeclaration> {
        let return_type = self.program.method_as_member_of(module_type, method).return_type;
        self.program.check_type_present(&return_type)?;
        Ok(OptionalBindingDeclaration {
            key: Key::qualified(self.injection.qualifier(&method.annotations), return_type),
            contributing_module: Self::contributing_module_name(module_type, method),
            element: method.id,
            description: self.describe(method),
        })
    }

    /// Declaration for a subcomponent listed on a module; `None` when the
    /// subcomponent has no creator to bind
    pub fn subcomponent_declaration(&self, module: &TypeElement, subcomponent: &TypeName) -> Option<SubcomponentDeclaration> {
        let creator = self
            .program
            .enclosed_types(subcomponent)
            .into_iter()
            .find(|t| t.has_any_annotation(CREATOR_ANNOTATIONS))?;
        Some(SubcomponentDeclaration {
            key: Key::of(creator.as_type()),
            contributing_module: module.name.clone(),
            subcomponent: subcomponent.clone(),
            module_element: module.id,
        })
    }

    // ========================================================================
    // Declaration-backed and synthetic bindings
    // ========================================================================

    /// Delegate binding for a `@Binds` declaration. `target` is the binding
    /// type of what the delegate resolved to, or `None` when it did not
    /// resolve and the binding is kept only for reporting.
    pub fn delegate_binding(
        &mut self,
        declaration: &DelegateDeclaration,
        target: Option<(BindingType, bool)>,
        production_module: bool,
    ) -> BindingRef {
        let (binding_type, nullable, unresolved) = match target {
            Some((binding_type, nullable)) => (binding_type, nullable, false),
            None if production_module => (BindingType::Production, false, true),
            None => (BindingType::Provision, false, true),
        };
        let binding = Binding {
            key: declaration.key.clone(),
            binding_type,
            contribution_type: declaration.contribution_type,
            dependencies: vec![declaration.delegate_request.clone()],
            scope: declaration.scope.clone(),
            binding_element: Some(declaration.element),
            element_description: Some(declaration.description.clone()),
            contributing_module: Some(declaration.contributing_module.clone()),
            binding_type_element: None,
            map_key: declaration.map_key.clone(),
            nullable,
            unresolved: None,
            variant: BindingVariant::Delegate {
                delegate_key: declaration.delegate_request.key.clone(),
                unresolved,
            },
        };
        self.intern(binding)
    }

    /// The set or map binding that aggregates `contributions` for `key`
    pub fn multibinding(&mut self, key: &Key, contributions: &[BindingRef], production_declared: bool) -> BindingRef {
        let map = MapType::from(key.ty());
        let production_key = map.as_ref().is_some_and(|m| m.values_are_type_of(names::PRODUCER))
            || map.as_ref().is_some_and(|m| m.values_are_type_of(names::PRODUCED))
            || SetType::from(key.ty()).is_some_and(|s| s.elements_are_type_of(names::PRODUCED));
        let any_production = contributions.iter().any(|c| c.is_production());
        let binding_type = if production_key || any_production || production_declared {
            BindingType::Production
        } else {
            BindingType::Provision
        };

        let contribution_kind = match map.as_ref() {
            Some(m) if m.values_are_type_of(names::PROVIDER) => RequestKind::Provider,
            Some(m) if m.values_are_type_of(names::PRODUCER) => RequestKind::Producer,
            Some(m) if m.values_are_type_of(names::PRODUCED) => RequestKind::Produced,
            _ if SetType::from(key.ty()).is_some_and(|s| s.elements_are_type_of(names::PRODUCED)) => {
                RequestKind::Produced
            }
            _ => RequestKind::Instance,
        };
        let mut dependencies: Vec<DependencyRequest> = contributions
            .iter()
            .map(|c| {
                let kind = if contribution_kind == RequestKind::Instance && binding_type == BindingType::Production {
                    RequestKind::Producer
                } else {
                    contribution_kind
                };
                DependencyRequest::new(kind, c.key.clone())
            })
            .collect();
        dependencies.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));

        let variant = if map.is_some() {
            BindingVariant::MultiboundMap
        } else {
            BindingVariant::MultiboundSet
        };
        let mut binding = Binding::synthetic(key.clone(), binding_type, variant);
        binding.dependencies = dependencies;
        self.intern(binding)
    }

    /// The value request behind an `Optional<T>` key: `Optional<Provider<T>>`
    /// requests `T` as a provider
    pub fn optional_value_request(key: &Key) -> Option<DependencyRequest> {
        let value = key.unwrap_optional()?;
        let (kind, value_type) = request::classify(value.ty()).ok()?;
        Some(DependencyRequest::new(kind, value.with_type(value_type)))
    }

    /// The key `@BindsOptionalOf` declarations for `key` are filed under:
    /// `Optional<Provider<T>>` and `Optional<T>` both look for `T`
    pub fn optional_value_key(key: &Key) -> Option<Key> {
        Self::optional_value_request(key).map(|request| request.key)
    }

    /// Present or absent binding for `Optional<T>`. `underlying` is the
    /// binding type of the bound `T`, or `None` when `T` is unbound.
    pub fn optional_binding(&mut self, key: &Key, underlying: Option<BindingType>) -> BindingRef {
        let binding = match (underlying, Self::optional_value_request(key)) {
            (Some(binding_type), Some(request)) => {
                let binding_type = if binding_type == BindingType::Production {
                    BindingType::Production
                } else {
                    BindingType::Provision
                };
                let mut binding = Binding::synthetic(
                    key.clone(),
                    binding_type,
                    BindingVariant::OptionalPresent {
                        underlying: request.key.clone(),
                    },
                );
                binding.dependencies = vec![request];
                binding
            }
            _ => Binding::synthetic(key.clone(), BindingType::Provision, BindingVariant::OptionalAbsent),
        };
        self.intern(binding)
    }

    /// The component binds its own type
    pub fn component_binding(&mut self, component: &TypeElement) -> BindingRef {
        let mut binding = Binding::synthetic(Key::of(component.as_type()), BindingType::Provision, BindingVariant::Component);
        binding.binding_element = Some(component.id);
        binding.element_description = Some(component.name.to_string());
        binding.binding_type_element = Some(component.name.clone());
        self.intern(binding)
    }

    /// A `dependencies = ...` type is bound to the instance the creator takes
    pub fn component_dependency_binding(&mut self, dependency: &TypeElement) -> BindingRef {
        let mut binding = Binding::synthetic(
            Key::of(dependency.as_type()),
            BindingType::Provision,
            BindingVariant::ComponentDependency {
                dependency: dependency.name.clone(),
            },
        );
        binding.binding_element = Some(dependency.id);
        binding.element_description = Some(dependency.name.to_string());
        binding.binding_type_element = Some(dependency.name.clone());
        self.intern(binding)
    }

    /// A no-arg method of a component dependency. In production components a
    /// method returning a future becomes a production binding of its value.
    pub fn component_method_binding(
        &mut self,
        dependency: &TypeElement,
        method: &ExecutableElement,
        production_component: bool,
    ) -> Result<BindingRef> {
        let return_type = self.program.method_as_member_of(&dependency.as_type(), method).return_type;
        self.program.check_type_present(&return_type)?;
        let future = production_component && return_type.is_type_of(names::LISTENABLE_FUTURE);
        let key_type = if future {
            return_type
                .only_type_arg()
                .cloned()
                .ok_or_else(|| CodegenError::invalid_request(&return_type, "futures must be parameterized"))?
        } else {
            return_type
        };
        let (binding_type, variant) = if future {
            (
                BindingType::Production,
                BindingVariant::ComponentProduction {
                    dependency: dependency.name.clone(),
                    method_name: method.name.clone(),
                },
            )
        } else {
            (
                BindingType::Provision,
                BindingVariant::ComponentProvision {
                    dependency: dependency.name.clone(),
                    method_name: method.name.clone(),
                },
            )
        };
        let mut binding = Binding::synthetic(
            Key::qualified(self.injection.qualifier(&method.annotations), key_type),
            binding_type,
            variant,
        );
        binding.binding_element = Some(method.id);
        binding.element_description = Some(self.describe(method));
        binding.binding_type_element = Some(dependency.name.clone());
        binding.nullable = self.injection.is_nullable(&method.annotations);
        binding.scope = None;
        Ok(self.intern(binding))
    }

    /// `@BindsInstance` creator setter or factory parameter
    pub fn bound_instance_binding(
        &mut self,
        key: Key,
        element: crate::model::ElementId,
        parameter_name: &str,
        nullable: bool,
    ) -> BindingRef {
        let mut binding = Binding::synthetic(
            key,
            BindingType::Provision,
            BindingVariant::BoundInstance {
                parameter_name: parameter_name.to_string(),
            },
        );
        binding.binding_element = Some(element);
        binding.element_description = self.program.element_description(element);
        binding.nullable = nullable;
        self.intern(binding)
    }

    /// Creator binding for a subcomponent declared on a module
    pub fn subcomponent_creator_binding(&mut self, declarations: &[&SubcomponentDeclaration]) -> Option<BindingRef> {
        let first = declarations.first()?;
        let mut binding = Binding::synthetic(
            first.key.clone(),
            BindingType::Provision,
            BindingVariant::SubcomponentCreator {
                subcomponent: first.subcomponent.clone(),
            },
        );
        binding.binding_element = Some(first.module_element);
        binding.element_description = Some(format!("{} (subcomponents)", first.contributing_module));
        binding.contributing_module = Some(first.contributing_module.clone());
        binding.binding_type_element = Some(first.subcomponent.clone());
        Some(self.intern(binding))
    }

    /// Creator binding for a subcomponent whose builder is returned by a
    /// component method
    pub fn subcomponent_creator_method_binding(
        &mut self,
        creator: &TypeName,
        subcomponent: &TypeName,
        method: crate::model::ElementId,
    ) -> BindingRef {
        let mut binding = Binding::synthetic(
            Key::of(TypeMirror::named(creator.as_str())),
            BindingType::Provision,
            BindingVariant::SubcomponentCreator {
                subcomponent: subcomponent.clone(),
            },
        );
        binding.binding_element = Some(method);
        binding.element_description = self.program.element_description(method);
        binding.binding_type_element = Some(subcomponent.clone());
        self.intern(binding)
    }
}

/// Annotations marking a component or subcomponent creator
pub const CREATOR_ANNOTATIONS: &[&str] = &[
    names::COMPONENT_BUILDER,
    names::COMPONENT_FACTORY,
    names::SUBCOMPONENT_BUILDER,
    names::SUBCOMPONENT_FACTORY,
    names::PRODUCTION_COMPONENT_BUILDER,
    names::PRODUCTION_COMPONENT_FACTORY,
    names::PRODUCTION_SUBCOMPONENT_BUILDER,
    names::PRODUCTION_SUBCOMPONENT_FACTORY,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldSpec, MethodSpec, Modifier, ProgramBuilder};

    fn module_program() -> crate::model::InMemoryProgram {
        let mut b = ProgramBuilder::new();
        b.class("test.Module")
            .annotate(Annotation::new(names::MODULE))
            .method(
                MethodSpec::new("provideFoo")
                    .modifier(Modifier::Static)
                    .annotate(Annotation::new(names::PROVIDES))
                    .param("bar", TypeMirror::named("test.Bar"))
                    .returns(TypeMirror::named("test.Foo")),
            )
            .method(
                MethodSpec::new("contribute")
                    .annotate(Annotation::new(names::PROVIDES))
                    .annotate(Annotation::new(names::INTO_MAP))
                    .annotate(Annotation::new(names::STRING_KEY).with_str("a"))
                    .returns(TypeMirror::named("test.Foo")),
            )
            .finish();
        b.build()
    }

    #[test]
    fn test_interning_returns_same_arc() {
        let program = module_program();
        let module = program.type_element(&TypeName::new("test.Module")).unwrap();
        let mut factory = BindingFactory::new(&program);
        let a = factory.provision_binding(&module.as_type(), &module.methods[0]).unwrap();
        let b = factory.provision_binding(&module.as_type(), &module.methods[0]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.interned_count(), 1);
        assert!(!a.requires_module_instance());
        assert_eq!(a.dependencies[0].key, Key::named("test.Bar"));
    }

    #[test]
    fn test_map_contribution_key() {
        let program = module_program();
        let module = program.type_element(&TypeName::new("test.Module")).unwrap();
        let mut factory = BindingFactory::new(&program);
        let binding = factory.provision_binding(&module.as_type(), &module.methods[1]).unwrap();
        assert_eq!(binding.contribution_type, ContributionType::Map);
        assert!(binding.requires_module_instance());
        let expected = framework::map_of(
            TypeMirror::named(names::STRING),
            FrameworkType::Provider.wrap(&TypeMirror::named("test.Foo")),
        );
        assert_eq!(binding.key.ty(), &expected);
        assert_eq!(
            binding.key.contribution_identifier().map(|id| id.binding_element.as_str()),
            Some("contribute")
        );
    }

    #[test]
    fn test_injection_binding_collects_inherited_sites() {
        let mut b = ProgramBuilder::new();
        b.class("test.Base")
            .field(FieldSpec::new("baz", TypeMirror::named("test.Baz")).annotate(Annotation::new(names::INJECT)))
            .finish();
        b.class("test.Foo")
            .extends(TypeMirror::named("test.Base"))
            .annotate(Annotation::new(names::SINGLETON))
            .constructor(
                MethodSpec::constructor()
                    .annotate(Annotation::new(names::INJECT))
                    .param("bar", TypeMirror::named("test.Bar")),
            )
            .finish();
        let program = b.build();
        let foo = program.type_element(&TypeName::new("test.Foo")).unwrap();
        let mut factory = BindingFactory::new(&program);
        let binding = factory.injection_binding(foo, &foo.constructors[0], None).unwrap();
        assert_eq!(binding.scope, Some(Scope::singleton()));
        let keys: Vec<_> = binding.dependencies.iter().map(|d| d.key.to_string()).collect();
        assert_eq!(keys, vec!["test.Bar", "test.Baz"]);
    }

    #[test]
    fn test_generic_injection_binding_links_template() {
        let mut b = ProgramBuilder::new();
        b.class("test.Box")
            .type_parameter("T")
            .constructor(
                MethodSpec::constructor()
                    .annotate(Annotation::new(names::INJECT))
                    .param("value", TypeMirror::variable("T")),
            )
            .finish();
        let program = b.build();
        let element = program.type_element(&TypeName::new("test.Box")).unwrap();
        let concrete = TypeMirror::declared("test.Box", vec![TypeMirror::named("test.Foo")]);
        let mut factory = BindingFactory::new(&program);
        let binding = factory.injection_binding(element, &element.constructors[0], Some(&concrete)).unwrap();
        assert_eq!(binding.dependencies[0].key, Key::named("test.Foo"));
        let template = binding.unresolved.as_ref().unwrap();
        assert_eq!(template.dependencies[0].key, Key::of(TypeMirror::variable("T")));
    }

    #[test]
    fn test_multibinding_request_kinds_follow_map_values() {
        let program = module_program();
        let module = program.type_element(&TypeName::new("test.Module")).unwrap();
        let mut factory = BindingFactory::new(&program);
        let contribution = factory.provision_binding(&module.as_type(), &module.methods[1]).unwrap();
        let provider_map = contribution.key.without_contribution_identifier();
        let plain_map = provider_map.unwrap_map_value_type();

        let via_provider = factory.multibinding(&provider_map, &[contribution.clone()], false);
        assert_eq!(via_provider.dependencies[0].kind, RequestKind::Provider);
        let plain = factory.multibinding(&plain_map, &[contribution], false);
        assert_eq!(plain.dependencies[0].kind, RequestKind::Instance);
        assert_eq!(plain.binding_type, BindingType::Provision);
    }

    #[test]
    fn test_optional_binding_present_and_absent() {
        let program = ProgramBuilder::new().build();
        let mut factory = BindingFactory::new(&program);
        let key = Key::of(TypeMirror::declared(
            names::OPTIONAL,
            vec![TypeMirror::declared(names::PROVIDER, vec![TypeMirror::named("test.Foo")])],
        ));
        let present = factory.optional_binding(&key, Some(BindingType::Provision));
        assert_eq!(present.dependencies[0].kind, RequestKind::Provider);
        assert_eq!(present.dependencies[0].key, Key::named("test.Foo"));
        let absent = factory.optional_binding(&key, None);
        assert!(absent.dependencies.is_empty());
        assert_eq!(absent.variant, BindingVariant::OptionalAbsent);
    }
}
