//! Just-in-time `@Inject` bindings
//!
//! The registry discovers injection and members-injection bindings on
//! demand and memoizes them per key. A binding whose declaration fails
//! validation is still returned so graph errors can be reported alongside
//! it, but it is never part of [`InjectBindingRegistry::materialized_bindings`].

use super::factory::BindingFactory;
use super::validation::DeclarationValidator;
use super::BindingRef;
use crate::diagnostics::ValidationReport;
use crate::error::Result;
use crate::framework::names;
use crate::key::Key;
use crate::model::{AnnotatedElement, ElementId, ProgramModel, TypeKind, TypeMirror};
use ahash::{AHashMap, AHashSet};

#[cfg(feature = "logging")]
use tracing::trace;

#[derive(Debug, Default)]
pub struct InjectBindingRegistry {
    provisions: AHashMap<Key, Option<BindingRef>>,
    members_injections: AHashMap<Key, Option<BindingRef>>,
    materialized: Vec<BindingRef>,
    invalid: AHashSet<Key>,
    reports: AHashMap<ElementId, ValidationReport>,
}

impl InjectBindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` may be satisfied by an implicit `@Inject` constructor:
    /// unqualified, not a contribution, a declared class type
    pub fn is_eligible(program: &dyn ProgramModel, key: &Key) -> bool {
        if key.qualifier().is_some() || key.contribution_identifier().is_some() {
            return false;
        }
        let Some(element) = program.type_element_of(key.ty()) else {
            return false;
        };
        if element.kind != TypeKind::Class {
            return false;
        }
        key.ty().type_args().len() == element.type_parameters.len()
    }

    /// The injection binding for `key`, if its type has an `@Inject`
    /// constructor
    pub fn injection_binding(
        &mut self,
        factory: &mut BindingFactory<'_>,
        validator: &DeclarationValidator<'_>,
        program: &dyn ProgramModel,
        key: &Key,
    ) -> Result<Option<BindingRef>> {
        if let Some(memoized) = self.provisions.get(key) {
            #[cfg(feature = "logging")]
            trace!(target: "dependency_injector_codegen", key = %key, "Inject binding memo hit");
            return Ok(memoized.clone());
        }
        program.check_type_present(key.ty())?;
        if !Self::is_eligible(program, key) {
            self.provisions.insert(key.clone(), None);
            return Ok(None);
        }
        let Some(element) = program.type_element_of(key.ty()) else {
            return Ok(None);
        };
        let Some(ctor) = element.constructors.iter().find(|c| c.has_annotation(names::INJECT)) else {
            self.provisions.insert(key.clone(), None);
            return Ok(None);
        };

        let resolved = (!element.type_parameters.is_empty()).then(|| key.ty().clone());
        let binding = factory.injection_binding(element, ctor, resolved.as_ref())?;

        let report = self.reports.entry(ctor.id).or_insert_with(|| {
            let mut report = validator.validate_inject_constructor(element, ctor);
            for ancestor in program.superclass_chain(&element.name) {
                report.add_subreport(validator.validate_members(ancestor));
            }
            report
        });
        if report.is_clean() {
            self.materialized.push(binding.clone());
        } else {
            self.invalid.insert(key.clone());
        }

        self.provisions.insert(key.clone(), Some(binding.clone()));
        Ok(Some(binding))
    }

    /// The members-injection binding for `ty`
    pub fn members_injection_binding(
        &mut self,
        factory: &mut BindingFactory<'_>,
        validator: &DeclarationValidator<'_>,
        program: &dyn ProgramModel,
        ty: &TypeMirror,
    ) -> Result<Option<BindingRef>> {
        let key = Key::of(ty.clone());
        if let Some(memoized) = self.members_injections.get(&key) {
            return Ok(memoized.clone());
        }
        program.check_type_present(ty)?;
        let Some(element) = program.type_element_of(ty) else {
            self.members_injections.insert(key, None);
            return Ok(None);
        };

        let binding = factory.members_injection_binding(ty)?;
        let mut clean = true;
        for ancestor in program.superclass_chain(&element.name) {
            let report = self
                .reports
                .entry(ancestor.id)
                .or_insert_with(|| validator.validate_members(ancestor));
            clean &= report.is_clean();
        }
        if clean {
            self.materialized.push(binding.clone());
        } else {
            self.invalid.insert(key.clone());
        }
        self.members_injections.insert(key, Some(binding.clone()));
        Ok(Some(binding))
    }

    /// Valid bindings discovered so far, in discovery order
    pub fn materialized_bindings(&self) -> &[BindingRef] {
        &self.materialized
    }

    /// Whether the binding for `key` failed declaration validation
    pub fn is_invalid(&self, key: &Key) -> bool {
        self.invalid.contains(key)
    }

    /// Declaration reports gathered while discovering bindings
    pub fn reports(&self) -> impl Iterator<Item = &ValidationReport> {
        self.reports.values()
    }

    pub fn report_for(&self, element: ElementId) -> Option<&ValidationReport> {
        self.reports.get(&element)
    }

    pub fn clear(&mut self) {
        self.provisions.clear();
        self.members_injections.clear();
        self.materialized.clear();
        self.invalid.clear();
        self.reports.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotation, MethodSpec, Modifier, ProgramBuilder};
    use crate::options::CompilerOptions;
    use std::sync::Arc;

    #[test]
    fn test_memoized_per_key() {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.Foo", &[TypeMirror::named("test.Bar")]);
        let program = b.build();
        let options = CompilerOptions::default();
        let validator = DeclarationValidator::new(&program, &options);
        let mut factory = BindingFactory::new(&program);
        let mut registry = InjectBindingRegistry::new();

        let key = Key::named("test.Foo");
        let first = registry
            .injection_binding(&mut factory, &validator, &program, &key)
            .unwrap()
            .unwrap();
        let second = registry
            .injection_binding(&mut factory, &validator, &program, &key)
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.materialized_bindings().len(), 1);
    }

    #[test]
    fn test_invalid_binding_returned_but_not_materialized() {
        let mut b = ProgramBuilder::new();
        b.class("test.Foo")
            .constructor(
                MethodSpec::constructor()
                    .annotate(Annotation::new(names::INJECT))
                    .modifier(Modifier::Private),
            )
            .finish();
        let program = b.build();
        let options = CompilerOptions::default();
        let validator = DeclarationValidator::new(&program, &options);
        let mut factory = BindingFactory::new(&program);
        let mut registry = InjectBindingRegistry::new();

        let key = Key::named("test.Foo");
        let binding = registry
            .injection_binding(&mut factory, &validator, &program, &key)
            .unwrap();
        assert!(binding.is_some());
        assert!(registry.is_invalid(&key));
        assert!(registry.materialized_bindings().is_empty());
        assert!(registry.reports().any(|r| !r.is_clean()));
    }

    #[test]
    fn test_qualified_and_interface_keys_are_ineligible() {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.Foo", &[]);
        b.interface("test.Api").finish();
        let program = b.build();
        assert!(InjectBindingRegistry::is_eligible(&program, &Key::named("test.Foo")));
        assert!(!InjectBindingRegistry::is_eligible(&program, &Key::named("test.Api")));
        let qualified = Key::qualified(Some(Annotation::new(names::NAMED).with_str("x")), TypeMirror::named("test.Foo"));
        assert!(!InjectBindingRegistry::is_eligible(&program, &qualified));
    }
}
