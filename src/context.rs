//! Per-round processing context
//!
//! Element handles are only stable within one round, so every cache that is
//! keyed by them lives here and is dropped by [`RoundContext::clear`] when
//! the round ends.

use crate::binding::{
    BindingFactory, BindingRef, BindingVariant, DeclarationValidator, InjectBindingRegistry, ModuleCache, ModuleDescriptor,
};
use crate::component::ComponentDescriptor;
use crate::diagnostics::ValidationReport;
use crate::error::Result;
use crate::injection::InjectionAnnotations;
use crate::key::Key;
use crate::model::{ProgramModel, TypeMirror, TypeName};
use crate::options::CompilerOptions;
use ahash::AHashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Everything one processing round shares
pub struct RoundContext<'p> {
    program: &'p dyn ProgramModel,
    options: CompilerOptions,
    pub(crate) bindings: BindingFactory<'p>,
    pub(crate) inject_bindings: InjectBindingRegistry,
    pub(crate) modules: ModuleCache,
    pub(crate) components: AHashMap<TypeName, Arc<ComponentDescriptor>>,
    module_reports: AHashMap<TypeName, ValidationReport>,
}

impl<'p> RoundContext<'p> {
    pub fn new(program: &'p dyn ProgramModel, options: CompilerOptions) -> Self {
        Self {
            program,
            options,
            bindings: BindingFactory::new(program),
            inject_bindings: InjectBindingRegistry::new(),
            modules: ModuleCache::new(),
            components: AHashMap::new(),
            module_reports: AHashMap::new(),
        }
    }

    #[inline]
    pub fn program(&self) -> &'p dyn ProgramModel {
        self.program
    }

    #[inline]
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    #[inline]
    pub fn injection(&self) -> InjectionAnnotations<'p> {
        InjectionAnnotations::new(self.program)
    }

    pub fn binding_factory(&mut self) -> &mut BindingFactory<'p> {
        &mut self.bindings
    }

    /// Just-in-time `@Inject` binding for `key`
    pub fn injection_binding(&mut self, key: &Key) -> Result<Option<BindingRef>> {
        let validator = DeclarationValidator::new(self.program, &self.options);
        self.inject_bindings
            .injection_binding(&mut self.bindings, &validator, self.program, key)
    }

    /// Members-injection binding for `ty`
    pub fn members_injection_binding(&mut self, ty: &TypeMirror) -> Result<Option<BindingRef>> {
        let validator = DeclarationValidator::new(self.program, &self.options);
        self.inject_bindings
            .members_injection_binding(&mut self.bindings, &validator, self.program, ty)
    }

    /// Whether the binding for `key` failed declaration validation
    pub fn is_invalid_binding(&self, key: &Key) -> bool {
        self.inject_bindings.is_invalid(key)
    }

    /// Whether none of `bindings` comes from an `@Inject` declaration that
    /// failed validation
    pub fn bindings_are_clean<'b>(&self, bindings: impl IntoIterator<Item = &'b BindingRef>) -> bool {
        bindings.into_iter().all(|binding| match &binding.variant {
            BindingVariant::Injection { .. } | BindingVariant::MembersInjection { .. } => {
                !self.is_invalid_binding(&binding.key)
            }
            BindingVariant::MembersInjector { members_key } => !self.is_invalid_binding(members_key),
            _ => true,
        })
    }

    pub fn module(&mut self, module_type: &TypeMirror) -> Result<Arc<ModuleDescriptor>> {
        self.validate_module_type(module_type);
        self.modules
            .get_or_create(&mut self.bindings, self.program, module_type)
    }

    /// `roots` and every module they include
    pub fn transitive_modules(&mut self, roots: &[TypeMirror]) -> Result<Vec<Arc<ModuleDescriptor>>> {
        let modules = self.modules.transitive(&mut self.bindings, self.program, roots)?;
        for module in &modules {
            self.validate_module_type(&module.module_type);
        }
        Ok(modules)
    }

    pub fn production_executor_module(&mut self) -> Arc<ModuleDescriptor> {
        self.modules.production_executor(&mut self.bindings)
    }

    fn validate_module_type(&mut self, module_type: &TypeMirror) {
        let Some(element) = self.program.type_element_of(module_type) else {
            return;
        };
        if self.module_reports.contains_key(&element.name) {
            return;
        }
        let report = DeclarationValidator::new(self.program, &self.options).validate_module(element);
        self.module_reports.insert(element.name.clone(), report);
    }

    /// The declaration report for a module, once it has been seen
    pub fn module_report(&self, module: &TypeName) -> Option<&ValidationReport> {
        self.module_reports.get(module)
    }

    /// Every declaration report gathered this round
    pub fn declaration_reports(&self) -> impl Iterator<Item = &ValidationReport> {
        self.module_reports.values().chain(self.inject_bindings.reports())
    }

    /// Whether any declaration the given modules make failed validation
    pub fn modules_are_clean(&self, modules: &[Arc<ModuleDescriptor>]) -> bool {
        modules
            .iter()
            .filter_map(|m| self.module_reports.get(&m.name))
            .all(ValidationReport::is_clean)
    }

    /// Drops every per-round cache
    pub fn clear(&mut self) {
        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_injector_codegen",
            bindings = self.bindings.interned_count(),
            modules = self.modules.len(),
            components = self.components.len(),
            "Clearing round caches"
        );
        self.bindings.clear();
        self.inject_bindings.clear();
        self.modules.clear();
        self.components.clear();
        self.module_reports.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::names;
    use crate::model::{Annotation, MethodSpec, ProgramBuilder};

    #[test]
    fn test_module_reports_collected_and_cleared() {
        let mut b = ProgramBuilder::new();
        b.class("test.Module")
            .annotate(Annotation::new(names::MODULE))
            .method(
                MethodSpec::new("provide")
                    .annotate(Annotation::new(names::PROVIDES))
                    .annotate(Annotation::new(names::INTO_MAP))
                    .returns(TypeMirror::named("test.Foo")),
            )
            .finish();
        let program = b.build();
        let mut ctx = RoundContext::new(&program, CompilerOptions::default());
        let module = ctx.module(&TypeMirror::named("test.Module")).unwrap();
        assert_eq!(module.bindings.len(), 1);
        assert!(!ctx.modules_are_clean(&[module]));
        assert_eq!(ctx.declaration_reports().count(), 1);

        ctx.clear();
        assert_eq!(ctx.declaration_reports().count(), 0);
        assert_eq!(ctx.binding_factory().interned_count(), 0);
    }

    #[test]
    fn test_injection_binding_through_context() {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.Foo", &[]);
        let program = b.build();
        let mut ctx = RoundContext::new(&program, CompilerOptions::default());
        assert!(ctx.injection_binding(&Key::named("test.Foo")).unwrap().is_some());
        assert!(ctx.injection_binding(&Key::named("test.Missing")).unwrap().is_none());
        assert!(!ctx.is_invalid_binding(&Key::named("test.Foo")));
    }
}
