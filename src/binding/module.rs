//! Module descriptors
//!
//! A [`ModuleDescriptor`] holds everything one module contributes: the
//! bindings of its `@Provides`/`@Produces` methods and the declarations of
//! its `@Binds`, `@Multibinds` and `@BindsOptionalOf` methods and
//! `subcomponents=` list. Descriptors are cached per module type for the
//! round; [`ModuleCache::transitive`] follows `includes=`.

use super::declaration::{
    DelegateDeclaration, MultibindingDeclaration, OptionalBindingDeclaration, SubcomponentDeclaration,
};
use super::factory::BindingFactory;
use super::BindingRef;
use crate::error::Result;
use crate::framework::names;
use crate::model::{AnnotatedElement, ElementId, ProgramModel, TypeMirror, TypeName};
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Module,
    ProducerModule,
}

impl ModuleKind {
    pub fn annotation(self) -> &'static str {
        match self {
            Self::Module => names::MODULE,
            Self::ProducerModule => names::PRODUCER_MODULE,
        }
    }
}

/// What a module contributes to the components that install it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub name: TypeName,
    /// The module type, with arguments for generic modules
    pub module_type: TypeMirror,
    pub element: Option<ElementId>,
    pub kind: ModuleKind,
    pub bindings: Vec<BindingRef>,
    pub delegates: Vec<DelegateDeclaration>,
    pub multibinding_declarations: Vec<MultibindingDeclaration>,
    pub optional_declarations: Vec<OptionalBindingDeclaration>,
    pub subcomponent_declarations: Vec<SubcomponentDeclaration>,
    pub includes: Vec<TypeMirror>,
    /// Installed by the framework rather than listed by the user
    pub implicitly_included: bool,
}

impl ModuleDescriptor {
    #[inline]
    pub fn is_producer_module(&self) -> bool {
        self.kind == ModuleKind::ProducerModule
    }

    /// Whether components must be given an instance of this module
    pub fn requires_instance(&self) -> bool {
        self.bindings.iter().any(|b| b.requires_module_instance())
    }

    /// Builds the descriptor for `module_type` from its own and inherited
    /// binding methods. Methods whose types are missing abort with
    /// `TypeNotPresent`; other malformed methods are skipped, their
    /// validation report carries the error.
    pub fn create(factory: &mut BindingFactory<'_>, program: &dyn ProgramModel, module_type: &TypeMirror) -> Result<Self> {
        program.check_type_present(module_type)?;
        let Some(name) = module_type.declared_name().cloned() else {
            return Err(crate::error::CodegenError::invalid_request(module_type, "modules must be declared types"));
        };
        let Some(element) = program.type_element(&name) else {
            return Err(crate::error::CodegenError::type_not_present(name.as_str()));
        };
        let kind = if element.has_annotation(names::PRODUCER_MODULE) {
            ModuleKind::ProducerModule
        } else {
            ModuleKind::Module
        };
        let annotation = element.annotation(kind.annotation());

        let mut descriptor = Self {
            name: name.clone(),
            module_type: module_type.clone(),
            element: Some(element.id),
            kind,
            bindings: Vec::new(),
            delegates: Vec::new(),
            multibinding_declarations: Vec::new(),
            optional_declarations: Vec::new(),
            subcomponent_declarations: Vec::new(),
            includes: annotation.map(|a| a.type_list("includes")).unwrap_or_default(),
            implicitly_included: false,
        };

        for subcomponent in annotation.map(|a| a.type_list("subcomponents")).unwrap_or_default() {
            program.check_type_present(&subcomponent)?;
            if let Some(declaration) = subcomponent
                .declared_name()
                .and_then(|s| factory.subcomponent_declaration(element, s))
            {
                descriptor.subcomponent_declarations.push(declaration);
            }
        }

        for method in program.all_methods(&name) {
            if method.has_annotation(names::PROVIDES) {
                skip_invalid(factory.provision_binding(module_type, method), &mut descriptor.bindings)?;
            } else if method.has_annotation(names::PRODUCES) {
                skip_invalid(factory.production_binding(module_type, method), &mut descriptor.bindings)?;
            } else if method.has_annotation(names::BINDS) {
                skip_invalid(factory.delegate_declaration(module_type, method), &mut descriptor.delegates)?;
            } else if method.has_annotation(names::MULTIBINDS) {
                let declaration = factory.multibinding_declaration(module_type, method, descriptor.is_producer_module());
                skip_invalid(declaration, &mut descriptor.multibinding_declarations)?;
            } else if method.has_annotation(names::BINDS_OPTIONAL_OF) {
                skip_invalid(factory.optional_declaration(module_type, method), &mut descriptor.optional_declarations)?;
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_injector_codegen",
            module = %name,
            bindings = descriptor.bindings.len(),
            delegates = descriptor.delegates.len(),
            "Created module descriptor"
        );

        Ok(descriptor)
    }

    /// The module production components install to supply the executor
    pub fn production_executor(factory: &mut BindingFactory<'_>) -> Self {
        Self {
            name: TypeName::new(names::PRODUCTION_EXECUTOR_MODULE),
            module_type: TypeMirror::named(names::PRODUCTION_EXECUTOR_MODULE),
            element: None,
            kind: ModuleKind::Module,
            bindings: vec![factory.production_executor_binding()],
            delegates: Vec::new(),
            multibinding_declarations: Vec::new(),
            optional_declarations: Vec::new(),
            subcomponent_declarations: Vec::new(),
            includes: Vec::new(),
            implicitly_included: true,
        }
    }
}

fn skip_invalid<T>(declaration: Result<T>, into: &mut Vec<T>) -> Result<()> {
    match declaration {
        Ok(declaration) => {
            into.push(declaration);
            Ok(())
        }
        Err(err) if err.is_deferrable() => Err(err),
        Err(_err) => {
            #[cfg(feature = "logging")]
            trace!(target: "dependency_injector_codegen", error = %_err, "Skipped malformed declaration");
            Ok(())
        }
    }
}

/// Per-round cache of module descriptors
#[derive(Debug, Default)]
pub struct ModuleCache {
    descriptors: AHashMap<TypeMirror, Arc<ModuleDescriptor>>,
    production_executor: Option<Arc<ModuleDescriptor>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &mut self,
        factory: &mut BindingFactory<'_>,
        program: &dyn ProgramModel,
        module_type: &TypeMirror,
    ) -> Result<Arc<ModuleDescriptor>> {
        if let Some(existing) = self.descriptors.get(module_type) {
            return Ok(Arc::clone(existing));
        }
        let descriptor = Arc::new(ModuleDescriptor::create(factory, program, module_type)?);
        self.descriptors.insert(module_type.clone(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    pub fn production_executor(&mut self, factory: &mut BindingFactory<'_>) -> Arc<ModuleDescriptor> {
        Arc::clone(
            self.production_executor
                .get_or_insert_with(|| Arc::new(ModuleDescriptor::production_executor(factory))),
        )
    }

    /// `roots` and every module they include, breadth first, each once
    pub fn transitive(
        &mut self,
        factory: &mut BindingFactory<'_>,
        program: &dyn ProgramModel,
        roots: &[TypeMirror],
    ) -> Result<Vec<Arc<ModuleDescriptor>>> {
        let mut seen = AHashSet::new();
        let mut queue: VecDeque<TypeMirror> = roots.iter().cloned().collect();
        let mut modules = Vec::new();
        while let Some(module_type) = queue.pop_front() {
            if !seen.insert(module_type.clone()) {
                continue;
            }
            let descriptor = self.get_or_create(factory, program, &module_type)?;
            queue.extend(descriptor.includes.iter().cloned());
            modules.push(descriptor);
        }
        Ok(modules)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.production_executor = None;
    }
}
