//! Processing rounds
//!
//! A [`ComponentProcessor`] takes the elements of one round, builds and
//! validates the graph of every root component among them and plans code
//! for the ones that came out clean. Elements referring to types that are not
//! generated yet are deferred whole and retried first in the next round.

use crate::component::{ComponentDescriptorFactory, ComponentKind};
use crate::context::RoundContext;
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::{CodegenError, Result};
use crate::framework::names;
use crate::graph::{BindingGraphFactory, ComponentPath};
use crate::model::{AnnotatedElement, ProgramModel, TypeName};
use crate::options::CompilerOptions;
use crate::plan::{ComponentPlan, ComponentPlanner, ModifiableBindingMethods};
use crate::serialization::PersistedModifiableMethods;
use crate::validation::{BindingGraphValidator, ValidationEnv};
use ahash::AHashMap;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// What one round produced
#[derive(Debug, Default)]
pub struct RoundOutput {
    /// One plan per clean root component
    pub plans: Vec<ComponentPlan>,
    pub diagnostics: Vec<Diagnostic>,
    /// Elements retried in the next round
    pub deferred: Vec<TypeName>,
}

impl RoundOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn plan(&self, component: &TypeName) -> Option<&ComponentPlan> {
        self.plans.iter().find(|p| &p.component == component)
    }
}

enum Outcome {
    Planned(ComponentPlan),
    Rejected,
}

/// Drives binding graph processing across rounds
pub struct ComponentProcessor<'p> {
    ctx: RoundContext<'p>,
    validator: BindingGraphValidator,
    previous: AHashMap<ComponentPath, ModifiableBindingMethods>,
    deferred: Vec<TypeName>,
}

impl<'p> ComponentProcessor<'p> {
    pub fn new(program: &'p dyn ProgramModel, options: CompilerOptions) -> Self {
        Self {
            ctx: RoundContext::new(program, options),
            validator: BindingGraphValidator::new(),
            previous: AHashMap::new(),
            deferred: Vec::new(),
        }
    }

    /// Uses `validator` instead of the built-in plugins
    pub fn with_validator(mut self, validator: BindingGraphValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Modifiable methods recorded by earlier compilation units
    pub fn with_persisted_methods(mut self, records: impl IntoIterator<Item = PersistedModifiableMethods>) -> Self {
        for record in records {
            self.previous.insert(record.component, record.methods);
        }
        self
    }

    #[inline]
    pub fn options(&self) -> &CompilerOptions {
        self.ctx.options()
    }

    /// Elements waiting for the next round
    pub fn deferred(&self) -> &[TypeName] {
        &self.deferred
    }

    /// Processes the root components and modules among `elements`, then
    /// ends the round.
    ///
    /// An element that cannot be processed is reported as an error on that
    /// element and the round continues. Only an internal error aborts the
    /// round; the elements not reached yet stay deferred and the round's
    /// caches are still cleared.
    pub fn process_round(&mut self, elements: &[TypeName]) -> Result<RoundOutput> {
        let mut output = RoundOutput::default();
        let mut queue: Vec<TypeName> = std::mem::take(&mut self.deferred);
        for element in elements {
            if !queue.contains(element) {
                queue.push(element.clone());
            }
        }

        let mut pending = queue.into_iter();
        while let Some(name) = pending.next() {
            let program = self.ctx.program();
            let Some(element) = program.type_element(&name) else {
                self.defer(name, &mut output);
                continue;
            };
            let result = match ComponentKind::of(element) {
                Some(kind) if kind.is_root() => self.process_component(&name, &mut output.diagnostics),
                None if element.has_annotation(names::MODULE) || element.has_annotation(names::PRODUCER_MODULE) => {
                    self.process_module(&name, &mut output.diagnostics).map(|()| Outcome::Rejected)
                }
                _ => continue,
            };
            match result {
                Ok(Outcome::Planned(plan)) => output.plans.push(plan),
                Ok(Outcome::Rejected) => {}
                Err(err) if err.is_deferrable() => {
                    #[cfg(feature = "logging")]
                    warn!(
                        target: "dependency_injector_codegen",
                        element = %name,
                        reason = %err,
                        "Deferring element to the next round"
                    );
                    self.defer(name, &mut output);
                }
                Err(err @ CodegenError::Internal(_)) => {
                    self.deferred.extend(pending);
                    self.clear();
                    return Err(err);
                }
                Err(err) => {
                    #[cfg(feature = "logging")]
                    warn!(
                        target: "dependency_injector_codegen",
                        element = %name,
                        reason = %err,
                        "Element could not be processed"
                    );
                    output
                        .diagnostics
                        .push(Diagnostic::error(err.to_string()).at_element(Some(element.id)));
                }
            }
        }

        for report in self.ctx.declaration_reports() {
            report.print_to(&mut output.diagnostics);
        }
        self.clear();

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_injector_codegen",
            planned = output.plans.len(),
            diagnostics = output.diagnostics.len(),
            deferred = output.deferred.len(),
            "Finished processing round"
        );

        Ok(output)
    }

    /// Drops every cache keyed by this round's elements
    pub fn clear(&mut self) {
        self.ctx.clear();
    }

    fn defer(&mut self, name: TypeName, output: &mut RoundOutput) {
        output.deferred.push(name.clone());
        self.deferred.push(name);
    }

    fn process_component(&mut self, name: &TypeName, diagnostics: &mut Vec<Diagnostic>) -> Result<Outcome> {
        let mut descriptors = ComponentDescriptorFactory::new(&mut self.ctx);
        let component = descriptors.root_component(name);
        let descriptor_diagnostics = descriptors.into_diagnostics();
        let component = component?;
        let descriptor_errors = descriptor_diagnostics.iter().any(Diagnostic::is_error);
        diagnostics.extend(descriptor_diagnostics);
        if descriptor_errors {
            return Ok(Outcome::Rejected);
        }

        let graph = BindingGraphFactory::new(&mut self.ctx).create(component, false)?;
        let declarations_clean = graph.graphs().into_iter().all(|g| {
            self.ctx.modules_are_clean(g.owned_modules()) && self.ctx.bindings_are_clean(g.owned_bindings())
        });

        let env = ValidationEnv::new(self.ctx.program(), self.ctx.options());
        let reporter = self.validator.validate(&graph, &env);
        let graph_errors = reporter.has_errors();
        diagnostics.extend(reporter.into_diagnostics());
        if graph_errors || !declarations_clean {
            #[cfg(feature = "logging")]
            debug!(
                target: "dependency_injector_codegen",
                component = %name,
                graph_errors,
                declarations_clean,
                "Skipping code planning"
            );
            return Ok(Outcome::Rejected);
        }

        let mut planner = ComponentPlanner::new(&graph, self.ctx.options());
        for subgraph in graph.graphs() {
            if let Some(methods) = self.previous.get(subgraph.path()) {
                planner = planner.with_previous_methods(subgraph.path().clone(), methods.clone());
            }
        }
        Ok(Outcome::Planned(planner.plan()?))
    }

    /// Validates a module as a full binding graph when that is enabled
    fn process_module(&mut self, name: &TypeName, diagnostics: &mut Vec<Diagnostic>) -> Result<()> {
        let Some(severity) = self.ctx.options().full_binding_graph_validation.severity() else {
            return Ok(());
        };
        let mut descriptors = ComponentDescriptorFactory::new(&mut self.ctx);
        let component = descriptors.module_component(name);
        diagnostics.extend(descriptors.into_diagnostics());
        let graph = BindingGraphFactory::new(&mut self.ctx).create(component?, true)?;

        let env = ValidationEnv::new(self.ctx.program(), self.ctx.options());
        let reporter = self.validator.validate(&graph, &env);
        diagnostics.extend(reporter.into_diagnostics().into_iter().map(|mut diagnostic| {
            if diagnostic.severity == Severity::Error {
                diagnostic.severity = severity;
            }
            diagnostic
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework;
    use crate::model::{Annotation, InMemoryProgram, MethodSpec, Modifier, PrimitiveKind, ProgramBuilder, TypeMirror};
    use crate::options::ValidationType;
    use crate::plan::{MethodKind, ModifiableBindingType};
    use crate::request::RequestKind;

    fn provides(name: &str, returns: TypeMirror) -> MethodSpec {
        MethodSpec::new(name)
            .modifier(Modifier::Static)
            .annotate(Annotation::new(names::PROVIDES))
            .returns(returns)
    }

    fn program() -> InMemoryProgram {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.Foo", &[]);
        b.interface("test.Good")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .finish();
        b.interface("test.Bad")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("bar").returns(TypeMirror::named("test.Bar")))
            .finish();
        b.class("test.Unrelated").finish();
        b.build()
    }

    #[test]
    fn test_only_clean_components_are_planned() {
        let program = program();
        let mut processor = ComponentProcessor::new(&program, CompilerOptions::default());
        let output = processor
            .process_round(&[
                TypeName::new("test.Good"),
                TypeName::new("test.Bad"),
                TypeName::new("test.Unrelated"),
            ])
            .unwrap();

        assert_eq!(output.plans.len(), 1);
        assert_eq!(output.plan(&TypeName::new("test.Good")).unwrap().class_name, "DaggerGood");
        assert!(output.plan(&TypeName::new("test.Bad")).is_none());
        assert!(output.has_errors());
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.is_error() && d.message.starts_with("test.Bar cannot be provided")));
        assert!(output.deferred.is_empty());
    }

    #[test]
    fn test_component_using_invalid_inject_type_is_not_planned() {
        let mut b = ProgramBuilder::new();
        b.class("test.Foo")
            .constructor(
                MethodSpec::constructor()
                    .annotate(Annotation::new(names::INJECT))
                    .modifier(Modifier::Private),
            )
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .finish();
        let program = b.build();
        let mut processor = ComponentProcessor::new(&program, CompilerOptions::default());
        let output = processor.process_round(&[TypeName::new("test.App")]).unwrap();

        assert!(output.plans.is_empty());
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.is_error() && d.message.contains("private constructors")));
    }

    /// `test.Bar` injects `Producer<Lazy<Foo>>`; `test.Good` is unaffected
    fn nested_request_program() -> InMemoryProgram {
        let nested = TypeMirror::declared(
            names::PRODUCER,
            vec![TypeMirror::declared(names::LAZY, vec![TypeMirror::named("test.Foo")])],
        );
        let mut b = ProgramBuilder::new();
        b.inject_class("test.Foo", &[]);
        b.inject_class("test.Bar", &[nested]);
        b.interface("test.Good")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .finish();
        b.interface("test.Bad")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("bar").returns(TypeMirror::named("test.Bar")))
            .finish();
        b.build()
    }

    #[test]
    fn test_invalid_request_type_is_reported_without_ending_round() {
        let program = nested_request_program();
        let mut processor = ComponentProcessor::new(&program, CompilerOptions::default());
        let output = processor
            .process_round(&[TypeName::new("test.Bad"), TypeName::new("test.Good")])
            .unwrap();

        assert_eq!(output.plans.len(), 1);
        assert!(output.plan(&TypeName::new("test.Good")).is_some());
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.is_error() && d.message.contains("framework types may not be nested")));
    }

    #[test]
    fn test_failed_element_keeps_deferred_elements_and_clears_caches() {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.Foo", &[]);
        b.interface("test.Later")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("generated").returns(TypeMirror::error("test.Generated")))
            .finish();
        b.interface("test.Broken")
            .annotate(
                Annotation::new(names::COMPONENT)
                    .with_types("modules", vec![TypeMirror::primitive(PrimitiveKind::Int)]),
            )
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .finish();
        b.interface("test.Good")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .finish();
        let program = b.build();
        let mut processor = ComponentProcessor::new(&program, CompilerOptions::default());

        let output = processor.process_round(&[TypeName::new("test.Later")]).unwrap();
        assert_eq!(output.deferred, vec![TypeName::new("test.Later")]);

        let output = processor
            .process_round(&[TypeName::new("test.Broken"), TypeName::new("test.Good")])
            .unwrap();
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.is_error() && d.message.contains("modules must be declared types")));
        assert!(output.plan(&TypeName::new("test.Good")).is_some());
        assert_eq!(output.deferred, vec![TypeName::new("test.Later")]);
        assert_eq!(processor.deferred(), &[TypeName::new("test.Later")]);

        assert_eq!(processor.ctx.bindings.interned_count(), 0);
        assert_eq!(processor.ctx.declaration_reports().count(), 0);
        assert!(processor.ctx.components.is_empty());
    }

    #[test]
    fn test_missing_types_are_deferred_to_next_round() {
        let mut b = ProgramBuilder::new();
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("generated").returns(TypeMirror::error("test.Generated")))
            .finish();
        let program = b.build();
        let mut processor = ComponentProcessor::new(&program, CompilerOptions::default());

        let output = processor.process_round(&[TypeName::new("test.App")]).unwrap();
        assert!(output.plans.is_empty());
        assert!(!output.has_errors());
        assert_eq!(output.deferred, vec![TypeName::new("test.App")]);
        assert_eq!(processor.deferred(), &[TypeName::new("test.App")]);

        // Retried without being named again
        let output = processor.process_round(&[]).unwrap();
        assert_eq!(output.deferred, vec![TypeName::new("test.App")]);
    }

    fn module_program() -> InMemoryProgram {
        let mut b = ProgramBuilder::new();
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("foo", TypeMirror::named("test.Foo")))
            .method(provides("otherFoo", TypeMirror::named("test.Foo")))
            .finish();
        b.build()
    }

    #[test]
    fn test_module_validation_follows_option() {
        let program = module_program();
        let mut processor = ComponentProcessor::new(&program, CompilerOptions::default());
        let output = processor.process_round(&[TypeName::new("test.M")]).unwrap();
        assert!(output.diagnostics.is_empty());

        let options = CompilerOptions {
            full_binding_graph_validation: ValidationType::Warning,
            ..CompilerOptions::default()
        };
        let mut processor = ComponentProcessor::new(&program, options);
        let output = processor.process_round(&[TypeName::new("test.M")]).unwrap();
        assert!(!output.diagnostics.is_empty());
        assert!(output.diagnostics.iter().all(|d| d.severity == Severity::Warning));
        assert!(output.plans.is_empty());
    }

    #[test]
    fn test_persisted_methods_are_finalized() {
        let strings = framework::set_of(TypeMirror::named(names::STRING));
        let mut b = ProgramBuilder::new();
        b.class("test.ParentModule")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("parent", TypeMirror::named(names::STRING)).annotate(Annotation::new(names::INTO_SET)))
            .finish();
        b.class("test.ChildModule")
            .annotate(Annotation::new(names::MODULE))
            .method(provides("child", TypeMirror::named(names::STRING)).annotate(Annotation::new(names::INTO_SET)))
            .finish();
        b.interface("test.Child")
            .annotate(
                Annotation::new(names::SUBCOMPONENT)
                    .with_types("modules", vec![TypeMirror::named("test.ChildModule")]),
            )
            .method(MethodSpec::new("strings").returns(strings.clone()))
            .finish();
        b.interface("test.App")
            .annotate(
                Annotation::new(names::COMPONENT)
                    .with_types("modules", vec![TypeMirror::named("test.ParentModule")]),
            )
            .method(MethodSpec::new("child").returns(TypeMirror::named("test.Child")))
            .finish();
        let program = b.build();

        let aot = CompilerOptions {
            ahead_of_time_subcomponents: crate::options::FeatureStatus::Enabled,
            ..CompilerOptions::default()
        };
        let mut processor = ComponentProcessor::new(&program, aot);
        let output = processor.process_round(&[TypeName::new("test.App")]).unwrap();
        let records = output.plans[0].persisted_modifiable_methods();
        assert_eq!(records.len(), 1);

        let mut processor = ComponentProcessor::new(&program, CompilerOptions::default()).with_persisted_methods(records);
        let output = processor.process_round(&[TypeName::new("test.App")]).unwrap();
        let child = output.plans[0].child(&TypeName::new("test.Child")).unwrap();
        let record = child
            .modifiable_methods
            .get(&crate::key::Key::of(strings), RequestKind::Instance)
            .unwrap();
        assert!(record.finalized);
        assert_eq!(
            child.method(&record.method_name).unwrap().kind,
            MethodKind::Modifiable {
                modifiable_type: ModifiableBindingType::Multibinding,
                finalized: true
            }
        );
    }
}
