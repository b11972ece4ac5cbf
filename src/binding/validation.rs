//! Per-declaration validation
//!
//! These checks look at a single annotated element. Each produces a
//! [`ValidationReport`]; the binding for the element is still built when
//! possible so graph-level problems are reported in the same pass.

use crate::diagnostics::{Severity, ValidationReport};
use crate::framework::{MapType, SetType, is_framework_type, names};
use crate::injection::InjectionAnnotations;
use crate::model::{AnnotatedElement, ElementId, ExecutableElement, ProgramModel, TypeElement, TypeMirror};
use crate::options::CompilerOptions;
use crate::request::classify;

/// Annotations that make a method a binding method
pub const BINDING_METHOD_ANNOTATIONS: &[&str] = &[
    names::PROVIDES,
    names::PRODUCES,
    names::BINDS,
    names::MULTIBINDS,
    names::BINDS_OPTIONAL_OF,
];

const MULTIBINDING_ANNOTATIONS: &[&str] = &[names::INTO_SET, names::ELEMENTS_INTO_SET, names::INTO_MAP];

/// Validates injection declarations against the program model
pub struct DeclarationValidator<'a> {
    program: &'a dyn ProgramModel,
    injection: InjectionAnnotations<'a>,
    options: &'a CompilerOptions,
}

impl<'a> DeclarationValidator<'a> {
    pub fn new(program: &'a dyn ProgramModel, options: &'a CompilerOptions) -> Self {
        Self {
            program,
            injection: InjectionAnnotations::new(program),
            options,
        }
    }

    // ========================================================================
    // @Inject types
    // ========================================================================

    /// Checks an `@Inject` constructor and the type that declares it
    pub fn validate_inject_constructor(&self, ty: &TypeElement, ctor: &ExecutableElement) -> ValidationReport {
        let mut report = ValidationReport::about(ctor.id);

        if ctor.is_private() {
            report.add_error("Dagger does not support injection into private constructors");
        }
        if ty.is_abstract_type() {
            report.add_error("@Inject is nonsense on the constructor of an abstract class");
        }
        if ty.is_inner_class() {
            report.add_error(format!(
                "@Inject constructors are invalid on inner classes. Did you mean to make the class static? ({})",
                ty.name
            ));
        }
        if !ctor.type_parameters.is_empty() {
            report.add_error("@Inject constructors may not declare type parameters");
        }
        if !self.injection.qualifiers(&ctor.annotations).is_empty() {
            report.add_error("@Qualifier annotations are not allowed on @Inject constructors");
        }
        if !self.injection.scopes(&ctor.annotations).is_empty() {
            report.add_error("@Scope annotations are not allowed on @Inject constructors");
        }
        for thrown in &ctor.thrown_types {
            if self.program.is_checked_exception(thrown) {
                report.add_error("Dagger does not support checked exceptions on @Inject constructors");
                break;
            }
        }
        if self.enclosed_in_private_type(ty) {
            report.add_error("Dagger does not support injection into private classes");
        }

        let injected = ty
            .constructors
            .iter()
            .filter(|c| c.has_annotation(names::INJECT))
            .count();
        if injected > 1 {
            report.add_error("Types may only contain one injected constructor");
        }
        if self.injection.scopes(&ty.annotations).len() > 1 {
            report.add_error_at("A single binding may not declare more than one @Scope", ty.id);
        }

        for param in &ctor.parameters {
            self.check_request_qualifiers(&mut report, &param.annotations, param.id);
            check_request_type(&mut report, &param.ty, param.id);
        }
        report
    }

    fn enclosed_in_private_type(&self, ty: &TypeElement) -> bool {
        if ty.is_private() {
            return true;
        }
        let mut enclosing = ty.enclosing.clone();
        while let Some(name) = enclosing {
            match self.program.type_element(&name) {
                Some(outer) if outer.is_private() => return true,
                Some(outer) => enclosing = outer.enclosing.clone(),
                None => break,
            }
        }
        false
    }

    fn check_request_qualifiers(
        &self,
        report: &mut ValidationReport,
        annotations: &[crate::model::Annotation],
        element: crate::model::ElementId,
    ) {
        if self.injection.qualifiers(annotations).len() > 1 {
            report.add_error_at(
                "A single dependency request may not use more than one @Qualifier",
                element,
            );
        }
    }

    /// Checks the `@Inject` fields and methods declared directly on `ty`
    pub fn validate_members(&self, ty: &TypeElement) -> ValidationReport {
        let mut report = ValidationReport::about(ty.id);
        let private_severity = self.options.private_member_validation.severity();
        let static_severity = self.options.static_member_validation.severity();

        for field in ty.fields.iter().filter(|f| f.has_annotation(names::INJECT)) {
            if field.is_final() {
                report.add_error_at("@Inject fields may not be final", field.id);
            }
            if field.is_private() {
                if let Some(severity) = private_severity {
                    report.add_item(severity, "Dagger does not support injection into private fields", field.id);
                }
            }
            if field.is_static() {
                if let Some(severity) = static_severity {
                    report.add_item(severity, "Dagger does not support injection into static fields", field.id);
                }
            }
            self.check_request_qualifiers(&mut report, &field.annotations, field.id);
            check_request_type(&mut report, &field.ty, field.id);
        }

        for method in ty.methods.iter().filter(|m| m.has_annotation(names::INJECT)) {
            if method.is_abstract() {
                report.add_error_at("Methods with @Inject may not be abstract", method.id);
            }
            if !method.type_parameters.is_empty() {
                report.add_error_at("Methods with @Inject may not declare type parameters", method.id);
            }
            if method.is_private() {
                if let Some(severity) = private_severity {
                    report.add_item(severity, "Dagger does not support injection into private methods", method.id);
                }
            }
            if method.is_static() {
                if let Some(severity) = static_severity {
                    report.add_item(severity, "Dagger does not support injection into static methods", method.id);
                }
            }
            for param in &method.parameters {
                self.check_request_qualifiers(&mut report, &param.annotations, param.id);
                check_request_type(&mut report, &param.ty, param.id);
            }
        }
        report
    }

    // ========================================================================
    // Modules and binding methods
    // ========================================================================

    /// Checks a module type and every binding method it declares
    pub fn validate_module(&self, module: &TypeElement) -> ValidationReport {
        let mut report = ValidationReport::about(module.id);
        let binding_methods: Vec<&ExecutableElement> = module
            .methods
            .iter()
            .filter(|m| m.has_any_annotation(BINDING_METHOD_ANNOTATIONS))
            .collect();

        let has_abstract = binding_methods.iter().any(|m| m.is_abstract());
        let has_instance = binding_methods
            .iter()
            .any(|m| !m.is_abstract() && !m.is_static());
        if has_abstract && has_instance {
            report.add_error("A @Module may not contain both non-static and abstract binding methods");
        }
        if !module.type_parameters.is_empty() && module.has_annotation(names::MODULE) {
            let non_static = binding_methods.iter().any(|m| !m.is_static() && !m.is_abstract());
            if !non_static {
                report.add_error("Generic modules must have at least one non-static binding method");
            }
        }
        for method in binding_methods {
            report.add_subreport(self.validate_binding_method(module, method));
        }
        report
    }

    /// Checks a single binding method
    pub fn validate_binding_method(&self, module: &TypeElement, method: &ExecutableElement) -> ValidationReport {
        let mut report = ValidationReport::about(method.id);
        let kinds: Vec<&str> = BINDING_METHOD_ANNOTATIONS
            .iter()
            .copied()
            .filter(|a| method.has_annotation(a))
            .collect();
        if kinds.len() > 1 {
            report.add_error(
                "A binding method may not be annotated with more than one of @Provides, @Produces, @Binds, @Multibinds, @BindsOptionalOf",
            );
            return report;
        }
        let Some(&kind) = kinds.first() else {
            return report;
        };
        let label = simple(kind);

        if method.is_private() {
            report.add_error(format!("@{} methods cannot be private", label));
        }
        if !method.type_parameters.is_empty() {
            report.add_error(format!("@{} methods may not have type parameters", label));
        }
        if method.return_type.is_void() {
            report.add_error(format!("@{} methods must return a value (not void)", label));
        } else if is_framework_type(&method.return_type) && kind != names::MULTIBINDS {
            report.add_error(format!("@{} methods must not return framework types", label));
        }
        if self.injection.qualifiers(&method.annotations).len() > 1 {
            report.add_error(format!("@{} methods may not use more than one @Qualifier", label));
        }

        let scopes = self.injection.scopes(&method.annotations);
        if scopes.len() > 1 {
            report.add_error("Cannot use more than one @Scope");
        }
        if !scopes.is_empty() && kind == names::PRODUCES {
            report.add_error("@Produces methods cannot be scoped");
        }

        match kind {
            names::PROVIDES | names::PRODUCES => {
                if method.is_abstract() {
                    report.add_error(format!("@{} methods cannot be abstract", label));
                }
                if module.is_interface() && !method.is_static() {
                    report.add_error(format!("@{} methods in interfaces must be static", label));
                }
                self.check_multibinding(&mut report, method, label);
                for param in &method.parameters {
                    self.check_request_qualifiers(&mut report, &param.annotations, param.id);
                    check_request_type(&mut report, &param.ty, param.id);
                }
                if kind == names::PRODUCES
                    && method.return_type.is_type_of(names::LISTENABLE_FUTURE)
                    && method.return_type.is_raw()
                {
                    report.add_error("@Produces methods may not return a raw ListenableFuture");
                }
                if kind == names::PROVIDES {
                    for thrown in &method.thrown_types {
                        if self.program.is_checked_exception(thrown) {
                            report.add_error("@Provides methods may only throw unchecked exceptions");
                            break;
                        }
                    }
                }
            }
            names::BINDS => {
                if !method.is_abstract() {
                    report.add_error("@Binds methods must be abstract");
                }
                let assignable = match method.parameters.as_slice() {
                    [param] => self.program.is_assignable(&param.ty, &method.return_type),
                    _ => false,
                };
                if !assignable {
                    report.add_error(
                        "@Binds methods must have exactly one parameter, whose type is assignable to the return type",
                    );
                }
                self.check_multibinding(&mut report, method, label);
            }
            names::MULTIBINDS => {
                if !method.is_abstract() {
                    report.add_error("@Multibinds methods must be abstract");
                }
                if !method.parameters.is_empty() {
                    report.add_error("@Multibinds methods cannot have parameters");
                }
                let valid_return = SetType::from(&method.return_type).is_some_and(|s| !s.is_raw())
                    || MapType::from(&method.return_type)
                        .is_some_and(|m| !m.is_raw() && !m.values_are_framework_type());
                if !valid_return {
                    report.add_error("@Multibinds methods must return Map<K, V> or Set<T>");
                }
                if method.has_any_annotation(MULTIBINDING_ANNOTATIONS) {
                    report.add_error("@Multibinds methods cannot also have multibinding annotations");
                }
            }
            names::BINDS_OPTIONAL_OF => {
                if !method.is_abstract() {
                    report.add_error("@BindsOptionalOf methods must be abstract");
                }
                if !method.parameters.is_empty() {
                    report.add_error("@BindsOptionalOf methods must not have parameters");
                }
                if !scopes.is_empty() {
                    report.add_error("@BindsOptionalOf methods cannot be scoped");
                }
                if self.injection.qualifier(&method.annotations).is_none() && self.has_inject_constructor(&method.return_type) {
                    report.add_error(
                        "@BindsOptionalOf methods cannot return unqualified types that have an @Inject-annotated constructor because those are always present",
                    );
                }
            }
            _ => {}
        }
        report
    }

    fn check_multibinding(&self, report: &mut ValidationReport, method: &ExecutableElement, label: &str) {
        let multibinding_count = MULTIBINDING_ANNOTATIONS
            .iter()
            .filter(|a| method.has_annotation(a))
            .count();
        if multibinding_count > 1 {
            report.add_error(format!(
                "Multiple multibinding annotations cannot be placed on the same @{} method",
                label
            ));
        }
        let map_keys = self.injection.map_keys(&method.annotations);
        match ContributionTarget::of(method) {
            ContributionTarget::Map => match map_keys.len() {
                0 => report.add_error(format!("@{} methods of type map must declare a map key", label)),
                1 => {}
                _ => report.add_error(format!("@{} methods may not have more than one map key", label)),
            },
            _ if !map_keys.is_empty() => {
                report.add_error(format!("@{} methods of non map type cannot declare a map key", label))
            }
            ContributionTarget::SetValues => {
                if SetType::from(&method.return_type).is_none_or(|s| s.is_raw()) {
                    report.add_error(format!("@{} methods of type set values must return a Set", label));
                }
            }
            _ => {}
        }
    }

    fn has_inject_constructor(&self, ty: &TypeMirror) -> bool {
        self.program
            .type_element_of(ty)
            .is_some_and(|e| e.constructors.iter().any(|c| c.has_annotation(names::INJECT)))
    }

    /// Severity for a subcomponent or component problem that is always fatal
    pub fn error_severity(&self) -> Severity {
        Severity::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContributionTarget {
    Unique,
    Set,
    SetValues,
    Map,
}

impl ContributionTarget {
    fn of(method: &ExecutableElement) -> Self {
        if method.has_annotation(names::INTO_MAP) {
            Self::Map
        } else if method.has_annotation(names::INTO_SET) {
            Self::Set
        } else if method.has_annotation(names::ELEMENTS_INTO_SET) {
            Self::SetValues
        } else {
            Self::Unique
        }
    }
}

fn simple(annotation: &str) -> &str {
    annotation.rsplit('.').next().unwrap_or(annotation)
}

/// Reports a request type with an unsupported framework wrapping, such as a
/// raw `Provider` or `Producer<Lazy<T>>`
fn check_request_type(report: &mut ValidationReport, ty: &TypeMirror, element: ElementId) {
    if let Err(err) = classify(ty) {
        report.add_error_at(err.to_string(), element);
    }
}
