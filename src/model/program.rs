//! The host program model
//!
//! [`ProgramModel`] is the seam between the binding graph machinery and the
//! compiler that hosts it. Everything the processor needs to know about the
//! program (elements, subtyping, member types as seen from a subtype) goes
//! through this trait. [`InMemoryProgram`] is a self-contained implementation
//! assembled with [`ProgramBuilder`].

use super::annotation::Annotation;
use super::element::{
    ElementId, ExecutableElement, ExecutableKind, Modifier, TypeElement, TypeKind, VariableElement,
};
use super::types::{TypeMirror, TypeName};
use crate::error::{CodegenError, Result};
use crate::framework::names;
use ahash::{AHashMap, AHashSet};
use std::collections::{BTreeSet, VecDeque};

/// A method's parameter, return and thrown types as seen from a container type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableType {
    pub parameter_types: Vec<TypeMirror>,
    pub return_type: TypeMirror,
    pub thrown_types: Vec<TypeMirror>,
}

/// Read-only view of the program being compiled
pub trait ProgramModel {
    /// Looks up a type element by qualified name
    fn type_element(&self, name: &TypeName) -> Option<&TypeElement>;

    /// Human readable description of any element, used in diagnostics
    fn element_description(&self, id: ElementId) -> Option<String>;

    /// Types declared directly inside `name`
    fn enclosed_types(&self, name: &TypeName) -> Vec<&TypeElement>;

    fn type_element_of(&self, ty: &TypeMirror) -> Option<&TypeElement> {
        ty.declared_name().and_then(|name| self.type_element(name))
    }

    /// Fails with [`CodegenError::TypeNotPresent`] when the type references
    /// something that has not been generated yet
    fn check_type_present(&self, ty: &TypeMirror) -> Result<()> {
        match ty.first_error() {
            Some(name) => Err(CodegenError::type_not_present(name.as_str())),
            None => Ok(()),
        }
    }

    /// Superclass and interfaces with the type's arguments substituted
    fn direct_supertypes(&self, ty: &TypeMirror) -> Vec<TypeMirror> {
        let Some(element) = self.type_element_of(ty) else {
            return Vec::new();
        };
        let bindings = type_bindings(element, ty);
        element
            .superclass
            .iter()
            .chain(&element.interfaces)
            .map(|s| s.substitute(&bindings))
            .collect()
    }

    fn is_subtype(&self, sub: &TypeMirror, sup: &TypeMirror) -> bool {
        if sub == sup {
            return true;
        }
        if sup.is_type_of(names::OBJECT) {
            return matches!(sub, TypeMirror::Declared { .. } | TypeMirror::Array { .. });
        }
        let mut visited = AHashSet::new();
        let mut queue = VecDeque::from([sub.clone()]);
        while let Some(current) = queue.pop_front() {
            if current == *sup || (sup.is_raw() && current.erasure() == *sup) {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            queue.extend(self.direct_supertypes(&current));
        }
        false
    }

    /// Assignability after boxing
    fn is_assignable(&self, from: &TypeMirror, to: &TypeMirror) -> bool {
        self.is_subtype(&from.boxed(), &to.boxed())
    }

    /// Resolves a method's signature as a member of `container`, substituting
    /// type arguments along the supertype path
    fn method_as_member_of(&self, container: &TypeMirror, method: &ExecutableElement) -> ExecutableType {
        let bindings = self.type_bindings_for(container, &method.enclosing);
        ExecutableType {
            parameter_types: method
                .parameters
                .iter()
                .map(|p| p.ty.substitute(&bindings))
                .collect(),
            return_type: method.return_type.substitute(&bindings),
            thrown_types: method
                .thrown_types
                .iter()
                .map(|t| t.substitute(&bindings))
                .collect(),
        }
    }

    /// Resolves a field's type as a member of `container`
    fn field_as_member_of(&self, container: &TypeMirror, field: &VariableElement) -> TypeMirror {
        field.ty.substitute(&self.type_bindings_for(container, &field.enclosing))
    }

    /// Type variable bindings of `declaring` as seen from `container`
    fn type_bindings_for(&self, container: &TypeMirror, declaring: &TypeName) -> AHashMap<String, TypeMirror> {
        let mut visited = AHashSet::new();
        let mut queue = VecDeque::from([container.clone()]);
        while let Some(current) = queue.pop_front() {
            if current.declared_name() == Some(declaring) {
                return match self.type_element(declaring) {
                    Some(element) => type_bindings(element, &current),
                    None => AHashMap::new(),
                };
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            queue.extend(self.direct_supertypes(&current));
        }
        AHashMap::new()
    }

    /// The type followed by its superclasses, nearest first
    fn superclass_chain(&self, name: &TypeName) -> Vec<&TypeElement> {
        let mut chain = Vec::new();
        let mut seen = AHashSet::new();
        let mut next = self.type_element(name);
        while let Some(element) = next {
            if !seen.insert(element.name.clone()) {
                break;
            }
            chain.push(element);
            next = element
                .superclass
                .as_ref()
                .and_then(|s| self.type_element_of(s));
        }
        chain
    }

    /// Methods declared on or inherited by the type; overridden methods are
    /// reported once, from the most specific declaration
    fn all_methods(&self, name: &TypeName) -> Vec<&ExecutableElement> {
        let mut methods: Vec<&ExecutableElement> = Vec::new();
        let mut seen = AHashSet::new();
        let mut queue = VecDeque::from([name.clone()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(element) = self.type_element(&current) else {
                continue;
            };
            for method in &element.methods {
                if !methods.iter().any(|m| m.overrides_signature_of(method)) {
                    methods.push(method);
                }
            }
            queue.extend(
                element
                    .superclass
                    .iter()
                    .chain(&element.interfaces)
                    .filter_map(|t| t.declared_name().cloned()),
            );
        }
        methods
    }

    /// Whether `ty` is a checked exception type
    fn is_checked_exception(&self, ty: &TypeMirror) -> bool {
        self.is_subtype(ty, &TypeMirror::named(names::EXCEPTION))
            && !self.is_subtype(ty, &TypeMirror::named(names::RUNTIME_EXCEPTION))
    }
}

/// Bindings from an element's type parameters to the arguments of `ty`
pub(crate) fn type_bindings(element: &TypeElement, ty: &TypeMirror) -> AHashMap<String, TypeMirror> {
    let args = ty.type_args();
    if args.len() != element.type_parameters.len() {
        return AHashMap::new();
    }
    element
        .type_parameters
        .iter()
        .cloned()
        .zip(args.iter().cloned())
        .collect()
}

// ============================================================================
// In-memory program
// ============================================================================

/// A complete program model held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryProgram {
    types: AHashMap<TypeName, TypeElement>,
    order: Vec<TypeName>,
    descriptions: AHashMap<ElementId, String>,
}

impl InMemoryProgram {
    /// Start assembling a program
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::new()
    }

    /// All types in declaration order
    pub fn types(&self) -> impl Iterator<Item = &TypeElement> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    /// Number of declared types
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Types carrying the given annotation
    pub fn annotated_with(&self, annotation: &str) -> Vec<TypeName> {
        self.types()
            .filter(|t| t.annotations.iter().any(|a| a.is(annotation)))
            .map(|t| t.name.clone())
            .collect()
    }

    fn index(&mut self, element: &TypeElement) {
        self.descriptions.insert(element.id, element.name.to_string());
        for executable in element.constructors.iter().chain(&element.methods) {
            self.descriptions.insert(executable.id, executable.signature());
            for (i, param) in executable.parameters.iter().enumerate() {
                let names = executable
                    .parameters
                    .iter()
                    .enumerate()
                    .map(|(j, p)| if i == j { p.name.as_str() } else { "…" })
                    .collect::<Vec<_>>()
                    .join(", ");
                let owner = if executable.is_constructor() {
                    executable.enclosing.to_string()
                } else {
                    format!("{}.{}", executable.enclosing, executable.name)
                };
                self.descriptions.insert(param.id, format!("{}({})", owner, names));
            }
        }
        for field in &element.fields {
            self.descriptions.insert(field.id, field.signature());
        }
    }
}

impl ProgramModel for InMemoryProgram {
    fn type_element(&self, name: &TypeName) -> Option<&TypeElement> {
        self.types.get(name)
    }

    fn element_description(&self, id: ElementId) -> Option<String> {
        self.descriptions.get(&id).cloned()
    }

    fn enclosed_types(&self, name: &TypeName) -> Vec<&TypeElement> {
        self.types()
            .filter(|t| t.enclosing.as_ref() == Some(name))
            .collect()
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Assembles an [`InMemoryProgram`]
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    next_id: u32,
    program: InMemoryProgram,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> ElementId {
        self.next_id += 1;
        ElementId(self.next_id)
    }

    fn start(&mut self, name: &str, kind: TypeKind) -> TypeBuilder<'_> {
        let id = self.next_id();
        let enclosing = name
            .rfind('.')
            .map(|idx| &name[..idx])
            .filter(|outer| self.program.types.contains_key(&TypeName::new(*outer)))
            .map(TypeName::new);
        TypeBuilder {
            element: TypeElement {
                id,
                name: TypeName::new(name),
                kind,
                modifiers: BTreeSet::new(),
                annotations: Vec::new(),
                type_parameters: Vec::new(),
                superclass: None,
                interfaces: Vec::new(),
                constructors: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
                enclosing,
            },
            builder: self,
        }
    }

    /// Declare a class
    pub fn class(&mut self, name: &str) -> TypeBuilder<'_> {
        self.start(name, TypeKind::Class)
    }

    /// Declare an interface
    pub fn interface(&mut self, name: &str) -> TypeBuilder<'_> {
        self.start(name, TypeKind::Interface)
    }

    /// Declare an annotation type
    pub fn annotation_type(&mut self, name: &str) -> TypeBuilder<'_> {
        self.start(name, TypeKind::Annotation)
    }

    /// Declare a qualifier annotation type
    pub fn qualifier(&mut self, name: &str) -> TypeName {
        self.annotation_type(name)
            .annotate(Annotation::new(names::QUALIFIER))
            .finish()
    }

    /// Declare a scope annotation type
    pub fn scope(&mut self, name: &str) -> TypeName {
        self.annotation_type(name)
            .annotate(Annotation::new(names::SCOPE))
            .finish()
    }

    /// Declare a class with an `@Inject` constructor taking the given types
    pub fn inject_class(&mut self, name: &str, dependencies: &[TypeMirror]) -> TypeName {
        let mut ctor = MethodSpec::constructor().annotate(Annotation::new(names::INJECT));
        for (i, ty) in dependencies.iter().enumerate() {
            ctor = ctor.param(format!("dep{}", i), ty.clone());
        }
        self.class(name).constructor(ctor).finish()
    }

    /// Finish assembling
    pub fn build(self) -> InMemoryProgram {
        self.program
    }
}

/// Fluent builder for a single type element
#[derive(Debug)]
pub struct TypeBuilder<'a> {
    builder: &'a mut ProgramBuilder,
    element: TypeElement,
}

impl TypeBuilder<'_> {
    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.element.annotations.push(annotation);
        self
    }

    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.element.modifiers.insert(modifier);
        self
    }

    pub fn type_parameter(mut self, name: &str) -> Self {
        self.element.type_parameters.push(name.to_string());
        self
    }

    pub fn extends(mut self, superclass: TypeMirror) -> Self {
        self.element.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: TypeMirror) -> Self {
        self.element.interfaces.push(interface);
        self
    }

    /// Mark the type as nested in `outer`
    pub fn nested_in(mut self, outer: &str) -> Self {
        self.element.enclosing = Some(TypeName::new(outer));
        self
    }

    pub fn constructor(mut self, spec: MethodSpec) -> Self {
        let ctor = self.executable(spec, ExecutableKind::Constructor);
        self.element.constructors.push(ctor);
        self
    }

    pub fn method(mut self, spec: MethodSpec) -> Self {
        let method = self.executable(spec, ExecutableKind::Method);
        self.element.methods.push(method);
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        let field = VariableElement {
            id: self.builder.next_id(),
            name: spec.name,
            ty: spec.ty,
            annotations: spec.annotations,
            modifiers: spec.modifiers,
            enclosing: self.element.name.clone(),
        };
        self.element.fields.push(field);
        self
    }

    fn executable(&mut self, spec: MethodSpec, kind: ExecutableKind) -> ExecutableElement {
        let id = self.builder.next_id();
        let enclosing = self.element.name.clone();
        let parameters = spec
            .parameters
            .into_iter()
            .map(|p| VariableElement {
                id: self.builder.next_id(),
                name: p.name,
                ty: p.ty,
                annotations: p.annotations,
                modifiers: BTreeSet::new(),
                enclosing: enclosing.clone(),
            })
            .collect();
        let (name, return_type) = match kind {
            ExecutableKind::Constructor => ("<init>".to_string(), TypeMirror::Void),
            ExecutableKind::Method => (spec.name, spec.return_type),
        };
        ExecutableElement {
            id,
            kind,
            name,
            enclosing,
            modifiers: spec.modifiers,
            annotations: spec.annotations,
            type_parameters: spec.type_parameters,
            parameters,
            return_type,
            thrown_types: spec.thrown_types,
        }
    }

    /// Add the type to the program
    pub fn finish(self) -> TypeName {
        let name = self.element.name.clone();
        let program = &mut self.builder.program;
        program.index(&self.element);
        if !program.types.contains_key(&name) {
            program.order.push(name.clone());
        }
        program.types.insert(name.clone(), self.element);
        name
    }
}

/// Declarative description of a constructor or method
#[derive(Debug, Clone)]
pub struct MethodSpec {
    name: String,
    modifiers: BTreeSet<Modifier>,
    annotations: Vec<Annotation>,
    type_parameters: Vec<String>,
    parameters: Vec<ParamSpec>,
    return_type: TypeMirror,
    thrown_types: Vec<TypeMirror>,
}

#[derive(Debug, Clone)]
struct ParamSpec {
    name: String,
    ty: TypeMirror,
    annotations: Vec<Annotation>,
}

impl MethodSpec {
    /// A `void` method
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: BTreeSet::new(),
            annotations: Vec::new(),
            type_parameters: Vec::new(),
            parameters: Vec::new(),
            return_type: TypeMirror::Void,
            thrown_types: Vec::new(),
        }
    }

    pub fn constructor() -> Self {
        Self::new("<init>")
    }

    /// An abstract method, as declared on interfaces and abstract modules
    pub fn abstract_method(name: impl Into<String>) -> Self {
        Self::new(name).modifier(Modifier::Abstract)
    }

    pub fn returns(mut self, ty: TypeMirror) -> Self {
        self.return_type = ty;
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeMirror) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            ty,
            annotations: Vec::new(),
        });
        self
    }

    pub fn annotated_param(mut self, name: impl Into<String>, ty: TypeMirror, annotations: Vec<Annotation>) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            ty,
            annotations,
        });
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.insert(modifier);
        self
    }

    pub fn type_parameter(mut self, name: impl Into<String>) -> Self {
        self.type_parameters.push(name.into());
        self
    }

    pub fn throws(mut self, ty: TypeMirror) -> Self {
        self.thrown_types.push(ty);
        self
    }
}

/// Declarative description of a field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    ty: TypeMirror,
    annotations: Vec<Annotation>,
    modifiers: BTreeSet<Modifier>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: TypeMirror) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Vec::new(),
            modifiers: BTreeSet::new(),
        }
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.insert(modifier);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotatedElement;

    fn generic_program() -> InMemoryProgram {
        let mut b = ProgramBuilder::new();
        b.class("test.Base")
            .type_parameter("T")
            .method(
                MethodSpec::new("get")
                    .returns(TypeMirror::variable("T"))
                    .param("t", TypeMirror::variable("T")),
            )
            .finish();
        b.class("test.Child")
            .extends(TypeMirror::declared("test.Base", vec![TypeMirror::named("test.Foo")]))
            .finish();
        b.build()
    }

    #[test]
    fn test_subtype_through_generic_superclass() {
        let program = generic_program();
        let child = TypeMirror::named("test.Child");
        assert!(program.is_subtype(&child, &TypeMirror::declared("test.Base", vec![TypeMirror::named("test.Foo")])));
        assert!(program.is_subtype(&child, &TypeMirror::named("test.Base")));
        assert!(!program.is_subtype(&child, &TypeMirror::declared("test.Base", vec![TypeMirror::named("test.Bar")])));
        assert!(program.is_subtype(&child, &TypeMirror::named(names::OBJECT)));
    }

    #[test]
    fn test_method_as_member_of() {
        let program = generic_program();
        let base = program.type_element(&TypeName::new("test.Base")).unwrap();
        let resolved = program.method_as_member_of(&TypeMirror::named("test.Child"), &base.methods[0]);
        assert_eq!(resolved.return_type, TypeMirror::named("test.Foo"));
        assert_eq!(resolved.parameter_types, vec![TypeMirror::named("test.Foo")]);
    }

    #[test]
    fn test_all_methods_includes_inherited() {
        let program = generic_program();
        let methods = program.all_methods(&TypeName::new("test.Child"));
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "get");
    }

    #[test]
    fn test_check_type_present() {
        let program = generic_program();
        assert!(program.check_type_present(&TypeMirror::named("test.Child")).is_ok());
        let err = program
            .check_type_present(&TypeMirror::error("test.DaggerGenerated"))
            .unwrap_err();
        assert!(err.is_deferrable());
    }

    #[test]
    fn test_descriptions() {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.Foo", &[TypeMirror::named("test.Bar")]);
        let program = b.build();
        let foo = program.type_element(&TypeName::new("test.Foo")).unwrap();
        assert!(foo.constructors[0].has_annotation(names::INJECT));
        let param = &foo.constructors[0].parameters[0];
        assert_eq!(program.element_description(param.id).as_deref(), Some("test.Foo(dep0)"));
    }

    #[test]
    fn test_enclosed_types() {
        let mut b = ProgramBuilder::new();
        b.interface("test.Child").finish();
        b.interface("test.Child.Builder").finish();
        let program = b.build();
        let nested = program.enclosed_types(&TypeName::new("test.Child"));
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].simple_name(), "Builder");
    }

    #[test]
    fn test_checked_exception() {
        let mut b = ProgramBuilder::new();
        b.class("test.MyException")
            .extends(TypeMirror::named(names::EXCEPTION))
            .finish();
        b.class("test.MyRuntime")
            .extends(TypeMirror::named(names::RUNTIME_EXCEPTION))
            .finish();
        b.class(names::RUNTIME_EXCEPTION)
            .extends(TypeMirror::named(names::EXCEPTION))
            .finish();
        let program = b.build();
        assert!(program.is_checked_exception(&TypeMirror::named("test.MyException")));
        assert!(!program.is_checked_exception(&TypeMirror::named("test.MyRuntime")));
    }
}
