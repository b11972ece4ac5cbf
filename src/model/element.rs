//! Program elements: types, executables and variables

use super::annotation::Annotation;
use super::types::{TypeMirror, TypeName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable handle to an element within a processing round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u32);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Static,
    Abstract,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Annotation,
    Enum,
}

/// Field or parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableElement {
    pub id: ElementId,
    pub name: String,
    pub ty: TypeMirror,
    pub annotations: Vec<Annotation>,
    pub modifiers: BTreeSet<Modifier>,
    pub enclosing: TypeName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutableKind {
    Constructor,
    Method,
}

/// Constructor or method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutableElement {
    pub id: ElementId,
    pub kind: ExecutableKind,
    pub name: String,
    pub enclosing: TypeName,
    pub modifiers: BTreeSet<Modifier>,
    pub annotations: Vec<Annotation>,
    pub type_parameters: Vec<String>,
    pub parameters: Vec<VariableElement>,
    pub return_type: TypeMirror,
    pub thrown_types: Vec<TypeMirror>,
}

/// Class, interface, annotation type or enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeElement {
    pub id: ElementId,
    pub name: TypeName,
    pub kind: TypeKind,
    pub modifiers: BTreeSet<Modifier>,
    pub annotations: Vec<Annotation>,
    pub type_parameters: Vec<String>,
    pub superclass: Option<TypeMirror>,
    pub interfaces: Vec<TypeMirror>,
    pub constructors: Vec<ExecutableElement>,
    pub methods: Vec<ExecutableElement>,
    pub fields: Vec<VariableElement>,
    /// Enclosing type for nested types
    pub enclosing: Option<TypeName>,
}

/// Shared accessors for annotated elements
pub trait AnnotatedElement {
    fn annotations(&self) -> &[Annotation];
    fn modifiers(&self) -> &BTreeSet<Modifier>;

    fn has_annotation(&self, qualified: &str) -> bool {
        self.annotations().iter().any(|a| a.is(qualified))
    }

    fn annotation(&self, qualified: &str) -> Option<&Annotation> {
        self.annotations().iter().find(|a| a.is(qualified))
    }

    fn has_any_annotation(&self, qualified: &[&str]) -> bool {
        self.annotations()
            .iter()
            .any(|a| qualified.iter().any(|q| a.is(q)))
    }

    fn is_private(&self) -> bool {
        self.modifiers().contains(&Modifier::Private)
    }

    fn is_static(&self) -> bool {
        self.modifiers().contains(&Modifier::Static)
    }

    fn is_abstract(&self) -> bool {
        self.modifiers().contains(&Modifier::Abstract)
    }

    fn is_final(&self) -> bool {
        self.modifiers().contains(&Modifier::Final)
    }
}

macro_rules! annotated {
    ($($ty:ty),*) => {
        $(impl AnnotatedElement for $ty {
            fn annotations(&self) -> &[Annotation] {
                &self.annotations
            }

            fn modifiers(&self) -> &BTreeSet<Modifier> {
                &self.modifiers
            }
        })*
    };
}

annotated!(VariableElement, ExecutableElement, TypeElement);

impl TypeElement {
    /// The declared type with its own type variables as arguments
    pub fn as_type(&self) -> TypeMirror {
        TypeMirror::Declared {
            name: self.name.clone(),
            args: self
                .type_parameters
                .iter()
                .map(|p| TypeMirror::variable(p.clone()))
                .collect(),
        }
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Abstract classes and interfaces
    pub fn is_abstract_type(&self) -> bool {
        self.is_interface() || self.is_abstract()
    }

    /// A nested class that is not static captures an outer instance
    pub fn is_inner_class(&self) -> bool {
        self.enclosing.is_some() && self.kind == TypeKind::Class && !self.is_static()
    }

    pub fn simple_name(&self) -> &str {
        self.name.simple_name()
    }

    /// Looks up a method declared directly on this type
    pub fn method(&self, id: ElementId) -> Option<&ExecutableElement> {
        self.methods.iter().find(|m| m.id == id)
    }
}

impl ExecutableElement {
    #[inline]
    pub fn is_constructor(&self) -> bool {
        self.kind == ExecutableKind::Constructor
    }

    /// Readable signature, e.g. `test.Module.provideFoo(test.Bar)`
    pub fn signature(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| p.ty.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if self.is_constructor() {
            format!("{}({})", self.enclosing, params)
        } else {
            format!("{}.{}({})", self.enclosing, self.name, params)
        }
    }

    /// Methods with the same name and parameter types override each other
    pub fn overrides_signature_of(&self, other: &ExecutableElement) -> bool {
        self.name == other.name
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.ty.erasure() == b.ty.erasure())
    }
}

impl VariableElement {
    /// Readable location, e.g. `test.Foo.bar`
    pub fn signature(&self) -> String {
        format!("{}.{}", self.enclosing, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, params: Vec<TypeMirror>) -> ExecutableElement {
        ExecutableElement {
            id: ElementId(1),
            kind: ExecutableKind::Method,
            name: name.into(),
            enclosing: TypeName::new("test.Module"),
            modifiers: BTreeSet::new(),
            annotations: vec![Annotation::new("dagger.Provides")],
            type_parameters: Vec::new(),
            parameters: params
                .into_iter()
                .enumerate()
                .map(|(i, ty)| VariableElement {
                    id: ElementId(10 + i as u32),
                    name: format!("p{}", i),
                    ty,
                    annotations: Vec::new(),
                    modifiers: BTreeSet::new(),
                    enclosing: TypeName::new("test.Module"),
                })
                .collect(),
            return_type: TypeMirror::named("test.Foo"),
            thrown_types: Vec::new(),
        }
    }

    #[test]
    fn test_signature() {
        let m = method("provideFoo", vec![TypeMirror::named("test.Bar")]);
        assert_eq!(m.signature(), "test.Module.provideFoo(test.Bar)");
        assert!(m.has_annotation("dagger.Provides"));
    }

    #[test]
    fn test_override_signature() {
        let a = method("get", vec![TypeMirror::declared("java.util.List", vec![TypeMirror::variable("T")])]);
        let b = method("get", vec![TypeMirror::declared("java.util.List", vec![TypeMirror::named("test.Foo")])]);
        let c = method("other", vec![]);
        assert!(a.overrides_signature_of(&b));
        assert!(!a.overrides_signature_of(&c));
    }
}
