//! Declarations that are not bindings by themselves
//!
//! `@Binds`, `@Multibinds`, `@BindsOptionalOf` and module `subcomponents=`
//! entries describe how a key may be bound; the resolver turns them into
//! bindings (or uses them to permit empty multibindings) on demand.

use super::{Binding, ContributionType};
use crate::key::Key;
use crate::model::{Annotation, ElementId, TypeName};
use crate::request::DependencyRequest;
use crate::scope::Scope;

/// Anything that can be listed as a declaration of a key in diagnostics
pub trait BindingDeclaration {
    fn key(&self) -> &Key;
    fn binding_element(&self) -> Option<ElementId>;
    fn contributing_module(&self) -> Option<&TypeName>;
    /// Readable form used when listing declarations
    fn describe(&self) -> String;
}

impl BindingDeclaration for Binding {
    fn key(&self) -> &Key {
        &self.key
    }

    fn binding_element(&self) -> Option<ElementId> {
        self.binding_element
    }

    fn contributing_module(&self) -> Option<&TypeName> {
        self.contributing_module.as_ref()
    }

    fn describe(&self) -> String {
        Binding::describe(self)
    }
}

/// `@Binds abstract Foo bind(FooImpl impl)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DelegateDeclaration {
    pub key: Key,
    pub contributing_module: TypeName,
    pub element: ElementId,
    pub description: String,
    pub delegate_request: DependencyRequest,
    pub contribution_type: ContributionType,
    pub map_key: Option<Annotation>,
    pub scope: Option<Scope>,
}

impl BindingDeclaration for DelegateDeclaration {
    fn key(&self) -> &Key {
        &self.key
    }

    fn binding_element(&self) -> Option<ElementId> {
        Some(self.element)
    }

    fn contributing_module(&self) -> Option<&TypeName> {
        Some(&self.contributing_module)
    }

    fn describe(&self) -> String {
        format!("@Binds {} {}", self.key.ty(), self.description)
    }
}

/// `@Multibinds abstract Set<Foo> foos()`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultibindingDeclaration {
    pub key: Key,
    pub contributing_module: TypeName,
    pub element: ElementId,
    pub description: String,
    /// `Set` or `Map`
    pub contribution_type: ContributionType,
}

impl BindingDeclaration for MultibindingDeclaration {
    fn key(&self) -> &Key {
        &self.key
    }

    fn binding_element(&self) -> Option<ElementId> {
        Some(self.element)
    }

    fn contributing_module(&self) -> Option<&TypeName> {
        Some(&self.contributing_module)
    }

    fn describe(&self) -> String {
        format!("@Multibinds {} {}", self.key.ty(), self.description)
    }
}

/// `@BindsOptionalOf abstract Foo optionalFoo()`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionalBindingDeclaration {
    /// Key of the optional value, not of `Optional<T>`
    pub key: Key,
    pub contributing_module: TypeName,
    pub element: ElementId,
    pub description: String,
}

impl BindingDeclaration for OptionalBindingDeclaration {
    fn key(&self) -> &Key {
        &self.key
    }

    fn binding_element(&self) -> Option<ElementId> {
        Some(self.element)
    }

    fn contributing_module(&self) -> Option<&TypeName> {
        Some(&self.contributing_module)
    }

    fn describe(&self) -> String {
        format!("@BindsOptionalOf {} {}", self.key.ty(), self.description)
    }
}

/// A subcomponent listed in `@Module(subcomponents = ...)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubcomponentDeclaration {
    /// Key of the subcomponent's creator type
    pub key: Key,
    pub contributing_module: TypeName,
    pub subcomponent: TypeName,
    pub module_element: ElementId,
}

impl BindingDeclaration for SubcomponentDeclaration {
    fn key(&self) -> &Key {
        &self.key
    }

    fn binding_element(&self) -> Option<ElementId> {
        Some(self.module_element)
    }

    fn contributing_module(&self) -> Option<&TypeName> {
        Some(&self.contributing_module)
    }

    fn describe(&self) -> String {
        format!("@Module(subcomponents = {}) {}", self.subcomponent, self.contributing_module)
    }
}

/// Sorts declarations the way duplicate-binding messages list them
pub fn sorted_descriptions<'a>(declarations: impl IntoIterator<Item = &'a dyn BindingDeclaration>) -> Vec<String> {
    let mut described: Vec<(Option<String>, String)> = declarations
        .into_iter()
        .map(|d| (d.contributing_module().map(|m| m.to_string()), d.describe()))
        .collect();
    described.sort();
    described.dedup();
    described.into_iter().map(|(_, d)| d).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestKind;

    #[test]
    fn test_delegate_describe() {
        let decl = DelegateDeclaration {
            key: Key::named("test.Foo"),
            contributing_module: TypeName::new("test.Module"),
            element: ElementId(3),
            description: "test.Module.bind(test.FooImpl)".into(),
            delegate_request: DependencyRequest::new(RequestKind::Instance, Key::named("test.FooImpl")),
            contribution_type: ContributionType::Unique,
            map_key: None,
            scope: None,
        };
        assert_eq!(decl.describe(), "@Binds test.Foo test.Module.bind(test.FooImpl)");
        assert_eq!(decl.binding_element(), Some(ElementId(3)));
    }

    #[test]
    fn test_sorted_descriptions_dedups() {
        let a = MultibindingDeclaration {
            key: Key::named("java.util.Set"),
            contributing_module: TypeName::new("test.B"),
            element: ElementId(1),
            description: "test.B.set()".into(),
            contribution_type: ContributionType::Set,
        };
        let b = MultibindingDeclaration {
            contributing_module: TypeName::new("test.A"),
            description: "test.A.set()".into(),
            ..a.clone()
        };
        let sorted = sorted_descriptions([
            &a as &dyn BindingDeclaration,
            &b as &dyn BindingDeclaration,
            &a as &dyn BindingDeclaration,
        ]);
        assert_eq!(sorted.len(), 2);
        assert!(sorted[0].contains("test.A.set()"));
    }
}
