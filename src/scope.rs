//! Scope annotations
//!
//! A scope ties a binding's lifetime to a component. Scoped bindings are
//! created at most once per component instance; `@Reusable` may be cached
//! anywhere and carries no component association.

use crate::framework::names;
use crate::model::{Annotation, TypeName};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope {
    annotation: Annotation,
}

impl Scope {
    pub fn new(annotation: Annotation) -> Self {
        Self { annotation }
    }

    /// Scope from an annotation type name
    pub fn named(annotation_type: &str) -> Self {
        Self::new(Annotation::new(annotation_type))
    }

    pub fn singleton() -> Self {
        Self::named(names::SINGLETON)
    }

    pub fn reusable() -> Self {
        Self::named(names::REUSABLE)
    }

    pub fn production_scope() -> Self {
        Self::named(names::PRODUCTION_SCOPE)
    }

    #[inline]
    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    #[inline]
    pub fn annotation_type(&self) -> &TypeName {
        &self.annotation.annotation_type
    }

    pub fn is_reusable(&self) -> bool {
        self.annotation.is(names::REUSABLE)
    }

    pub fn is_singleton(&self) -> bool {
        self.annotation.is(names::SINGLETON)
    }

    pub fn is_production_scope(&self) -> bool {
        self.annotation.is(names::PRODUCTION_SCOPE)
    }

    /// `@Singleton`
    pub fn readable_source(&self) -> String {
        self.annotation.simple_form()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.readable_source())
    }
}

/// Renders a set of scopes the way diagnostics list them
pub fn readable_scopes(scopes: &[Scope]) -> String {
    scopes
        .iter()
        .map(Scope::readable_source)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_scopes() {
        assert!(Scope::singleton().is_singleton());
        assert!(Scope::reusable().is_reusable());
        assert!(Scope::production_scope().is_production_scope());
        assert!(!Scope::singleton().is_reusable());
    }

    #[test]
    fn test_readable_source() {
        assert_eq!(Scope::singleton().to_string(), "@Singleton");
        assert_eq!(
            readable_scopes(&[Scope::singleton(), Scope::named("test.ActivityScope")]),
            "@Singleton @ActivityScope"
        );
    }

    #[test]
    fn test_custom_scope_equality() {
        assert_eq!(Scope::named("test.PerRequest"), Scope::named("test.PerRequest"));
        assert_ne!(Scope::named("test.PerRequest"), Scope::singleton());
    }
}
