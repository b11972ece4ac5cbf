//! Binding keys
//!
//! A [`Key`] identifies what is being bound or requested: an optional
//! qualifier, a type, and for individual multibinding contributions an
//! identifier naming the contributing element. Keys compare structurally.

use crate::framework::{self, FrameworkType, MapType, OptionalType, SetType, names};
use crate::model::{Annotation, TypeMirror, TypeName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distinguishes one multibinding contribution from another with the same
/// qualifier and type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MultibindingContributionIdentifier {
    pub module: TypeName,
    pub binding_element: String,
}

impl fmt::Display for MultibindingContributionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.module, self.binding_element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    qualifier: Option<Annotation>,
    #[serde(rename = "type")]
    ty: TypeMirror,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    multibinding_contribution_identifier: Option<MultibindingContributionIdentifier>,
}

impl Key {
    /// An unqualified key; primitives are boxed
    pub fn of(ty: TypeMirror) -> Self {
        Self {
            qualifier: None,
            ty: ty.boxed(),
            multibinding_contribution_identifier: None,
        }
    }

    /// A key with an optional qualifier; primitives are boxed
    pub fn qualified(qualifier: Option<Annotation>, ty: TypeMirror) -> Self {
        Self {
            qualifier,
            ty: ty.boxed(),
            multibinding_contribution_identifier: None,
        }
    }

    /// Shorthand for an unqualified declared type
    pub fn named(name: &str) -> Self {
        Self::of(TypeMirror::named(name))
    }

    #[inline]
    pub fn ty(&self) -> &TypeMirror {
        &self.ty
    }

    #[inline]
    pub fn qualifier(&self) -> Option<&Annotation> {
        self.qualifier.as_ref()
    }

    #[inline]
    pub fn contribution_identifier(&self) -> Option<&MultibindingContributionIdentifier> {
        self.multibinding_contribution_identifier.as_ref()
    }

    pub fn with_type(&self, ty: TypeMirror) -> Self {
        Self {
            qualifier: self.qualifier.clone(),
            ty: ty.boxed(),
            multibinding_contribution_identifier: self.multibinding_contribution_identifier.clone(),
        }
    }

    pub fn with_qualifier(&self, qualifier: Option<Annotation>) -> Self {
        Self {
            qualifier,
            ty: self.ty.clone(),
            multibinding_contribution_identifier: self.multibinding_contribution_identifier.clone(),
        }
    }

    pub fn with_contribution_identifier(&self, id: MultibindingContributionIdentifier) -> Self {
        Self {
            qualifier: self.qualifier.clone(),
            ty: self.ty.clone(),
            multibinding_contribution_identifier: Some(id),
        }
    }

    /// The key of the multibinding this contribution belongs to
    pub fn without_contribution_identifier(&self) -> Self {
        Self {
            qualifier: self.qualifier.clone(),
            ty: self.ty.clone(),
            multibinding_contribution_identifier: None,
        }
    }

    // ========================================================================
    // Container rewrapping
    // ========================================================================

    /// `Optional<T>` -> `T`, keeping the qualifier
    pub fn unwrap_optional(&self) -> Option<Key> {
        OptionalType::from(&self.ty)
            .and_then(|o| o.value_type())
            .map(|value| self.with_type(value.clone()).without_contribution_identifier())
    }

    /// `Set<wrapper<T>>` -> `Set<T>`
    pub fn unwrap_set_key(&self, wrapper: &str) -> Option<Key> {
        SetType::from(&self.ty)
            .and_then(|s| s.unwrapped_element_type(wrapper))
            .map(|element| self.with_type(framework::set_of(element.clone())))
    }

    /// `Map<K, from<V>>` -> `Map<K, to<V>>`
    pub fn rewrap_map_key(&self, from: &str, to: &str) -> Option<Key> {
        let map = MapType::from(&self.ty)?;
        let key_type = map.key_type()?;
        let value = map.unwrapped_value_type(from)?;
        Some(self.with_type(framework::map_of(
            key_type.clone(),
            TypeMirror::declared(to, vec![value.clone()]),
        )))
    }

    /// `Map<K, V>` -> `Map<K, wrapper<V>>` when values are not already wrapped
    pub fn wrap_map_value(&self, framework: FrameworkType) -> Option<Key> {
        let map = MapType::from(&self.ty)?;
        if map.values_are_framework_type() {
            return None;
        }
        let key_type = map.key_type()?;
        let value = map.value_type()?;
        Some(self.with_type(framework::map_of(key_type.clone(), framework.wrap(value))))
    }

    /// `Map<K, Provider<V>>` or `Map<K, Producer<V>>` -> `Map<K, V>`;
    /// any other key is returned unchanged
    pub fn unwrap_map_value_type(&self) -> Key {
        let Some(map) = MapType::from(&self.ty) else {
            return self.clone();
        };
        if map.is_raw() {
            return self.clone();
        }
        let unwrapped = map
            .unwrapped_value_type(names::PROVIDER)
            .or_else(|| map.unwrapped_value_type(names::PRODUCER));
        match (map.key_type(), unwrapped) {
            (Some(k), Some(v)) => self.with_type(framework::map_of(k.clone(), v.clone())),
            _ => self.clone(),
        }
    }

    /// Keys a contribution may also be filed under when `self` is requested.
    ///
    /// `Set<Produced<T>>` matches `Set<T>`; a plain `Map<K, V>` matches the
    /// `Provider` and `Producer` flavors; `Map<K, Produced<V>>` matches
    /// `Map<K, Producer<V>>`; `Map<K, Producer<V>>` matches `Map<K, Provider<V>>`.
    pub fn implicit_matching_keys(&self) -> Vec<Key> {
        let mut keys = Vec::new();
        if let Some(set) = self.unwrap_set_key(names::PRODUCED) {
            keys.push(set);
        }
        if let Some(producer_map) = self.rewrap_map_key(names::PRODUCED, names::PRODUCER) {
            keys.push(producer_map);
        }
        if let Some(provider_map) = self.rewrap_map_key(names::PRODUCER, names::PROVIDER) {
            keys.push(provider_map);
        }
        if let Some(map) = MapType::from(&self.ty) {
            if !map.is_raw() && !map.values_are_framework_type() {
                if let Some(provider) = self.wrap_map_value(FrameworkType::Provider) {
                    keys.push(provider);
                }
                if let Some(producer) = self.wrap_map_value(FrameworkType::Producer) {
                    keys.push(producer);
                }
            }
        }
        keys
    }

    pub fn is_set(&self) -> bool {
        SetType::from(&self.ty).is_some()
    }

    pub fn is_map(&self) -> bool {
        MapType::from(&self.ty).is_some()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(qualifier) = &self.qualifier {
            write!(f, "{} ", qualifier)?;
        }
        write!(f, "{}", self.ty)?;
        if let Some(id) = &self.multibinding_contribution_identifier {
            write!(f, " [contribution {}]", id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrimitiveKind;

    fn foo() -> TypeMirror {
        TypeMirror::named("test.Foo")
    }

    fn string() -> TypeMirror {
        TypeMirror::named(names::STRING)
    }

    #[test]
    fn test_structural_equality() {
        let named = Annotation::new(names::NAMED).with_str("a");
        assert_eq!(Key::qualified(Some(named.clone()), foo()), Key::qualified(Some(named), foo()));
        assert_ne!(Key::of(foo()), Key::qualified(Some(Annotation::new(names::NAMED)), foo()));
    }

    #[test]
    fn test_primitives_are_boxed() {
        assert_eq!(
            Key::of(TypeMirror::primitive(PrimitiveKind::Int)),
            Key::named("java.lang.Integer")
        );
    }

    #[test]
    fn test_contribution_identifier_distinguishes_keys() {
        let key = Key::of(framework::set_of(foo()));
        let contribution = key.with_contribution_identifier(MultibindingContributionIdentifier {
            module: TypeName::new("test.Module"),
            binding_element: "provideFoo".into(),
        });
        assert_ne!(key, contribution);
        assert_eq!(contribution.without_contribution_identifier(), key);
    }

    #[test]
    fn test_unwrap_optional_keeps_qualifier() {
        let qualifier = Annotation::new(names::NAMED).with_str("x");
        let key = Key::qualified(
            Some(qualifier.clone()),
            TypeMirror::declared(names::OPTIONAL, vec![foo()]),
        );
        assert_eq!(key.unwrap_optional(), Some(Key::qualified(Some(qualifier), foo())));
        assert_eq!(Key::of(foo()).unwrap_optional(), None);
    }

    #[test]
    fn test_map_rewrapping() {
        let plain = Key::of(framework::map_of(string(), foo()));
        let providers = Key::of(framework::map_of(string(), FrameworkType::Provider.wrap(&foo())));
        assert_eq!(providers.unwrap_map_value_type(), plain);
        assert_eq!(plain.unwrap_map_value_type(), plain);
        assert_eq!(plain.wrap_map_value(FrameworkType::Provider), Some(providers.clone()));
        assert_eq!(providers.wrap_map_value(FrameworkType::Provider), None);
    }

    #[test]
    fn test_implicit_matching_keys() {
        let plain = Key::of(framework::map_of(string(), foo()));
        let matching = plain.implicit_matching_keys();
        assert_eq!(matching.len(), 2);
        assert!(matching.contains(&Key::of(framework::map_of(string(), FrameworkType::Provider.wrap(&foo())))));
        assert!(matching.contains(&Key::of(framework::map_of(string(), FrameworkType::Producer.wrap(&foo())))));

        let produced_set = Key::of(framework::set_of(TypeMirror::declared(names::PRODUCED, vec![foo()])));
        assert_eq!(produced_set.implicit_matching_keys(), vec![Key::of(framework::set_of(foo()))]);
    }

    #[test]
    fn test_display() {
        let key = Key::qualified(Some(Annotation::new(names::NAMED).with_str("a")), foo());
        assert_eq!(key.to_string(), "@javax.inject.Named(\"a\") test.Foo");
    }
}
