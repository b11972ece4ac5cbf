//! Modifiable binding methods of ahead-of-time subcomponents
//!
//! A subcomponent compiled before its ancestors cannot know every binding it
//! will see: an ancestor may contribute to a multibinding, bind an optional
//! key, or supply a key that is missing locally. Such requests are planned as
//! overridable methods and recorded here. A later compilation unit that sees
//! the complete graph overrides each record once and marks it finalized.

use crate::binding::{Binding, BindingKind};
use crate::error::{CodegenError, Result};
use crate::key::Key;
use crate::request::RequestKind;
use serde::{Deserialize, Serialize};

/// Why a request may still change in a descendant compilation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifiableBindingType {
    /// Not bound here; an ancestor is expected to supply it
    Missing,
    /// Absent here; an ancestor may bind the underlying key
    Optional,
    /// An ancestor may add contributions
    Multibinding,
    /// An ancestor may bind the key explicitly
    Injection,
    /// `@Binds` whose target is not yet bound
    BindsMethodWithMissingDependency,
}

impl ModifiableBindingType {
    /// How `binding` (or its absence) may change once ancestors are known
    pub fn of(binding: Option<&Binding>) -> Option<Self> {
        let Some(binding) = binding else {
            return Some(Self::Missing);
        };
        match binding.kind() {
            BindingKind::MultiboundSet | BindingKind::MultiboundMap => Some(Self::Multibinding),
            BindingKind::Optional => Some(Self::Optional),
            BindingKind::Injection => Some(Self::Injection),
            BindingKind::Delegate if binding.is_unresolved_delegate() => Some(Self::BindsMethodWithMissingDependency),
            _ => None,
        }
    }

    /// Whether the generated method has no implementation in this unit
    pub fn is_abstract(self) -> bool {
        matches!(self, Self::Missing | Self::BindsMethodWithMissingDependency)
    }
}

/// One overridable method and the request it satisfies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiableBindingMethod {
    pub key: Key,
    pub request_kind: RequestKind,
    pub method_name: String,
    pub modifiable_type: ModifiableBindingType,
    #[serde(default)]
    pub finalized: bool,
}

/// Every modifiable method of one subcomponent implementation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiableBindingMethods {
    methods: Vec<ModifiableBindingMethod>,
}

impl ModifiableBindingMethods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `method`, replacing an unfinalized record for the same request.
    ///
    /// Replacing a finalized record is an error.
    pub fn add(&mut self, method: ModifiableBindingMethod) -> Result<()> {
        match self.position(&method.key, method.request_kind) {
            Some(idx) if self.methods[idx].finalized => Err(CodegenError::internal(format!(
                "Modifiable binding method {} for {} was already finalized",
                self.methods[idx].method_name, method.key
            ))),
            Some(idx) => {
                self.methods[idx] = method;
                Ok(())
            }
            None => {
                self.methods.push(method);
                Ok(())
            }
        }
    }

    /// Marks the method for `key` and `kind` as overridden for the last time
    pub fn finalize(&mut self, key: &Key, kind: RequestKind) -> Result<()> {
        let Some(idx) = self.position(key, kind) else {
            return Err(CodegenError::internal(format!("No modifiable binding method for {}", key)));
        };
        let method = &mut self.methods[idx];
        if method.finalized {
            return Err(CodegenError::internal(format!(
                "Modifiable binding method {} for {} was already finalized",
                method.method_name, key
            )));
        }
        method.finalized = true;
        Ok(())
    }

    pub fn get(&self, key: &Key, kind: RequestKind) -> Option<&ModifiableBindingMethod> {
        self.position(key, kind).map(|idx| &self.methods[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModifiableBindingMethod> {
        self.methods.iter()
    }

    /// Records that a descendant still has to override
    pub fn unfinalized(&self) -> impl Iterator<Item = &ModifiableBindingMethod> {
        self.methods.iter().filter(|m| !m.finalized)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn position(&self, key: &Key, kind: RequestKind) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| &m.key == key && m.request_kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingType, BindingVariant};

    fn record(name: &str) -> ModifiableBindingMethod {
        ModifiableBindingMethod {
            key: Key::named("test.Foo"),
            request_kind: RequestKind::Instance,
            method_name: name.to_string(),
            modifiable_type: ModifiableBindingType::Missing,
            finalized: false,
        }
    }

    #[test]
    fn test_modifiable_type_of_binding() {
        assert_eq!(ModifiableBindingType::of(None), Some(ModifiableBindingType::Missing));
        let set = Binding::synthetic(Key::named("test.Foo"), BindingType::Provision, BindingVariant::MultiboundSet);
        assert_eq!(ModifiableBindingType::of(Some(&set)), Some(ModifiableBindingType::Multibinding));
        let component = Binding::synthetic(Key::named("test.App"), BindingType::Provision, BindingVariant::Component);
        assert_eq!(ModifiableBindingType::of(Some(&component)), None);
        assert!(ModifiableBindingType::Missing.is_abstract());
        assert!(!ModifiableBindingType::Multibinding.is_abstract());
    }

    #[test]
    fn test_finalized_method_is_never_modified_again() {
        let mut methods = ModifiableBindingMethods::new();
        methods.add(record("getFoo")).unwrap();
        methods.add(record("getFoo2")).unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods.get(&Key::named("test.Foo"), RequestKind::Instance).unwrap().method_name, "getFoo2");

        methods.finalize(&Key::named("test.Foo"), RequestKind::Instance).unwrap();
        assert_eq!(methods.unfinalized().count(), 0);
        assert!(methods.finalize(&Key::named("test.Foo"), RequestKind::Instance).is_err());
        assert!(methods.add(record("getFoo3")).is_err());
        assert!(methods.finalize(&Key::named("test.Bar"), RequestKind::Instance).is_err());
    }
}
