//! Bindings and binding declarations
//!
//! A [`Binding`] is one way to satisfy a [`Key`]. The shared record carries
//! what every binding has (key, contribution type, dependencies, scope,
//! originating element); the kind-specific payload lives in
//! [`BindingVariant`], so callers dispatch with a `match` instead of
//! downcasting.

mod declaration;
mod factory;
mod module;
mod registry;
mod validation;

pub use declaration::*;
pub use factory::*;
pub use module::*;
pub use registry::*;
pub use validation::*;

use crate::framework::names;
use crate::key::Key;
use crate::model::{Annotation, ElementId, TypeName};
use crate::request::DependencyRequest;
use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shared handle to an interned binding
pub type BindingRef = Arc<Binding>;

/// How a binding contributes to its key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionType {
    Unique,
    /// `@IntoSet`
    Set,
    /// `@ElementsIntoSet`
    SetValues,
    /// `@IntoMap`
    Map,
}

impl ContributionType {
    #[inline]
    pub fn is_multibinding(self) -> bool {
        self != Self::Unique
    }

    /// Derives the contribution type from a binding method's annotations
    pub fn from_annotations(annotations: &[Annotation]) -> Self {
        if annotations.iter().any(|a| a.is(names::INTO_MAP)) {
            Self::Map
        } else if annotations.iter().any(|a| a.is(names::INTO_SET)) {
            Self::Set
        } else if annotations.iter().any(|a| a.is(names::ELEMENTS_INTO_SET)) {
            Self::SetValues
        } else {
            Self::Unique
        }
    }
}

/// Whether a binding provides synchronously, produces asynchronously, or
/// injects members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingType {
    Provision,
    Production,
    MembersInjection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Injection,
    Provision,
    Production,
    Delegate,
    MembersInjection,
    MembersInjector,
    MultiboundSet,
    MultiboundMap,
    Optional,
    Component,
    ComponentDependency,
    ComponentProvision,
    ComponentProduction,
    BoundInstance,
    SubcomponentCreator,
}

impl BindingKind {
    pub fn is_multibinding(self) -> bool {
        matches!(self, Self::MultiboundSet | Self::MultiboundMap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionSiteKind {
    Field,
    Method,
}

/// An `@Inject` field or method on a members-injected type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InjectionSite {
    pub kind: InjectionSiteKind,
    pub element: ElementId,
    pub name: String,
    pub enclosing: TypeName,
    pub dependencies: Vec<DependencyRequest>,
}

/// Kind-specific binding payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindingVariant {
    Injection {
        constructor: ElementId,
        injection_sites: Vec<InjectionSite>,
    },
    Provision {
        method: ElementId,
        method_name: String,
        requires_module_instance: bool,
    },
    Production {
        method: ElementId,
        method_name: String,
        requires_module_instance: bool,
        returns_future: bool,
    },
    Delegate {
        delegate_key: Key,
        /// The delegate's target could not be resolved (missing or cyclic)
        unresolved: bool,
    },
    MembersInjection {
        injection_sites: Vec<InjectionSite>,
    },
    MembersInjector {
        members_key: Key,
    },
    MultiboundSet,
    MultiboundMap,
    OptionalPresent {
        underlying: Key,
    },
    OptionalAbsent,
    Component,
    ComponentDependency {
        dependency: TypeName,
    },
    ComponentProvision {
        dependency: TypeName,
        method_name: String,
    },
    ComponentProduction {
        dependency: TypeName,
        method_name: String,
    },
    BoundInstance {
        parameter_name: String,
    },
    SubcomponentCreator {
        subcomponent: TypeName,
    },
}

/// A resolved binding for one key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub key: Key,
    pub binding_type: BindingType,
    pub contribution_type: ContributionType,
    pub dependencies: Vec<DependencyRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_element: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributing_module: Option<TypeName>,
    /// The type whose constructor or members this binding uses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_type_element: Option<TypeName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_key: Option<Annotation>,
    #[serde(default)]
    pub nullable: bool,
    /// The generic template this binding was substituted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<Box<Binding>>,
    pub variant: BindingVariant,
}

impl Binding {
    /// A binding with no element, scope, or dependencies
    pub fn synthetic(key: Key, binding_type: BindingType, variant: BindingVariant) -> Self {
        Self {
            key,
            binding_type,
            contribution_type: ContributionType::Unique,
            dependencies: Vec::new(),
            scope: None,
            binding_element: None,
            element_description: None,
            contributing_module: None,
            binding_type_element: None,
            map_key: None,
            nullable: false,
            unresolved: None,
            variant,
        }
    }

    pub fn kind(&self) -> BindingKind {
        match &self.variant {
            BindingVariant::Injection { .. } => BindingKind::Injection,
            BindingVariant::Provision { .. } => BindingKind::Provision,
            BindingVariant::Production { .. } => BindingKind::Production,
            BindingVariant::Delegate { .. } => BindingKind::Delegate,
            BindingVariant::MembersInjection { .. } => BindingKind::MembersInjection,
            BindingVariant::MembersInjector { .. } => BindingKind::MembersInjector,
            BindingVariant::MultiboundSet => BindingKind::MultiboundSet,
            BindingVariant::MultiboundMap => BindingKind::MultiboundMap,
            BindingVariant::OptionalPresent { .. } | BindingVariant::OptionalAbsent => BindingKind::Optional,
            BindingVariant::Component => BindingKind::Component,
            BindingVariant::ComponentDependency { .. } => BindingKind::ComponentDependency,
            BindingVariant::ComponentProvision { .. } => BindingKind::ComponentProvision,
            BindingVariant::ComponentProduction { .. } => BindingKind::ComponentProduction,
            BindingVariant::BoundInstance { .. } => BindingKind::BoundInstance,
            BindingVariant::SubcomponentCreator { .. } => BindingKind::SubcomponentCreator,
        }
    }

    #[inline]
    pub fn is_production(&self) -> bool {
        self.binding_type == BindingType::Production
    }

    #[inline]
    pub fn is_multibinding_contribution(&self) -> bool {
        self.contribution_type.is_multibinding()
    }

    /// A module method that needs an instance of its module
    pub fn requires_module_instance(&self) -> bool {
        matches!(
            self.variant,
            BindingVariant::Provision {
                requires_module_instance: true,
                ..
            } | BindingVariant::Production {
                requires_module_instance: true,
                ..
            }
        )
    }

    /// Delegate binding whose target could not be resolved
    pub fn is_unresolved_delegate(&self) -> bool {
        matches!(self.variant, BindingVariant::Delegate { unresolved: true, .. })
    }

    /// Synthetic bindings are created by the resolver rather than declared
    pub fn is_synthetic(&self) -> bool {
        self.binding_element.is_none()
    }

    /// Bindings declared in a module (or component/creator) rather than
    /// discovered just in time
    pub fn is_explicit(&self) -> bool {
        self.contributing_module.is_some()
            || matches!(
                self.kind(),
                BindingKind::Component
                    | BindingKind::ComponentDependency
                    | BindingKind::ComponentProvision
                    | BindingKind::ComponentProduction
                    | BindingKind::BoundInstance
            )
    }

    /// Readable declaration, e.g. `@Provides test.Foo test.Module.provideFoo()`
    pub fn describe(&self) -> String {
        let element = self
            .element_description
            .clone()
            .unwrap_or_else(|| self.key.to_string());
        match self.kind() {
            BindingKind::Injection => format!("@Inject {}", element),
            BindingKind::Provision => format!("@Provides {} {}", self.key.ty(), element),
            BindingKind::Production => format!("@Produces {} {}", self.key.ty(), element),
            BindingKind::Delegate => format!("@Binds {} {}", self.key.ty(), element),
            BindingKind::BoundInstance => format!("@BindsInstance {}", element),
            BindingKind::MultiboundSet | BindingKind::MultiboundMap => {
                format!("multibinding {}", self.key)
            }
            BindingKind::Optional => format!("optional binding {}", self.key),
            BindingKind::ComponentProvision | BindingKind::ComponentProduction => {
                format!("{} {}", self.key.ty(), element)
            }
            _ => element,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
