//! Protocol representation of resolved values
//!
//! Keys, requests, bindings and the modifiable binding methods of
//! ahead-of-time subcomponents are persisted between rounds and compilation
//! units as JSON. Decoding a value that was encoded by this crate always
//! yields a value equal to the original.

use crate::binding::Binding;
use crate::error::{CodegenError, Result};
use crate::graph::ComponentPath;
use crate::key::Key;
use crate::plan::{ComponentPlan, ModifiableBindingMethods};
use crate::request::DependencyRequest;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A value with a persisted JSON form
pub trait Protocol: Serialize + DeserializeOwned {
    /// Name used in error messages
    const NAME: &'static str;

    fn to_protocol(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| failure::<Self>(e))
    }

    fn to_protocol_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| failure::<Self>(e))
    }

    fn from_protocol(encoded: &str) -> Result<Self> {
        serde_json::from_str(encoded).map_err(|e| failure::<Self>(e))
    }

    fn from_protocol_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| failure::<Self>(e))
    }
}

fn failure<T: Protocol>(err: serde_json::Error) -> CodegenError {
    CodegenError::Serialization {
        what: T::NAME,
        reason: err.to_string(),
    }
}

impl Protocol for Key {
    const NAME: &'static str = "key";
}

impl Protocol for DependencyRequest {
    const NAME: &'static str = "dependency request";
}

impl Protocol for Binding {
    const NAME: &'static str = "binding";
}

impl Protocol for ComponentPlan {
    const NAME: &'static str = "component plan";
}

/// The modifiable binding methods one subcomponent implementation left for
/// descendant compilation units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedModifiableMethods {
    pub component: ComponentPath,
    pub methods: ModifiableBindingMethods,
}

impl Protocol for PersistedModifiableMethods {
    const NAME: &'static str = "modifiable binding methods";
}

impl ComponentPlan {
    /// A record for every implementation in this plan that has modifiable
    /// methods
    pub fn persisted_modifiable_methods(&self) -> Vec<PersistedModifiableMethods> {
        self.plans()
            .into_iter()
            .filter(|plan| !plan.modifiable_methods.is_empty())
            .map(|plan| PersistedModifiableMethods {
                component: plan.path.clone(),
                methods: plan.modifiable_methods.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingType, BindingVariant, ContributionType};
    use crate::component::ComponentDescriptorFactory;
    use crate::context::RoundContext;
    use crate::framework::{self, names};
    use crate::graph::BindingGraphFactory;
    use crate::key::MultibindingContributionIdentifier;
    use crate::model::{Annotation, MethodSpec, Modifier, ProgramBuilder, TypeMirror, TypeName};
    use crate::options::CompilerOptions;
    use crate::plan::{ComponentPlanner, ModifiableBindingMethod, ModifiableBindingType};
    use crate::request::RequestKind;
    use crate::scope::Scope;

    #[test]
    fn test_qualified_key_round_trip() {
        let key = Key::qualified(
            Some(Annotation::new("javax.inject.Named").with_str("primary")),
            TypeMirror::declared("java.util.List", vec![TypeMirror::named(names::STRING)]),
        );
        let decoded = Key::from_protocol(&key.to_protocol().unwrap()).unwrap();
        assert_eq!(decoded, key);

        let contribution = Key::named("test.Foo").with_contribution_identifier(MultibindingContributionIdentifier {
            module: TypeName::new("test.M"),
            binding_element: "foo".to_string(),
        });
        let value = contribution.to_protocol_value().unwrap();
        assert_eq!(Key::from_protocol_value(value).unwrap(), contribution);
    }

    #[test]
    fn test_request_round_trip() {
        let request = DependencyRequest::new(RequestKind::ProviderOfLazy, Key::named("test.Foo"));
        assert_eq!(
            DependencyRequest::from_protocol(&request.to_protocol().unwrap()).unwrap(),
            request
        );
    }

    #[test]
    fn test_resolved_bindings_round_trip() {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.Bar", &[]);
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(
                MethodSpec::new("foo")
                    .modifier(Modifier::Static)
                    .annotate(Annotation::new(names::PROVIDES))
                    .annotate(Annotation::new(names::SINGLETON))
                    .param("bar", TypeMirror::named("test.Bar"))
                    .returns(TypeMirror::named("test.Foo")),
            )
            .method(
                MethodSpec::new("name")
                    .modifier(Modifier::Static)
                    .annotate(Annotation::new(names::PROVIDES))
                    .annotate(Annotation::new(names::INTO_SET))
                    .returns(TypeMirror::named(names::STRING)),
            )
            .finish();
        b.interface("test.App")
            .annotate(Annotation::new(names::SINGLETON))
            .annotate(Annotation::new(names::COMPONENT).with_types("modules", vec![TypeMirror::named("test.M")]))
            .method(MethodSpec::new("foo").returns(TypeMirror::named("test.Foo")))
            .method(MethodSpec::new("names").returns(framework::set_of(TypeMirror::named(names::STRING))))
            .finish();
        let program = b.build();
        let options = CompilerOptions::default();
        let mut ctx = RoundContext::new(&program, options);
        let component = ComponentDescriptorFactory::new(&mut ctx)
            .root_component(&TypeName::new("test.App"))
            .unwrap();
        let graph = BindingGraphFactory::new(&mut ctx).create(component, false).unwrap();

        let bindings = graph.owned_bindings();
        assert!(bindings.len() >= 4);
        for binding in bindings {
            let decoded = Binding::from_protocol(&binding.to_protocol().unwrap()).unwrap();
            assert_eq!(&decoded, binding.as_ref());
        }
    }

    #[test]
    fn test_synthetic_binding_round_trip() {
        let mut binding = Binding::synthetic(
            Key::named("test.Foo"),
            BindingType::Provision,
            BindingVariant::Delegate {
                delegate_key: Key::named("test.FooImpl"),
                unresolved: false,
            },
        );
        binding.scope = Some(Scope::reusable());
        binding.contribution_type = ContributionType::Unique;
        let decoded = Binding::from_protocol(&binding.to_protocol().unwrap()).unwrap();
        assert_eq!(decoded, binding);
    }

    #[test]
    fn test_decode_failure_names_the_value() {
        let err = Key::from_protocol("{\"not\": \"a key\"}").unwrap_err();
        match err {
            CodegenError::Serialization { what, .. } => assert_eq!(what, "key"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_persisted_modifiable_methods() {
        let mut methods = ModifiableBindingMethods::new();
        methods
            .add(ModifiableBindingMethod {
                key: Key::of(framework::set_of(TypeMirror::named(names::STRING))),
                request_kind: RequestKind::Instance,
                method_name: "getSetOfString".to_string(),
                modifiable_type: ModifiableBindingType::Multibinding,
                finalized: false,
            })
            .unwrap();
        let record = PersistedModifiableMethods {
            component: ComponentPath::root(TypeName::new("test.App")).child(TypeName::new("test.Child")),
            methods,
        };
        let encoded = record.to_protocol().unwrap();
        assert!(encoded.contains("\"test.App\",\"test.Child\""));
        assert!(encoded.contains("\"modifiable_type\":\"multibinding\""));
        assert_eq!(PersistedModifiableMethods::from_protocol(&encoded).unwrap(), record);

        // Records written before finalization existed decode as unfinalized
        let legacy = encoded.replace(",\"finalized\":false", "");
        let decoded = PersistedModifiableMethods::from_protocol(&legacy).unwrap();
        assert!(decoded.methods.iter().all(|m| !m.finalized));
    }

    #[test]
    fn test_plan_round_trip() {
        let mut b = ProgramBuilder::new();
        b.inject_class("test.A", &[]);
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT))
            .method(MethodSpec::new("a").returns(TypeMirror::named("test.A")))
            .method(
                MethodSpec::new("aProvider")
                    .returns(TypeMirror::declared(names::PROVIDER, vec![TypeMirror::named("test.A")])),
            )
            .finish();
        let program = b.build();
        let options = CompilerOptions::default();
        let mut ctx = RoundContext::new(&program, options.clone());
        let component = ComponentDescriptorFactory::new(&mut ctx)
            .root_component(&TypeName::new("test.App"))
            .unwrap();
        let graph = BindingGraphFactory::new(&mut ctx).create(component, false).unwrap();
        let plan = ComponentPlanner::new(&graph, &options).plan().unwrap();

        let decoded = ComponentPlan::from_protocol(&plan.to_protocol().unwrap()).unwrap();
        assert_eq!(decoded, plan);
        assert!(plan.persisted_modifiable_methods().is_empty());
    }
}
