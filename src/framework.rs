//! Well-known framework types and container type helpers

use crate::model::TypeMirror;
use serde::{Deserialize, Serialize};

/// Qualified names of types and annotations the processor understands
pub mod names {
    // Framework wrapper types
    pub const PROVIDER: &str = "javax.inject.Provider";
    pub const LAZY: &str = "dagger.Lazy";
    pub const MEMBERS_INJECTOR: &str = "dagger.MembersInjector";
    pub const PRODUCER: &str = "dagger.producers.Producer";
    pub const PRODUCED: &str = "dagger.producers.Produced";
    pub const LISTENABLE_FUTURE: &str = "com.google.common.util.concurrent.ListenableFuture";

    // Containers
    pub const SET: &str = "java.util.Set";
    pub const MAP: &str = "java.util.Map";
    pub const OPTIONAL: &str = "java.util.Optional";
    pub const GUAVA_OPTIONAL: &str = "com.google.common.base.Optional";

    // Language types
    pub const OBJECT: &str = "java.lang.Object";
    pub const STRING: &str = "java.lang.String";
    pub const CLASS: &str = "java.lang.Class";
    pub const EXCEPTION: &str = "java.lang.Exception";
    pub const RUNTIME_EXCEPTION: &str = "java.lang.RuntimeException";
    pub const EXECUTOR: &str = "java.util.concurrent.Executor";

    // Meta annotations
    pub const INJECT: &str = "javax.inject.Inject";
    pub const QUALIFIER: &str = "javax.inject.Qualifier";
    pub const SCOPE: &str = "javax.inject.Scope";
    pub const NAMED: &str = "javax.inject.Named";
    pub const SINGLETON: &str = "javax.inject.Singleton";
    pub const REUSABLE: &str = "dagger.Reusable";
    pub const PRODUCTION_SCOPE: &str = "dagger.producers.ProductionScope";
    pub const MAP_KEY: &str = "dagger.MapKey";

    // Binding method annotations
    pub const PROVIDES: &str = "dagger.Provides";
    pub const PRODUCES: &str = "dagger.producers.Produces";
    pub const BINDS: &str = "dagger.Binds";
    pub const MULTIBINDS: &str = "dagger.multibindings.Multibinds";
    pub const BINDS_OPTIONAL_OF: &str = "dagger.BindsOptionalOf";
    pub const BINDS_INSTANCE: &str = "dagger.BindsInstance";
    pub const INTO_SET: &str = "dagger.multibindings.IntoSet";
    pub const ELEMENTS_INTO_SET: &str = "dagger.multibindings.ElementsIntoSet";
    pub const INTO_MAP: &str = "dagger.multibindings.IntoMap";

    // Standard map keys
    pub const STRING_KEY: &str = "dagger.multibindings.StringKey";
    pub const INT_KEY: &str = "dagger.multibindings.IntKey";
    pub const LONG_KEY: &str = "dagger.multibindings.LongKey";
    pub const CLASS_KEY: &str = "dagger.multibindings.ClassKey";

    // Modules and components
    pub const MODULE: &str = "dagger.Module";
    pub const PRODUCER_MODULE: &str = "dagger.producers.ProducerModule";
    pub const COMPONENT: &str = "dagger.Component";
    pub const SUBCOMPONENT: &str = "dagger.Subcomponent";
    pub const PRODUCTION_COMPONENT: &str = "dagger.producers.ProductionComponent";
    pub const PRODUCTION_SUBCOMPONENT: &str = "dagger.producers.ProductionSubcomponent";
    pub const COMPONENT_BUILDER: &str = "dagger.Component.Builder";
    pub const COMPONENT_FACTORY: &str = "dagger.Component.Factory";
    pub const SUBCOMPONENT_BUILDER: &str = "dagger.Subcomponent.Builder";
    pub const SUBCOMPONENT_FACTORY: &str = "dagger.Subcomponent.Factory";
    pub const PRODUCTION_COMPONENT_BUILDER: &str = "dagger.producers.ProductionComponent.Builder";
    pub const PRODUCTION_COMPONENT_FACTORY: &str = "dagger.producers.ProductionComponent.Factory";
    pub const PRODUCTION_SUBCOMPONENT_BUILDER: &str = "dagger.producers.ProductionSubcomponent.Builder";
    pub const PRODUCTION_SUBCOMPONENT_FACTORY: &str = "dagger.producers.ProductionSubcomponent.Factory";

    // Production internals
    pub const PRODUCTION: &str = "dagger.producers.Production";
    pub const PRODUCTION_IMPLEMENTATION: &str = "dagger.producers.internal.ProductionImplementation";
    pub const PRODUCTION_EXECUTOR_MODULE: &str = "dagger.producers.internal.ProductionExecutorModule";

    /// Simple name matched for nullability annotations from any package
    pub const NULLABLE_SIMPLE_NAME: &str = "Nullable";
}

/// Framework types that bindings may be exposed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkType {
    Provider,
    Producer,
}

impl FrameworkType {
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Provider => names::PROVIDER,
            Self::Producer => names::PRODUCER,
        }
    }

    /// Wraps `ty` in this framework type
    pub fn wrap(self, ty: &TypeMirror) -> TypeMirror {
        TypeMirror::declared(self.class_name(), vec![ty.clone()])
    }
}

/// Whether `ty` is one of the wrapper types that never name a key directly
pub fn is_framework_type(ty: &TypeMirror) -> bool {
    [
        names::PROVIDER,
        names::LAZY,
        names::MEMBERS_INJECTOR,
        names::PRODUCER,
        names::PRODUCED,
    ]
    .iter()
    .any(|n| ty.is_type_of(n))
}

/// A `Set<T>` view of a type
#[derive(Debug, Clone, Copy)]
pub struct SetType<'a> {
    ty: &'a TypeMirror,
}

impl<'a> SetType<'a> {
    pub fn from(ty: &'a TypeMirror) -> Option<Self> {
        ty.is_type_of(names::SET).then_some(Self { ty })
    }

    pub fn is_raw(&self) -> bool {
        self.ty.is_raw()
    }

    pub fn element_type(&self) -> Option<&'a TypeMirror> {
        self.ty.only_type_arg()
    }

    /// Whether the element type is `wrapper<...>`
    pub fn elements_are_type_of(&self, wrapper: &str) -> bool {
        self.element_type().is_some_and(|t| t.is_type_of(wrapper))
    }

    /// `Set<Produced<T>>` -> `T`
    pub fn unwrapped_element_type(&self, wrapper: &str) -> Option<&'a TypeMirror> {
        self.element_type()
            .filter(|t| t.is_type_of(wrapper))
            .and_then(TypeMirror::only_type_arg)
    }
}

/// A `Map<K, V>` view of a type
#[derive(Debug, Clone, Copy)]
pub struct MapType<'a> {
    ty: &'a TypeMirror,
}

impl<'a> MapType<'a> {
    pub fn from(ty: &'a TypeMirror) -> Option<Self> {
        ty.is_type_of(names::MAP).then_some(Self { ty })
    }

    pub fn is_raw(&self) -> bool {
        self.ty.is_raw()
    }

    pub fn key_type(&self) -> Option<&'a TypeMirror> {
        self.ty.type_args().first()
    }

    pub fn value_type(&self) -> Option<&'a TypeMirror> {
        self.ty.type_args().get(1)
    }

    pub fn values_are_type_of(&self, wrapper: &str) -> bool {
        self.value_type().is_some_and(|v| v.is_type_of(wrapper))
    }

    pub fn values_are_framework_type(&self) -> bool {
        self.value_type().is_some_and(is_framework_type)
    }

    /// `Map<K, Provider<V>>` -> `V`
    pub fn unwrapped_value_type(&self, wrapper: &str) -> Option<&'a TypeMirror> {
        self.value_type()
            .filter(|v| v.is_type_of(wrapper))
            .and_then(TypeMirror::only_type_arg)
    }
}

/// An `Optional<T>` view of a type, for either optional flavor
#[derive(Debug, Clone, Copy)]
pub struct OptionalType<'a> {
    ty: &'a TypeMirror,
}

impl<'a> OptionalType<'a> {
    pub fn from(ty: &'a TypeMirror) -> Option<Self> {
        (ty.is_type_of(names::OPTIONAL) || ty.is_type_of(names::GUAVA_OPTIONAL)).then_some(Self { ty })
    }

    pub fn value_type(&self) -> Option<&'a TypeMirror> {
        self.ty.only_type_arg()
    }
}

/// `Map<K, V>`
pub fn map_of(key: TypeMirror, value: TypeMirror) -> TypeMirror {
    TypeMirror::declared(names::MAP, vec![key, value])
}

/// `Set<T>`
pub fn set_of(element: TypeMirror) -> TypeMirror {
    TypeMirror::declared(names::SET, vec![element])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_type_views() {
        let ty = map_of(
            TypeMirror::named(names::STRING),
            FrameworkType::Provider.wrap(&TypeMirror::named("test.Foo")),
        );
        let map = MapType::from(&ty).unwrap();
        assert!(map.values_are_framework_type());
        assert!(map.values_are_type_of(names::PROVIDER));
        assert_eq!(map.unwrapped_value_type(names::PROVIDER), Some(&TypeMirror::named("test.Foo")));
        assert!(MapType::from(&TypeMirror::named("test.Foo")).is_none());
    }

    #[test]
    fn test_set_type_views() {
        let ty = set_of(TypeMirror::declared(names::PRODUCED, vec![TypeMirror::named("test.Foo")]));
        let set = SetType::from(&ty).unwrap();
        assert!(set.elements_are_type_of(names::PRODUCED));
        assert_eq!(set.unwrapped_element_type(names::PRODUCED), Some(&TypeMirror::named("test.Foo")));
    }

    #[test]
    fn test_optional_flavors() {
        let java = TypeMirror::declared(names::OPTIONAL, vec![TypeMirror::named("test.Foo")]);
        let guava = TypeMirror::declared(names::GUAVA_OPTIONAL, vec![TypeMirror::named("test.Foo")]);
        assert!(OptionalType::from(&java).is_some());
        assert!(OptionalType::from(&guava).is_some());
    }
}
