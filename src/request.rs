//! Dependency requests and request kinds

use crate::error::{CodegenError, Result};
use crate::framework::{FrameworkType, is_framework_type, names};
use crate::injection::InjectionAnnotations;
use crate::key::Key;
use crate::model::{Annotation, ElementId, ExecutableElement, TypeMirror, VariableElement};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a dependency is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// `T`
    Instance,
    /// `Provider<T>`
    Provider,
    /// `Lazy<T>`
    Lazy,
    /// `Provider<Lazy<T>>`
    ProviderOfLazy,
    /// `void inject(T)` or `T inject(T)`
    MembersInjection,
    /// `Producer<T>`
    Producer,
    /// `Produced<T>`
    Produced,
    /// `ListenableFuture<T>` from a production entry point
    Future,
}

impl RequestKind {
    /// Kinds whose value is obtained lazily, so the request can close a cycle
    pub fn breaks_cycles(self) -> bool {
        matches!(self, Self::Provider | Self::Lazy | Self::ProviderOfLazy)
    }

    /// Kinds that may be satisfied by a production binding
    pub fn can_be_satisfied_by_production(self) -> bool {
        matches!(self, Self::Producer | Self::Produced | Self::Future)
    }

    /// The framework instance this kind is derived from
    pub fn framework_type(self) -> Option<FrameworkType> {
        match self {
            Self::Provider | Self::Lazy | Self::ProviderOfLazy => Some(FrameworkType::Provider),
            Self::Producer | Self::Produced => Some(FrameworkType::Producer),
            _ => None,
        }
    }

    /// The requested type for a key type, e.g. `Lazy<Foo>`
    pub fn request_type(self, key_type: &TypeMirror) -> TypeMirror {
        let wrap = |name: &str, ty: TypeMirror| TypeMirror::declared(name, vec![ty]);
        match self {
            Self::Instance | Self::MembersInjection => key_type.clone(),
            Self::Provider => wrap(names::PROVIDER, key_type.clone()),
            Self::Lazy => wrap(names::LAZY, key_type.clone()),
            Self::ProviderOfLazy => wrap(names::PROVIDER, wrap(names::LAZY, key_type.clone())),
            Self::Producer => wrap(names::PRODUCER, key_type.clone()),
            Self::Produced => wrap(names::PRODUCED, key_type.clone()),
            Self::Future => wrap(names::LISTENABLE_FUTURE, key_type.clone()),
        }
    }

    /// Suffix used when naming generated members for this kind
    pub fn name_suffix(self) -> &'static str {
        match self {
            Self::Instance => "",
            Self::Provider => "Provider",
            Self::Lazy => "Lazy",
            Self::ProviderOfLazy => "ProviderOfLazy",
            Self::MembersInjection => "MembersInjection",
            Self::Producer => "Producer",
            Self::Produced => "Produced",
            Self::Future => "Future",
        }
    }
}

/// The kind implied by the outermost wrapper of a requested type
pub fn request_kind_of(ty: &TypeMirror) -> RequestKind {
    if ty.is_raw() {
        return RequestKind::Instance;
    }
    if ty.is_type_of(names::PROVIDER) {
        if ty.only_type_arg().is_some_and(|arg| arg.is_type_of(names::LAZY)) {
            return RequestKind::ProviderOfLazy;
        }
        return RequestKind::Provider;
    }
    if ty.is_type_of(names::LAZY) {
        return RequestKind::Lazy;
    }
    if ty.is_type_of(names::PRODUCER) {
        return RequestKind::Producer;
    }
    if ty.is_type_of(names::PRODUCED) {
        return RequestKind::Produced;
    }
    RequestKind::Instance
}

/// The key type once the request kind's wrappers are removed
pub fn extract_key_type(kind: RequestKind, ty: &TypeMirror) -> Option<TypeMirror> {
    match kind {
        RequestKind::Instance | RequestKind::MembersInjection => Some(ty.clone()),
        RequestKind::ProviderOfLazy => ty.only_type_arg().and_then(TypeMirror::only_type_arg).cloned(),
        _ => ty.only_type_arg().cloned(),
    }
}

/// Classifies a requested type into its kind and key type, rejecting
/// unsupported shapes
pub fn classify(ty: &TypeMirror) -> Result<(RequestKind, TypeMirror)> {
    if is_framework_type(ty) && ty.is_raw() && !ty.is_type_of(names::MEMBERS_INJECTOR) {
        return Err(CodegenError::invalid_request(ty, "framework types must be parameterized"));
    }
    let kind = request_kind_of(ty);
    let key_type = extract_key_type(kind, ty)
        .ok_or_else(|| CodegenError::invalid_request(ty, "framework types must be parameterized"))?;
    if key_type.is_wildcard() {
        return Err(CodegenError::invalid_request(ty, "wildcard types may not be requested"));
    }
    if kind != RequestKind::Instance && is_framework_type(&key_type) && !key_type.is_type_of(names::MEMBERS_INJECTOR) {
        return Err(CodegenError::invalid_request(ty, "framework types may not be nested"));
    }
    if key_type.is_void() {
        return Err(CodegenError::invalid_request(ty, "void may not be requested"));
    }
    Ok((kind, key_type))
}

/// A request for a key, made by an injection site, component method or a
/// synthetic binding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyRequest {
    pub kind: RequestKind,
    pub key: Key,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_element: Option<ElementId>,
    #[serde(default)]
    pub is_nullable: bool,
}

impl DependencyRequest {
    /// A synthetic request with no source element
    pub fn new(kind: RequestKind, key: Key) -> Self {
        Self {
            kind,
            key,
            request_element: None,
            is_nullable: false,
        }
    }

    /// A request from a constructor/method parameter or field whose type has
    /// already been resolved against the enclosing type
    pub fn for_variable(
        injection: &InjectionAnnotations<'_>,
        variable: &VariableElement,
        resolved_type: &TypeMirror,
    ) -> Result<Self> {
        let (kind, key_type) = classify(resolved_type)?;
        Ok(Self {
            kind,
            key: Key::qualified(injection.qualifier(&variable.annotations), key_type),
            request_element: Some(variable.id),
            is_nullable: injection.is_nullable(&variable.annotations),
        })
    }

    /// A request made by a component provision or production method
    pub fn for_component_method(
        injection: &InjectionAnnotations<'_>,
        method: &ExecutableElement,
        return_type: &TypeMirror,
        production: bool,
    ) -> Result<Self> {
        let (kind, key_type) = if production && return_type.is_type_of(names::LISTENABLE_FUTURE) {
            let value = return_type
                .only_type_arg()
                .ok_or_else(|| CodegenError::invalid_request(return_type, "futures must be parameterized"))?;
            (RequestKind::Future, value.clone())
        } else {
            classify(return_type)?
        };
        Ok(Self {
            kind,
            key: Key::qualified(injection.qualifier(&method.annotations), key_type),
            request_element: Some(method.id),
            is_nullable: injection.is_nullable(&method.annotations),
        })
    }

    /// A members-injection request for `ty`
    pub fn for_members_injection(ty: &TypeMirror, element: Option<ElementId>) -> Self {
        Self {
            kind: RequestKind::MembersInjection,
            key: Key::of(ty.clone()),
            request_element: element,
            is_nullable: false,
        }
    }

    /// The executor that production components run producers on
    pub fn for_production_implementation_executor() -> Self {
        Self::new(RequestKind::Provider, production_implementation_executor_key())
    }

    pub fn with_element(mut self, element: ElementId) -> Self {
        self.request_element = Some(element);
        self
    }

    /// The type as written at the request site
    pub fn requested_type(&self) -> TypeMirror {
        self.kind.request_type(self.key.ty())
    }
}

/// `@ProductionImplementation Executor`
pub fn production_implementation_executor_key() -> Key {
    Key::qualified(
        Some(Annotation::new(names::PRODUCTION_IMPLEMENTATION)),
        TypeMirror::named(names::EXECUTOR),
    )
}

/// `@Production Executor`, the executor users bind
pub fn production_executor_key() -> Key {
    Key::qualified(
        Some(Annotation::new(names::PRODUCTION)),
        TypeMirror::named(names::EXECUTOR),
    )
}

impl fmt::Display for DependencyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(qualifier) = self.key.qualifier() {
            write!(f, "{} ", qualifier)?;
        }
        write!(f, "{}", self.requested_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo() -> TypeMirror {
        TypeMirror::named("test.Foo")
    }

    fn wrap(name: &str, ty: TypeMirror) -> TypeMirror {
        TypeMirror::declared(name, vec![ty])
    }

    #[test]
    fn test_classify_kinds() {
        assert_eq!(classify(&foo()).unwrap(), (RequestKind::Instance, foo()));
        assert_eq!(classify(&wrap(names::PROVIDER, foo())).unwrap(), (RequestKind::Provider, foo()));
        assert_eq!(classify(&wrap(names::LAZY, foo())).unwrap(), (RequestKind::Lazy, foo()));
        assert_eq!(
            classify(&wrap(names::PROVIDER, wrap(names::LAZY, foo()))).unwrap(),
            (RequestKind::ProviderOfLazy, foo())
        );
        assert_eq!(classify(&wrap(names::PRODUCER, foo())).unwrap(), (RequestKind::Producer, foo()));
        assert_eq!(classify(&wrap(names::PRODUCED, foo())).unwrap(), (RequestKind::Produced, foo()));
    }

    #[test]
    fn test_members_injector_is_a_key() {
        let injector = wrap(names::MEMBERS_INJECTOR, foo());
        assert_eq!(classify(&injector).unwrap(), (RequestKind::Instance, injector.clone()));
        assert_eq!(
            classify(&wrap(names::PROVIDER, injector.clone())).unwrap(),
            (RequestKind::Provider, injector)
        );
    }

    #[test]
    fn test_classify_rejects_invalid_shapes() {
        assert!(classify(&TypeMirror::named(names::PROVIDER)).is_err());
        assert!(classify(&wrap(names::LAZY, wrap(names::PROVIDER, foo()))).is_err());
        assert!(classify(&wrap(names::PRODUCER, wrap(names::LAZY, foo()))).is_err());
        assert!(classify(&wrap(names::PROVIDER, TypeMirror::wildcard())).is_err());
    }

    #[test]
    fn test_request_type_round_trips_kind() {
        for kind in [
            RequestKind::Instance,
            RequestKind::Provider,
            RequestKind::Lazy,
            RequestKind::ProviderOfLazy,
            RequestKind::Producer,
            RequestKind::Produced,
        ] {
            let requested = kind.request_type(&foo());
            assert_eq!(request_kind_of(&requested), kind);
            assert_eq!(extract_key_type(kind, &requested), Some(foo()));
        }
    }

    #[test]
    fn test_breaks_cycles() {
        assert!(RequestKind::Provider.breaks_cycles());
        assert!(RequestKind::Lazy.breaks_cycles());
        assert!(RequestKind::ProviderOfLazy.breaks_cycles());
        assert!(!RequestKind::Instance.breaks_cycles());
        assert!(!RequestKind::Producer.breaks_cycles());
    }
}
