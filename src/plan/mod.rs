//! Code-shape planning
//!
//! A [`ComponentPlan`] is the skeleton of one generated component class:
//! its fields, its methods, and for every request the implementation must
//! satisfy, the [`CodeShape`] chosen to satisfy it. Plans are handed to an
//! external emitter; nothing here prints source text.
//!
//! Shapes are chosen per `(key, request kind)` in order of preference:
//!
//! 1. unscoped bindings are built inline at each use
//! 2. `@Reusable` bindings are memoized with a single check
//! 3. other scopes are memoized with a double check
//! 4. bindings with dependencies that are requested from several places, or
//!    that sit on a dependency cycle, get a private method
//! 5. requests an ahead-of-time subcomponent cannot finalize get a modifiable
//!    method (see [`ModifiableBindingMethods`])

mod modifiable;
mod planner;

pub use modifiable::*;
pub use planner::*;

use crate::binding::ContributionType;
use crate::component::RequirementKind;
use crate::framework::FrameworkType;
use crate::graph::ComponentPath;
use crate::key::Key;
use crate::model::{Annotation, TypeMirror, TypeName};
use crate::request::RequestKind;
use crate::scope::Scope;
use serde::{Deserialize, Serialize};

pub type FieldId = usize;
pub type MethodId = usize;
pub type ShapeId = usize;

/// A shape planned in some component of the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeRef {
    pub component: ComponentPath,
    pub shape: ShapeId,
}

/// A field planned in some component of the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub component: ComponentPath,
    pub field: FieldId,
}

/// How a cached instance is guarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Memoization {
    /// Null check only; duplicate computation under a race is tolerated
    SingleCheck,
    /// Synchronized re-check; computed at most once
    DoubleCheck,
}

impl Memoization {
    pub fn for_scope(scope: &Scope) -> Self {
        if scope.is_reusable() {
            Self::SingleCheck
        } else {
            Self::DoubleCheck
        }
    }
}

/// Adapts one shape to another request kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    /// `provider.get()`
    Get,
    /// `DoubleCheck.lazy(provider)`
    Lazy,
    /// `ProviderOfLazy.create(provider)`
    ProviderOfLazy,
    /// `Producers.producerFromProvider(provider)`
    ProducerFromProvider,
    /// `producer.get()`, the future of a production
    Future,
    /// `Futures.immediateFuture(instance)`
    ImmediateFuture,
    /// `Produced` wrapper around a producer's result
    Produced,
}

/// A value-producing expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expression", rename_all = "snake_case")]
pub enum Expression {
    /// `new T(args)` followed by member injection
    Construct {
        ty: TypeName,
        arguments: Vec<ShapeRef>,
        members: Vec<ShapeRef>,
    },
    /// `Module.method(args)` or `module.method(args)`
    ModuleMethod {
        module: TypeName,
        method: String,
        instance: Option<FieldRef>,
        arguments: Vec<ShapeRef>,
    },
    /// `dependency.method()`
    DependencyMethod { dependency: FieldRef, method: String },
    /// A field holding a component requirement
    Requirement { field: FieldRef },
    /// `this`
    ThisComponent,
    /// Whatever satisfies the delegate's target
    Delegate { target: ShapeRef },
    SetOf { contributions: Vec<(ContributionType, ShapeRef)> },
    MapOf { entries: Vec<(Option<Annotation>, ShapeRef)> },
    Present { value: ShapeRef },
    Absent,
    /// A new instance of a nested subcomponent creator
    ChildCreator { class_name: String },
    /// `injectT(instance)` over the given injection-site arguments
    InjectMembers { ty: TypeName, arguments: Vec<ShapeRef> },
    /// `T_MembersInjector.create(...)`
    MembersInjector { injector: TypeName, arguments: Vec<ShapeRef> },
    /// A generated factory's `create(...)`, optionally memoized
    Factory {
        factory: TypeName,
        arguments: Vec<ShapeRef>,
        memoization: Option<Memoization>,
    },
    /// `InstanceFactory.create(instance)`
    InstanceFactory { instance: ShapeRef },
    /// A provider that switches on `id` to call the instance expression
    SwitchingProvider { id: usize, instance: ShapeRef },
}

/// The chosen way of satisfying one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum CodeShape {
    Inline { expression: Expression },
    MemoizedField { field: FieldId, memoization: Memoization },
    PrivateMethod { method: MethodId },
    FrameworkField { field: FieldId },
    Derived { from: ShapeRef, conversion: Conversion },
    ModifiableMethod { method: MethodId },
}

/// A request and its planned shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestShape {
    pub key: Key,
    pub kind: RequestKind,
    pub shape: CodeShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Requirement(RequirementKind),
    MemoizedInstance(Memoization),
    FrameworkInstance {
        framework: FrameworkType,
        memoization: Option<Memoization>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPlan {
    pub name: String,
    pub ty: TypeMirror,
    pub kind: FieldKind,
    pub key: Option<Key>,
    /// Shape computing the initial or memoized value
    pub initializer: Option<ShapeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Implements an abstract method of the component type
    ComponentMethod,
    /// Returns a new child implementation
    ChildFactory { child: TypeName },
    /// Returns a new creator of a child implementation
    ChildCreator { child: TypeName },
    Private,
    /// Overridable in a descendant compilation unit
    Modifiable {
        modifiable_type: ModifiableBindingType,
        finalized: bool,
    },
    /// Kept for callers compiled against it; never reached
    Pruned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodBody {
    Returns(ShapeRef),
    NewChild { class_name: String },
    NewChildCreator { class_name: String },
    Abstract,
    Throws { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodPlan {
    pub name: String,
    pub kind: MethodKind,
    pub return_type: TypeMirror,
    pub parameters: Vec<TypeMirror>,
    pub body: MethodBody,
}

/// The skeleton of one generated component implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentPlan {
    pub path: ComponentPath,
    pub class_name: String,
    pub component: TypeName,
    /// Whether a descendant compilation unit completes this class
    pub is_abstract: bool,
    pub supertypes: Vec<TypeMirror>,
    pub creator_class: Option<String>,
    pub fields: Vec<FieldPlan>,
    pub methods: Vec<MethodPlan>,
    pub shapes: Vec<RequestShape>,
    pub children: Vec<ComponentPlan>,
    #[serde(default)]
    pub modifiable_methods: ModifiableBindingMethods,
}

impl ComponentPlan {
    pub fn shape(&self, id: ShapeId) -> Option<&RequestShape> {
        self.shapes.get(id)
    }

    /// The shape planned for `key` requested as `kind`, if any
    pub fn shape_for(&self, key: &Key, kind: RequestKind) -> Option<&RequestShape> {
        self.shapes.iter().find(|s| &s.key == key && s.kind == kind)
    }

    pub fn field(&self, name: &str) -> Option<&FieldPlan> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodPlan> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn child(&self, component: &TypeName) -> Option<&ComponentPlan> {
        self.children.iter().find(|c| &c.component == component)
    }

    /// This plan and all nested plans, parents first
    pub fn plans(&self) -> Vec<&ComponentPlan> {
        let mut plans = Vec::new();
        let mut stack = vec![self];
        while let Some(plan) = stack.pop() {
            plans.push(plan);
            stack.extend(plan.children.iter().rev());
        }
        plans
    }
}
