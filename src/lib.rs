//! # Dependency Injector Codegen - Compile-Time Binding Graphs
//!
//! Resolves, validates and plans the code of Dagger-style dependency
//! injection components at build time. The annotated program is read
//! through a [`ProgramModel`](model::ProgramModel); the output is a set of
//! [`Diagnostic`]s and, for every component that validated cleanly, a
//! [`ComponentPlan`](plan::ComponentPlan) describing the class an emitter
//! should print.
//!
//! ## Features
//!
//! - **Keys and requests** - structural keys, every request kind from
//!   `Provider<T>` to `Produced<T>` and members injection
//! - **Binding collection** - `@Inject` constructors, `@Provides`,
//!   `@Produces`, `@Binds`, multibindings, optional bindings and component
//!   dependencies
//! - **Hierarchical resolution** - subcomponents inherit, shadow and
//!   re-resolve bindings exactly once per key
//! - **Validation plugins** - cycles, duplicates, missing bindings, scopes,
//!   map keys, nullability and more, all reported in one pass
//! - **Code-shape planning** - inline, memoized, private-method or
//!   modifiable shapes per request
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use dependency_injector_codegen::prelude::*;
//! use dependency_injector_codegen::framework::names;
//! use dependency_injector_codegen::model::{Annotation, MethodSpec, ProgramBuilder, TypeMirror};
//!
//! let mut b = ProgramBuilder::new();
//! b.inject_class("app.Database", &[]);
//! b.inject_class("app.UserService", &[TypeMirror::named("app.Database")]);
//! b.interface("app.AppComponent")
//!     .annotate(Annotation::new(names::COMPONENT))
//!     .method(MethodSpec::new("users").returns(TypeMirror::named("app.UserService")))
//!     .finish();
//! let program = b.build();
//!
//! let mut processor = ComponentProcessor::new(&program, CompilerOptions::default());
//! let output = processor.process_round(&[TypeName::new("app.AppComponent")]).unwrap();
//!
//! assert!(!output.has_errors());
//! assert_eq!(output.plans[0].class_name, "DaggerAppComponent");
//! ```
//!
//! ## Validation
//!
//! ```rust
//! use dependency_injector_codegen::prelude::*;
//! use dependency_injector_codegen::framework::names;
//! use dependency_injector_codegen::model::{Annotation, MethodSpec, ProgramBuilder, TypeMirror};
//!
//! let mut b = ProgramBuilder::new();
//! b.interface("app.Clock").finish();
//! b.interface("app.AppComponent")
//!     .annotate(Annotation::new(names::COMPONENT))
//!     .method(MethodSpec::new("clock").returns(TypeMirror::named("app.Clock")))
//!     .finish();
//! let program = b.build();
//!
//! let mut processor = ComponentProcessor::new(&program, CompilerOptions::default());
//! let output = processor.process_round(&[TypeName::new("app.AppComponent")]).unwrap();
//!
//! // Nothing binds app.Clock, so no plan is produced
//! assert!(output.has_errors());
//! assert!(output.plans.is_empty());
//! ```
//!
//! ## Rounds
//!
//! Elements referring to types that are generated later are deferred and
//! retried by the next [`ComponentProcessor::process_round`]. Every cache
//! keyed by program elements is dropped at the end of a round.

pub mod binding;
pub mod component;
pub mod context;
mod diagnostics;
mod error;
pub mod framework;
pub mod graph;
pub mod injection;
mod key;
#[cfg(feature = "logging")]
pub mod logging;
pub mod model;
mod options;
pub mod plan;
mod processor;
mod request;
mod scope;
pub mod serialization;
pub mod validation;

pub use diagnostics::*;
pub use error::*;
pub use key::*;
pub use options::*;
pub use processor::*;
pub use request::*;
pub use scope::*;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::binding::{Binding, BindingKind};
    pub use crate::graph::{BindingGraph, BindingGraphFactory, ComponentPath};
    pub use crate::model::{InMemoryProgram, ProgramModel, TypeName};
    pub use crate::plan::{ComponentPlan, ComponentPlanner};
    pub use crate::serialization::Protocol;
    pub use crate::validation::BindingGraphValidator;
    pub use crate::{
        CodegenError, CompilerOptions, ComponentProcessor, DependencyRequest, Diagnostic, Key, RequestKind, Result,
        RoundOutput, Scope, Severity,
    };
}
