//! # Reinhardt Injector
//!
//! Binding-based dependency injection for Reinhardt.
//!
//! ## Features
//!
//! - **Declarative**: Modules bind keys to instances, providers, other keys or constructors
//! - **Just-in-time**: Concrete types are constructed without any declaration
//! - **Scoped**: No scope, singleton, eager singleton and custom scopes
//! - **Cycle-tolerant**: Field and method cycles are wired through proxies
//! - **Diagnosable**: All configuration errors are reported together, with "Did you mean?" hints
//!
//! The injector knows nothing about Rust types by itself. Type metadata
//! (constructors, member injection points, scope annotations) comes from an
//! [`InjectionPointCatalog`], and instances travel as type-erased [`Instance`]s.
//!
//! ## Example
//!
//! ```rust
//! use reinhardt_injector::{
//!     Binder, ConstructorDecl, Injector, Instance, Key, Parameter, Scope, StaticCatalog,
//!     TypeDescriptor,
//! };
//!
//! struct Engine;
//! struct Car {
//!     engine: std::sync::Arc<Engine>,
//! }
//!
//! let catalog = StaticCatalog::new()
//!     .with(
//!         TypeDescriptor::concrete("Engine")
//!             .scoped(Scope::Singleton)
//!             .constructor(ConstructorDecl::new(|_| Ok(Instance::new(Engine)))),
//!     )
//!     .with(
//!         TypeDescriptor::concrete("Car").constructor(
//!             ConstructorDecl::new(|args| {
//!                 let engine = args[0]
//!                     .downcast::<Engine>()
//!                     .ok_or_else(|| anyhow::anyhow!("expected an Engine"))?;
//!                 Ok(Instance::new(Car { engine }))
//!             })
//!             .annotated()
//!             .param(Parameter::of("Engine")),
//!         ),
//!     )
//!     .with(TypeDescriptor::abstract_type("Vehicle"));
//!
//! let injector = Injector::builder()
//!     .catalog(catalog)
//!     .module(|binder: &mut Binder| {
//!         binder.bind(Key::of("Vehicle")).to(Key::of("Car"));
//!     })
//!     .build()
//!     .unwrap();
//!
//! let first = injector.get::<Car>(&Key::of("Vehicle")).unwrap();
//! let second = injector.get::<Car>(&Key::of("Vehicle")).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&first.engine, &second.engine));
//! ```
//!
//! ## Error reports
//!
//! Configuration problems are collected across a whole pass:
//!
//! ```rust
//! use reinhardt_injector::{Binder, ErrorPhase, Injector, Key};
//!
//! let report = Injector::builder()
//!     .module(|binder: &mut Binder| {
//!         binder.bind(Key::of("Collection")).to(Key::of("List"));
//!     })
//!     .build()
//!     .unwrap_err();
//!
//! assert_eq!(report.phase(), ErrorPhase::Creation);
//! assert!(report.to_string().contains("No implementation for List was bound."));
//! ```

pub mod binding;
pub mod catalog;
pub mod config;
mod cycle_detection;
pub mod error;
mod graph;
pub mod hooks;
pub mod injector;
pub mod instance;
pub mod key;
pub mod module;
pub mod registry;
pub mod scope;
pub mod selector;
mod suggestions;

pub use binding::{Binding, BindingOrigin, BindingStrategy, ConstructorBinding, Source};
pub use catalog::{
	ConstructFn, ConstructorDecl, InjectFn, InjectionPointCatalog, MemberDecl, MemberKind,
	Parameter, StaticCatalog, TypeDescriptor, TypeKind, Visibility,
};
pub use config::{ConfigError, DEFAULT_MAX_SUGGESTIONS, InjectorConfig, Stage};
pub use error::{DiError, DiResult, ErrorPhase, ErrorReport, Errors};
pub use hooks::{ConstructionHook, NoopHook};
pub use injector::{BoundProvider, INJECTOR_TYPE, Injector, InjectorBuilder, STAGE_TYPE};
pub use instance::{Instance, Provider};
pub use key::{Key, Qualifier, TypeLiteral};
pub use module::{Binder, BindingBuilder, ConstructorRef, Declaration, Element, Module, Target};
pub use registry::{BindingRegistry, RegistrySnapshot};
pub use scope::{CustomScope, Scope, ScopeManager, SimpleScope};
pub use selector::{ConstructorSelector, InjectionPoint, Member};
