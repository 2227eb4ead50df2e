//! Modules and the binding DSL
//!
//! A [`Module`] contributes binding declarations through a [`Binder`]. The
//! binder only records what was declared and where; validation happens when
//! the injector is built.
//!
//! ```
//! use reinhardt_injector::{Binder, Instance, Key, Scope};
//!
//! let configure = |binder: &mut Binder| {
//!     binder.bind(Key::of("Collection")).to(Key::of("ArrayList"));
//!     binder
//!         .bind(Key::named("String", "greeting"))
//!         .to_instance(Instance::new(String::from("hello")));
//!     binder.bind(Key::of("Cache")).in_scope(Scope::Singleton);
//! };
//! ```

use crate::binding::Source;
use crate::instance::{Instance, Provider};
use crate::key::{Key, TypeLiteral};
use crate::scope::Scope;
use std::fmt;
use std::sync::Arc;

/// A unit of binding configuration.
pub trait Module {
	fn configure(&self, binder: &mut Binder);
}

impl<F> Module for F
where
	F: Fn(&mut Binder),
{
	fn configure(&self, binder: &mut Binder) {
		self(binder)
	}
}

/// Designates the constructor of a `to_constructor` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorRef {
	/// The constructor at `index` in the declaring type's descriptor.
	Declared { declaring: Arc<str>, index: usize },
	/// Whatever constructor the declaring type would be injected through.
	Injectable(Arc<str>),
}

impl ConstructorRef {
	pub fn at(declaring: impl Into<Arc<str>>, index: usize) -> Self {
		Self::Declared {
			declaring: declaring.into(),
			index,
		}
	}

	pub fn injectable(declaring: impl Into<Arc<str>>) -> Self {
		Self::Injectable(declaring.into())
	}

	pub fn declaring(&self) -> &str {
		match self {
			Self::Declared { declaring, .. } | Self::Injectable(declaring) => declaring,
		}
	}
}

/// What a declared key is bound to.
#[derive(Clone)]
pub enum Target {
	/// Constructed from the key's own type.
	Untargetted,
	Instance(Instance),
	ProviderInstance(Arc<dyn Provider>),
	/// Delegates to the provider bound at another key.
	ProviderKey(Key),
	Linked(Key),
	Constructor {
		constructor: ConstructorRef,
		/// Concrete type arguments for a generic declaring type.
		type_literal: Option<TypeLiteral>,
	},
}

impl fmt::Debug for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Untargetted => f.write_str("Untargetted"),
			Self::Instance(instance) => write!(f, "Instance({:?})", instance),
			Self::ProviderInstance(_) => f.write_str("ProviderInstance"),
			Self::ProviderKey(key) => write!(f, "ProviderKey({})", key),
			Self::Linked(key) => write!(f, "Linked({})", key),
			Self::Constructor {
				constructor,
				type_literal,
			} => f
				.debug_struct("Constructor")
				.field("constructor", constructor)
				.field("type_literal", type_literal)
				.finish(),
		}
	}
}

/// One `bind(...)` statement.
#[derive(Debug, Clone)]
pub struct Declaration {
	pub key: Key,
	pub target: Target,
	/// Explicit scope; `None` falls back to the type's own annotation.
	pub scope: Option<Scope>,
	pub source: Source,
}

impl Declaration {
	#[track_caller]
	pub fn new(key: impl Into<Key>, target: Target) -> Self {
		Self {
			key: key.into(),
			target,
			scope: None,
			source: Source::caller(),
		}
	}

	pub fn in_scope(mut self, scope: Scope) -> Self {
		self.scope = Some(scope);
		self
	}
}

#[derive(Debug, Clone)]
pub enum Element {
	Binding(Declaration),
	/// The key must be resolvable when the injector is built.
	RequireKey { key: Key, source: Source },
}

/// Collects the elements declared by modules, in declaration order.
#[derive(Debug, Default)]
pub struct Binder {
	elements: Vec<Element>,
}

impl Binder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts a declaration for `key`. Without a target the key is
	/// constructed from its own type.
	#[track_caller]
	pub fn bind(&mut self, key: impl Into<Key>) -> BindingBuilder<'_> {
		let declaration = Declaration {
			key: key.into(),
			target: Target::Untargetted,
			scope: None,
			source: Source::caller(),
		};
		self.elements.push(Element::Binding(declaration));
		let index = self.elements.len() - 1;
		BindingBuilder {
			binder: self,
			index,
		}
	}

	/// Fails injector creation unless `key` can be resolved.
	#[track_caller]
	pub fn require_binding(&mut self, key: impl Into<Key>) {
		self.elements.push(Element::RequireKey {
			key: key.into(),
			source: Source::caller(),
		});
	}

	pub fn add_declaration(&mut self, declaration: Declaration) {
		self.elements.push(Element::Binding(declaration));
	}

	pub fn install(&mut self, module: &dyn Module) {
		module.configure(self);
	}

	pub fn elements(&self) -> &[Element] {
		&self.elements
	}

	pub(crate) fn into_elements(self) -> Vec<Element> {
		self.elements
	}
}

/// Refines the declaration started by [`Binder::bind`].
pub struct BindingBuilder<'a> {
	binder: &'a mut Binder,
	index: usize,
}

impl BindingBuilder<'_> {
	fn declaration(&mut self) -> Option<&mut Declaration> {
		match self.binder.elements.get_mut(self.index) {
			Some(Element::Binding(declaration)) => Some(declaration),
			_ => None,
		}
	}

	fn target(mut self, target: Target) -> Self {
		if let Some(declaration) = self.declaration() {
			declaration.target = target;
		}
		self
	}

	pub fn to(self, target: impl Into<Key>) -> Self {
		self.target(Target::Linked(target.into()))
	}

	pub fn to_instance(self, instance: Instance) -> Self {
		self.target(Target::Instance(instance))
	}

	pub fn to_provider<P: Provider + 'static>(self, provider: P) -> Self {
		self.target(Target::ProviderInstance(Arc::new(provider)))
	}

	pub fn to_provider_key(self, provider: impl Into<Key>) -> Self {
		self.target(Target::ProviderKey(provider.into()))
	}

	pub fn to_constructor(self, constructor: ConstructorRef) -> Self {
		self.target(Target::Constructor {
			constructor,
			type_literal: None,
		})
	}

	/// Binds to `constructor` with the declaring type's variables taken from
	/// `type_literal`.
	pub fn to_constructor_of(self, constructor: ConstructorRef, type_literal: TypeLiteral) -> Self {
		self.target(Target::Constructor {
			constructor,
			type_literal: Some(type_literal),
		})
	}

	pub fn in_scope(mut self, scope: Scope) {
		if let Some(declaration) = self.declaration() {
			declaration.scope = Some(scope);
		}
	}

	pub fn as_eager_singleton(self) {
		self.in_scope(Scope::EagerSingleton)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn declarations(binder: &Binder) -> Vec<&Declaration> {
		binder
			.elements()
			.iter()
			.filter_map(|e| match e {
				Element::Binding(d) => Some(d),
				Element::RequireKey { .. } => None,
			})
			.collect()
	}

	#[rstest]
	fn test_builder_refines_last_declaration() {
		// Arrange
		let mut binder = Binder::new();

		// Act
		binder
			.bind(Key::of("Object"))
			.to(Key::of("Runnable"))
			.in_scope(Scope::Singleton);
		binder.bind(Key::of("Bar"));

		// Assert
		let declared = declarations(&binder);
		assert_eq!(declared.len(), 2);
		assert!(matches!(&declared[0].target, Target::Linked(k) if *k == Key::of("Runnable")));
		assert_eq!(declared[0].scope, Some(Scope::Singleton));
		assert!(matches!(declared[1].target, Target::Untargetted));
		assert_eq!(declared[1].scope, None);
	}

	#[rstest]
	fn test_declarations_record_call_site() {
		// Arrange
		let mut binder = Binder::new();

		// Act
		binder.bind(Key::of("Bar"));
		binder.require_binding(Key::of("Baz"));

		// Assert
		let sources: Vec<Source> = binder
			.elements()
			.iter()
			.map(|e| match e {
				Element::Binding(d) => d.source,
				Element::RequireKey { source, .. } => *source,
			})
			.collect();
		assert!(sources.iter().all(|s| match s {
			Source::Code { file, .. } => file.ends_with("module.rs"),
			_ => false,
		}));
	}

	#[rstest]
	fn test_closures_are_modules() {
		// Arrange
		let module = |binder: &mut Binder| {
			binder.bind(Key::of("Integer")).as_eager_singleton();
		};
		let mut binder = Binder::new();

		// Act
		binder.install(&module);

		// Assert
		let declared = declarations(&binder);
		assert_eq!(declared[0].scope, Some(Scope::EagerSingleton));
	}
}
