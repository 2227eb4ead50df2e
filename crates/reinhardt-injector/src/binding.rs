//! Immutable binding records

use crate::instance::{Instance, Provider};
use crate::key::{Key, TypeLiteral};
use crate::scope::Scope;
use crate::selector::InjectionPoint;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Where a binding (or type descriptor) was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
	Code { file: &'static str, line: u32 },
	BuiltIn,
	JustInTime,
}

impl Source {
	/// The location of the caller of the enclosing `#[track_caller]` function.
	#[track_caller]
	pub fn caller() -> Self {
		let location = Location::caller();
		Self::Code {
			file: location.file(),
			line: location.line(),
		}
	}

	pub fn is_code(&self) -> bool {
		matches!(self, Self::Code { .. })
	}
}

impl fmt::Display for Source {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Code { file, line } => write!(f, "{}:{}", file, line),
			Self::BuiltIn => f.write_str("[built-in]"),
			Self::JustInTime => f.write_str("[just-in-time]"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOrigin {
	/// Declared by a module.
	Explicit,
	/// Synthesized from the type's own constructor on first lookup.
	JustInTime,
	/// Provided by every injector (`Injector`, `Stage`).
	BuiltIn,
}

/// A resolved constructor strategy: the concrete type, its selected
/// constructor and its member injection points.
#[derive(Clone)]
pub struct ConstructorBinding {
	pub(crate) type_literal: TypeLiteral,
	pub(crate) constructor: InjectionPoint,
	pub(crate) members: Vec<InjectionPoint>,
}

impl ConstructorBinding {
	pub fn type_literal(&self) -> &TypeLiteral {
		&self.type_literal
	}

	pub fn constructor(&self) -> &InjectionPoint {
		&self.constructor
	}

	pub fn members(&self) -> &[InjectionPoint] {
		&self.members
	}
}

/// How a binding produces its instance.
#[derive(Clone)]
pub enum BindingStrategy {
	Instance(Instance),
	ProviderInstance(Arc<dyn Provider>),
	ProviderKey(Key),
	Linked(Key),
	Constructor(ConstructorBinding),
}

impl BindingStrategy {
	fn label(&self) -> &'static str {
		match self {
			Self::Instance(_) => "instance",
			Self::ProviderInstance(_) => "provider instance",
			Self::ProviderKey(_) => "provider key",
			Self::Linked(_) => "linked key",
			Self::Constructor(_) => "constructor",
		}
	}
}

impl fmt::Debug for BindingStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ProviderKey(key) | Self::Linked(key) => {
				write!(f, "{}({})", self.label(), key)
			}
			Self::Constructor(c) => write!(f, "constructor({})", c.type_literal),
			_ => f.write_str(self.label()),
		}
	}
}

/// A key's registered construction strategy and scope.
#[derive(Clone)]
pub struct Binding {
	key: Key,
	strategy: BindingStrategy,
	scope: Scope,
	source: Source,
	origin: BindingOrigin,
}

impl Binding {
	pub(crate) fn new(
		key: Key,
		strategy: BindingStrategy,
		scope: Scope,
		source: Source,
		origin: BindingOrigin,
	) -> Self {
		// Instance bindings are singletons whatever the declaration says.
		let scope = match &strategy {
			BindingStrategy::Instance(_) => Scope::Singleton,
			_ => scope,
		};
		Self {
			key,
			strategy,
			scope,
			source,
			origin,
		}
	}

	pub fn key(&self) -> &Key {
		&self.key
	}

	pub fn strategy(&self) -> &BindingStrategy {
		&self.strategy
	}

	pub fn scope(&self) -> &Scope {
		&self.scope
	}

	pub fn source(&self) -> Source {
		self.source
	}

	pub fn origin(&self) -> BindingOrigin {
		self.origin
	}

	/// Keys this binding needs, each with a human-readable requirement site.
	pub fn dependencies(&self) -> Vec<(Key, String)> {
		match &self.strategy {
			BindingStrategy::Instance(_) | BindingStrategy::ProviderInstance(_) => Vec::new(),
			BindingStrategy::Linked(target) => {
				vec![(target.clone(), format!("link from {}", self.key))]
			}
			BindingStrategy::ProviderKey(provider) => {
				vec![(provider.clone(), format!("provider of {}", self.key))]
			}
			BindingStrategy::Constructor(c) => std::iter::once(&c.constructor)
				.chain(c.members.iter())
				.flat_map(InjectionPoint::dependency_sites)
				.collect(),
		}
	}
}

impl fmt::Debug for Binding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Binding")
			.field("key", &self.key.to_string())
			.field("strategy", &self.strategy)
			.field("scope", &self.scope)
			.field("source", &self.source)
			.field("origin", &self.origin)
			.finish()
	}
}
