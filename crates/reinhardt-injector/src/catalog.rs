//! Static type metadata consumed by the injector
//!
//! The injector never inspects Rust types itself. Everything it needs to know
//! about a type (its constructors, member injection points, whether it can be
//! instantiated at all) is supplied by an [`InjectionPointCatalog`].
//!
//! ```
//! use reinhardt_injector::{ConstructorDecl, Instance, Parameter, StaticCatalog, TypeDescriptor};
//!
//! struct Greeter(String);
//!
//! let mut catalog = StaticCatalog::new();
//! catalog.register(
//!     TypeDescriptor::concrete("Greeter").constructor(
//!         ConstructorDecl::new(|args| {
//!             let name = args[0].downcast_ref::<String>().cloned().unwrap_or_default();
//!             Ok(Instance::new(Greeter(name)))
//!         })
//!         .annotated()
//!         .param(Parameter::named("String", "greeting")),
//!     ),
//! );
//! ```

use crate::binding::Source;
use crate::instance::Instance;
use crate::key::{Key, Qualifier, TypeLiteral};
use crate::scope::Scope;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Invokes a constructor with its resolved arguments, in parameter order.
pub type ConstructFn = Arc<dyn Fn(&[Instance]) -> anyhow::Result<Instance> + Send + Sync>;

/// Populates a field or calls a method on an already constructed instance.
pub type InjectFn = Arc<dyn Fn(&Instance, &[Instance]) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
	Public,
	Protected,
	Package,
	Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
	/// Instantiable through one of its constructors.
	Concrete,
	/// Interface or abstract type; needs an explicit binding.
	Abstract,
}

/// One declared dependency of an injection point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
	pub type_literal: TypeLiteral,
	pub qualifier: Option<Qualifier>,
}

impl Parameter {
	pub fn of(type_literal: impl Into<TypeLiteral>) -> Self {
		Self {
			type_literal: type_literal.into(),
			qualifier: None,
		}
	}

	pub fn named(raw_type: &str, name: &str) -> Self {
		Self {
			type_literal: TypeLiteral::class(raw_type),
			qualifier: Some(Qualifier::named(name)),
		}
	}

	pub fn qualified(type_literal: impl Into<TypeLiteral>, qualifier: Qualifier) -> Self {
		Self {
			type_literal: type_literal.into(),
			qualifier: Some(qualifier),
		}
	}

	pub(crate) fn key_with(&self, bindings: &HashMap<Arc<str>, TypeLiteral>) -> Key {
		Key::new(self.type_literal.substitute(bindings), self.qualifier.clone())
	}
}

/// A declared constructor.
#[derive(Clone)]
pub struct ConstructorDecl {
	pub annotated: bool,
	pub visibility: Visibility,
	pub parameters: Vec<Parameter>,
	pub construct: ConstructFn,
}

impl ConstructorDecl {
	/// A public, non-annotated constructor.
	pub fn new<F>(construct: F) -> Self
	where
		F: Fn(&[Instance]) -> anyhow::Result<Instance> + Send + Sync + 'static,
	{
		Self {
			annotated: false,
			visibility: Visibility::Public,
			parameters: Vec::new(),
			construct: Arc::new(construct),
		}
	}

	/// Marks this constructor as the designated injection constructor.
	pub fn annotated(mut self) -> Self {
		self.annotated = true;
		self
	}

	pub fn visibility(mut self, visibility: Visibility) -> Self {
		self.visibility = visibility;
		self
	}

	pub fn param(mut self, parameter: Parameter) -> Self {
		self.parameters.push(parameter);
		self
	}

	pub fn is_no_arg(&self) -> bool {
		self.parameters.is_empty()
	}
}

impl fmt::Debug for ConstructorDecl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConstructorDecl")
			.field("annotated", &self.annotated)
			.field("visibility", &self.visibility)
			.field("parameters", &self.parameters)
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
	Field,
	Method,
}

/// A declared field or method injection point.
#[derive(Clone)]
pub struct MemberDecl {
	pub kind: MemberKind,
	pub name: Arc<str>,
	pub parameters: Vec<Parameter>,
	pub inject: InjectFn,
}

impl MemberDecl {
	/// A field receiving a single dependency.
	pub fn field<F>(name: impl Into<Arc<str>>, parameter: Parameter, inject: F) -> Self
	where
		F: Fn(&Instance, &Instance) -> anyhow::Result<()> + Send + Sync + 'static,
	{
		Self {
			kind: MemberKind::Field,
			name: name.into(),
			parameters: vec![parameter],
			inject: Arc::new(move |target, args| inject(target, &args[0])),
		}
	}

	/// A method receiving its parameters in order.
	pub fn method<F>(name: impl Into<Arc<str>>, parameters: Vec<Parameter>, inject: F) -> Self
	where
		F: Fn(&Instance, &[Instance]) -> anyhow::Result<()> + Send + Sync + 'static,
	{
		Self {
			kind: MemberKind::Method,
			name: name.into(),
			parameters,
			inject: Arc::new(inject),
		}
	}
}

impl fmt::Debug for MemberDecl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemberDecl")
			.field("kind", &self.kind)
			.field("name", &self.name)
			.field("parameters", &self.parameters)
			.finish_non_exhaustive()
	}
}

/// Everything the injector may know about one raw type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
	pub name: Arc<str>,
	pub type_params: Vec<Arc<str>>,
	pub kind: TypeKind,
	pub scope: Option<Scope>,
	pub constructors: Vec<ConstructorDecl>,
	pub members: Vec<MemberDecl>,
	/// Whether the container may call non-annotated private constructors of
	/// this type (e.g. the type itself is private to its enclosing module).
	pub private_constructors_reachable: bool,
	pub source: Source,
}

impl TypeDescriptor {
	#[track_caller]
	pub fn concrete(name: impl Into<Arc<str>>) -> Self {
		Self::with_kind(name.into(), TypeKind::Concrete, Source::caller())
	}

	#[track_caller]
	pub fn abstract_type(name: impl Into<Arc<str>>) -> Self {
		Self::with_kind(name.into(), TypeKind::Abstract, Source::caller())
	}

	fn with_kind(name: Arc<str>, kind: TypeKind, source: Source) -> Self {
		Self {
			name,
			type_params: Vec::new(),
			kind,
			scope: None,
			constructors: Vec::new(),
			members: Vec::new(),
			private_constructors_reachable: false,
			source,
		}
	}

	pub fn type_params<I, S>(mut self, params: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Arc<str>>,
	{
		self.type_params = params.into_iter().map(Into::into).collect();
		self
	}

	pub fn constructor(mut self, constructor: ConstructorDecl) -> Self {
		self.constructors.push(constructor);
		self
	}

	pub fn member(mut self, member: MemberDecl) -> Self {
		self.members.push(member);
		self
	}

	/// Scope annotation carried by the type itself.
	pub fn scoped(mut self, scope: Scope) -> Self {
		self.scope = Some(scope);
		self
	}

	pub fn private_constructors_reachable(mut self) -> Self {
		self.private_constructors_reachable = true;
		self
	}

	/// The type as declared, with its own type variables as arguments.
	pub fn declared_literal(&self) -> TypeLiteral {
		TypeLiteral::generic(
			self.name.clone(),
			self.type_params
				.iter()
				.cloned()
				.map(TypeLiteral::Variable)
				.collect(),
		)
	}

	/// Maps declared type variables onto the arguments of `literal`.
	/// Variables without a matching argument stay unbound.
	pub(crate) fn bind_type_args(&self, literal: &TypeLiteral) -> HashMap<Arc<str>, TypeLiteral> {
		self.type_params
			.iter()
			.cloned()
			.zip(literal.args().iter().cloned())
			.collect()
	}
}

/// Source of static type metadata.
pub trait InjectionPointCatalog: Send + Sync {
	fn type_of(&self, raw_type: &str) -> Option<Arc<TypeDescriptor>>;

	fn constructors_of(&self, raw_type: &str) -> Vec<ConstructorDecl> {
		self.type_of(raw_type)
			.map(|d| d.constructors.clone())
			.unwrap_or_default()
	}

	fn members_of(&self, raw_type: &str) -> Vec<MemberDecl> {
		self.type_of(raw_type)
			.map(|d| d.members.clone())
			.unwrap_or_default()
	}
}

/// An in-memory catalog populated up front.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
	types: HashMap<Arc<str>, Arc<TypeDescriptor>>,
}

impl StaticCatalog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a descriptor, replacing any previous one with the same name.
	pub fn register(&mut self, descriptor: TypeDescriptor) -> &mut Self {
		self.types
			.insert(descriptor.name.clone(), Arc::new(descriptor));
		self
	}

	pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
		self.register(descriptor);
		self
	}

	pub fn len(&self) -> usize {
		self.types.len()
	}

	pub fn is_empty(&self) -> bool {
		self.types.is_empty()
	}
}

impl InjectionPointCatalog for StaticCatalog {
	fn type_of(&self, raw_type: &str) -> Option<Arc<TypeDescriptor>> {
		self.types.get(raw_type).cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_catalog_lookup_by_raw_name() {
		// Arrange
		let catalog = StaticCatalog::new()
			.with(TypeDescriptor::concrete("Bar").constructor(ConstructorDecl::new(|_| {
				Ok(Instance::new(()))
			})))
			.with(TypeDescriptor::abstract_type("List").type_params(["T"]));

		// Act
		let bar = catalog.type_of("Bar");
		let list = catalog.type_of("List");

		// Assert
		assert_eq!(catalog.len(), 2);
		assert_eq!(catalog.constructors_of("Bar").len(), 1);
		assert!(catalog.members_of("Bar").is_empty());
		assert_eq!(bar.map(|d| d.kind), Some(TypeKind::Concrete));
		assert_eq!(
			list.map(|d| d.declared_literal().to_string()),
			Some("List<T>".to_string())
		);
		assert!(catalog.type_of("Missing").is_none());
	}

	#[rstest]
	fn test_bind_type_args_leaves_missing_variables_unbound() {
		// Arrange
		let descriptor = TypeDescriptor::concrete("Pair").type_params(["K", "V"]);
		let literal = TypeLiteral::generic("Pair", vec![TypeLiteral::class("String")]);

		// Act
		let bindings = descriptor.bind_type_args(&literal);
		let value = Parameter::of(TypeLiteral::variable("V")).key_with(&bindings);

		// Assert
		assert_eq!(bindings.len(), 1);
		assert!(!value.type_literal().is_fully_specified());
	}
}
