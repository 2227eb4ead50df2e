//! Dependency identity: type literals, qualifiers and keys
//!
//! A [`Key`] is what callers ask the injector for. It pairs a fully specified
//! [`TypeLiteral`] with an optional [`Qualifier`] that narrows the type to a
//! specific binding.
//!
//! ```
//! use reinhardt_injector::{Key, Qualifier, TypeLiteral};
//!
//! let plain = Key::of("Bacon");
//! let turkey = Key::named("Bacon", "Turkey");
//!
//! assert_ne!(plain, turkey);
//! assert_eq!(turkey, Key::new(TypeLiteral::class("Bacon"), Some(Qualifier::named("Turkey"))));
//! assert_eq!(turkey.to_string(), "Bacon annotated with @Named(\"Turkey\")");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A possibly generic type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeLiteral {
	/// A named type with its (possibly empty) type arguments.
	Class {
		name: Arc<str>,
		args: Vec<TypeLiteral>,
	},
	/// A type variable such as `T` that has not been bound yet.
	Variable(Arc<str>),
}

impl TypeLiteral {
	/// A non-generic class type.
	pub fn class(name: impl Into<Arc<str>>) -> Self {
		Self::Class {
			name: name.into(),
			args: Vec::new(),
		}
	}

	/// A parameterized class type, e.g. `List<Butter>`.
	pub fn generic(name: impl Into<Arc<str>>, args: Vec<TypeLiteral>) -> Self {
		Self::Class {
			name: name.into(),
			args,
		}
	}

	/// A type variable.
	pub fn variable(name: impl Into<Arc<str>>) -> Self {
		Self::Variable(name.into())
	}

	/// Name of the raw type (`List` for `List<Butter>`), or the variable name.
	pub fn raw_name(&self) -> &str {
		match self {
			Self::Class { name, .. } => name,
			Self::Variable(name) => name,
		}
	}

	/// Type arguments of a class type; empty for variables.
	pub fn args(&self) -> &[TypeLiteral] {
		match self {
			Self::Class { args, .. } => args,
			Self::Variable(_) => &[],
		}
	}

	/// Returns true when no type variable occurs anywhere in this literal.
	pub fn is_fully_specified(&self) -> bool {
		match self {
			Self::Class { args, .. } => args.iter().all(TypeLiteral::is_fully_specified),
			Self::Variable(_) => false,
		}
	}

	/// Collects the names of the type variables occurring in this literal, in
	/// order of first appearance.
	pub fn variables(&self) -> Vec<Arc<str>> {
		let mut out = Vec::new();
		self.collect_variables(&mut out);
		out
	}

	fn collect_variables(&self, out: &mut Vec<Arc<str>>) {
		match self {
			Self::Class { args, .. } => {
				for arg in args {
					arg.collect_variables(out);
				}
			}
			Self::Variable(name) => {
				if !out.contains(name) {
					out.push(name.clone());
				}
			}
		}
	}

	/// Replaces bound type variables. Unbound variables are left in place.
	pub fn substitute(&self, bindings: &HashMap<Arc<str>, TypeLiteral>) -> TypeLiteral {
		match self {
			Self::Class { name, args } => Self::Class {
				name: name.clone(),
				args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
			},
			Self::Variable(name) => bindings
				.get(name)
				.cloned()
				.unwrap_or_else(|| self.clone()),
		}
	}
}

impl fmt::Display for TypeLiteral {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Class { name, args } => {
				f.write_str(name)?;
				if !args.is_empty() {
					f.write_str("<")?;
					for (i, arg) in args.iter().enumerate() {
						if i > 0 {
							f.write_str(", ")?;
						}
						write!(f, "{}", arg)?;
					}
					f.write_str(">")?;
				}
				Ok(())
			}
			Self::Variable(name) => f.write_str(name),
		}
	}
}

impl From<&str> for TypeLiteral {
	fn from(name: &str) -> Self {
		Self::class(name)
	}
}

/// A binding discriminator with a structural payload.
///
/// Two qualifiers are equal when their annotation name and every attribute
/// value match, in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Qualifier {
	annotation: Arc<str>,
	attributes: Vec<(Arc<str>, Arc<str>)>,
}

impl Qualifier {
	pub const NAMED: &'static str = "Named";

	/// A `@Named("value")` qualifier.
	pub fn named(value: impl Into<Arc<str>>) -> Self {
		Self {
			annotation: Self::NAMED.into(),
			attributes: vec![("value".into(), value.into())],
		}
	}

	/// A qualifier without attributes, e.g. `@Blue`.
	pub fn marker(annotation: impl Into<Arc<str>>) -> Self {
		Self {
			annotation: annotation.into(),
			attributes: Vec::new(),
		}
	}

	/// A qualifier with arbitrary attributes.
	pub fn with_attributes<I, K, V>(annotation: impl Into<Arc<str>>, attributes: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<Arc<str>>,
		V: Into<Arc<str>>,
	{
		Self {
			annotation: annotation.into(),
			attributes: attributes
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}

	pub fn annotation(&self) -> &str {
		&self.annotation
	}

	pub fn attributes(&self) -> &[(Arc<str>, Arc<str>)] {
		&self.attributes
	}

	/// Stable rendering of the payload used for approximate matching.
	///
	/// A lone `value` attribute renders as the bare value; markers render as
	/// their annotation name; anything else renders like [`Display`](fmt::Display).
	pub fn value_string(&self) -> String {
		match self.attributes.as_slice() {
			[] => self.annotation.to_string(),
			[(name, value)] if &**name == "value" => value.to_string(),
			_ => self.to_string(),
		}
	}
}

impl fmt::Display for Qualifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "@{}", self.annotation)?;
		match self.attributes.as_slice() {
			[] => Ok(()),
			[(name, value)] if &**name == "value" => write!(f, "({:?})", &**value),
			attrs => {
				f.write_str("(")?;
				for (i, (name, value)) in attrs.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}={:?}", name, &**value)?;
				}
				f.write_str(")")
			}
		}
	}
}

/// Identity of a requested dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
	type_literal: TypeLiteral,
	qualifier: Option<Qualifier>,
}

impl Key {
	pub fn new(type_literal: TypeLiteral, qualifier: Option<Qualifier>) -> Self {
		Self {
			type_literal,
			qualifier,
		}
	}

	/// Unqualified key for a non-generic type.
	pub fn of(raw_type: impl Into<Arc<str>>) -> Self {
		Self::new(TypeLiteral::class(raw_type), None)
	}

	/// Key for `raw_type` qualified with `@Named(name)`.
	pub fn named(raw_type: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
		Self::new(TypeLiteral::class(raw_type), Some(Qualifier::named(name)))
	}

	/// Same type, different qualifier.
	pub fn qualified(self, qualifier: Qualifier) -> Self {
		Self {
			qualifier: Some(qualifier),
			..self
		}
	}

	pub fn type_literal(&self) -> &TypeLiteral {
		&self.type_literal
	}

	pub fn raw_name(&self) -> &str {
		self.type_literal.raw_name()
	}

	pub fn qualifier(&self) -> Option<&Qualifier> {
		self.qualifier.as_ref()
	}

	/// Rendering of the qualifier payload; empty for unqualified keys.
	pub fn qualifier_string(&self) -> String {
		self.qualifier
			.as_ref()
			.map(Qualifier::value_string)
			.unwrap_or_default()
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.type_literal)?;
		if let Some(qualifier) = &self.qualifier {
			write!(f, " annotated with {}", qualifier)?;
		}
		Ok(())
	}
}

impl From<&str> for Key {
	fn from(raw_type: &str) -> Self {
		Self::of(raw_type)
	}
}

impl From<TypeLiteral> for Key {
	fn from(type_literal: TypeLiteral) -> Self {
		Self::new(type_literal, None)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::collections::HashSet;

	#[rstest]
	fn test_keys_compare_by_type_and_qualifier() {
		// Arrange
		let a = Key::named("Bacon", "Turkey");
		let b = Key::named("Bacon", "Turkey");
		let c = Key::named("Bacon", "Tofu");
		let d = Key::of("Bacon");

		// Act
		let set: HashSet<Key> = [a.clone(), b, c, d].into_iter().collect();

		// Assert
		assert_eq!(set.len(), 3);
		assert!(set.contains(&a));
	}

	#[rstest]
	fn test_qualifier_attributes_participate_in_equality() {
		// Arrange
		let left = Qualifier::with_attributes("Config", [("env", "prod"), ("region", "eu")]);
		let right = Qualifier::with_attributes("Config", [("env", "prod"), ("region", "us")]);

		// Assert
		assert_ne!(left, right);
		assert_eq!(
			left.to_string(),
			"@Config(env=\"prod\", region=\"eu\")"
		);
	}

	#[rstest]
	#[case(Qualifier::named("Turkey"), "Turkey")]
	#[case(Qualifier::marker("Blue"), "Blue")]
	fn test_value_string(#[case] qualifier: Qualifier, #[case] expected: &str) {
		assert_eq!(qualifier.value_string(), expected);
	}

	#[rstest]
	fn test_generic_display_and_substitution() {
		// Arrange
		let declared = TypeLiteral::generic("C", vec![TypeLiteral::variable("T")]);
		let mut bindings = HashMap::new();
		bindings.insert(Arc::from("T"), TypeLiteral::class("Stage"));

		// Act
		let resolved = declared.substitute(&bindings);

		// Assert
		assert!(!declared.is_fully_specified());
		assert_eq!(declared.variables(), vec![Arc::from("T")]);
		assert!(resolved.is_fully_specified());
		assert_eq!(resolved.to_string(), "C<Stage>");
	}

	#[rstest]
	fn test_unqualified_key_display() {
		assert_eq!(Key::of("List").to_string(), "List");
		assert_eq!(Key::of("List").qualifier_string(), "");
	}
}
