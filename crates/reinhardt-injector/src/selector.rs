//! Injection points and constructor selection

use crate::catalog::{
	ConstructFn, ConstructorDecl, InjectFn, MemberDecl, MemberKind, Parameter, TypeDescriptor,
	Visibility,
};
use crate::error::{DiError, Errors};
use crate::instance::Instance;
use crate::key::{Key, TypeLiteral};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
	Constructor,
	Field(Arc<str>),
	Method(Arc<str>),
}

#[derive(Clone)]
enum Action {
	Construct(ConstructFn),
	Inject(InjectFn),
}

/// One constructor, field or method with its resolved dependency keys.
#[derive(Clone)]
pub struct InjectionPoint {
	declaring: TypeLiteral,
	member: Member,
	dependencies: Vec<Key>,
	action: Action,
}

impl InjectionPoint {
	pub fn declaring_type(&self) -> &TypeLiteral {
		&self.declaring
	}

	pub fn member(&self) -> &Member {
		&self.member
	}

	pub fn dependencies(&self) -> &[Key] {
		&self.dependencies
	}

	pub fn is_constructor(&self) -> bool {
		self.member == Member::Constructor
	}

	pub(crate) fn dependency_sites(&self) -> Vec<(Key, String)> {
		self.dependencies
			.iter()
			.enumerate()
			.map(|(i, key)| (key.clone(), format!("{}, parameter {}", self, i)))
			.collect()
	}

	pub(crate) fn construct(&self, args: &[Instance]) -> anyhow::Result<Instance> {
		match &self.action {
			Action::Construct(construct) => construct(args),
			Action::Inject(_) => anyhow::bail!("{} is not a constructor", self),
		}
	}

	pub(crate) fn inject(&self, target: &Instance, args: &[Instance]) -> anyhow::Result<()> {
		match &self.action {
			Action::Inject(inject) => inject(target, args),
			Action::Construct(_) => anyhow::bail!("{} is not a member injection point", self),
		}
	}
}

impl fmt::Display for InjectionPoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.member {
			Member::Constructor => write!(f, "{}.<init>", self.declaring),
			Member::Field(name) => write!(f, "{}.{}", self.declaring, name),
			Member::Method(name) => write!(f, "{}.{}()", self.declaring, name),
		}
	}
}

impl fmt::Debug for InjectionPoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InjectionPoint")
			.field("site", &self.to_string())
			.field("dependencies", &self.dependencies)
			.finish()
	}
}

/// Picks the injectable constructor of a type and resolves injection points
/// against concrete type arguments.
pub struct ConstructorSelector;

impl ConstructorSelector {
	/// Selects the single injectable constructor of `descriptor`.
	///
	/// Exactly one annotated constructor wins regardless of visibility.
	/// Without annotations a no-argument constructor is used, unless it is
	/// private and the catalog does not let the container reach it.
	pub fn select(descriptor: &TypeDescriptor, literal: &TypeLiteral) -> Result<InjectionPoint, Errors> {
		let annotated: Vec<usize> = descriptor
			.constructors
			.iter()
			.enumerate()
			.filter(|(_, c)| c.annotated)
			.map(|(i, _)| i)
			.collect();

		let index = match annotated.as_slice() {
			[index] => *index,
			[] => Self::no_arg(descriptor, literal)?,
			many => {
				let positions = many
					.iter()
					.map(|i| format!("{}.<init>[{}]", literal, i))
					.collect::<Vec<_>>()
					.join(", ");
				return Err(DiError::Configuration {
					type_literal: literal.clone(),
					message: format!(
						"{} has more than one constructor annotated; \
						 injectable classes must have exactly one. \
						 Annotated constructors: {}",
						literal, positions
					),
					declared_at: descriptor.source,
				}
				.into());
			}
		};

		Self::constructor_at(descriptor, index, literal)
	}

	fn no_arg(descriptor: &TypeDescriptor, literal: &TypeLiteral) -> Result<usize, Errors> {
		let found = descriptor
			.constructors
			.iter()
			.position(ConstructorDecl::is_no_arg);
		match found {
			Some(index)
				if descriptor.constructors[index].visibility != Visibility::Private
					|| descriptor.private_constructors_reachable =>
			{
				Ok(index)
			}
			Some(_) => Err(DiError::Configuration {
				type_literal: literal.clone(),
				message: format!(
					"No injectable constructor for type {}. Its no-argument constructor is private and not reachable by the injector; annotate it as the injection constructor.",
					literal
				),
				declared_at: descriptor.source,
			}
			.into()),
			None => Err(DiError::Configuration {
				type_literal: literal.clone(),
				message: format!(
					"No injectable constructor for type {}. Classes must have either one (and only one) annotated constructor or a zero-argument constructor.",
					literal
				),
				declared_at: descriptor.source,
			}
			.into()),
		}
	}

	/// Builds the injection point for an explicitly chosen constructor.
	pub fn constructor_at(
		descriptor: &TypeDescriptor,
		index: usize,
		literal: &TypeLiteral,
	) -> Result<InjectionPoint, Errors> {
		let Some(decl) = descriptor.constructors.get(index) else {
			return Err(DiError::Configuration {
				type_literal: literal.clone(),
				message: format!("{} has no constructor at position {}", literal, index),
				declared_at: descriptor.source,
			}
			.into());
		};
		let bindings = descriptor.bind_type_args(literal);
		let point = InjectionPoint {
			declaring: literal.clone(),
			member: Member::Constructor,
			dependencies: Vec::new(),
			action: Action::Construct(decl.construct.clone()),
		};
		Self::resolve_parameters(point, &decl.parameters, &bindings)
	}

	/// Field and method injection points, in declaration order.
	pub fn members(descriptor: &TypeDescriptor, literal: &TypeLiteral) -> Result<Vec<InjectionPoint>, Errors> {
		let bindings = descriptor.bind_type_args(literal);
		let mut errors = Errors::new();
		let mut points = Vec::with_capacity(descriptor.members.len());
		for member in &descriptor.members {
			match Self::member_point(member, literal, &bindings) {
				Ok(point) => points.push(point),
				Err(e) => errors.extend(e),
			}
		}
		errors.into_result(points)
	}

	fn member_point(
		member: &MemberDecl,
		literal: &TypeLiteral,
		bindings: &HashMap<Arc<str>, TypeLiteral>,
	) -> Result<InjectionPoint, Errors> {
		let point = InjectionPoint {
			declaring: literal.clone(),
			member: match member.kind {
				MemberKind::Field => Member::Field(member.name.clone()),
				MemberKind::Method => Member::Method(member.name.clone()),
			},
			dependencies: Vec::new(),
			action: Action::Inject(member.inject.clone()),
		};
		Self::resolve_parameters(point, &member.parameters, bindings)
	}

	/// Every parameter type must be fully specified once the declared type
	/// arguments are applied; each offending site is reported.
	fn resolve_parameters(
		mut point: InjectionPoint,
		parameters: &[Parameter],
		bindings: &HashMap<Arc<str>, TypeLiteral>,
	) -> Result<InjectionPoint, Errors> {
		let mut errors = Errors::new();
		for parameter in parameters {
			let key = parameter.key_with(bindings);
			if key.type_literal().is_fully_specified() {
				point.dependencies.push(key);
			} else {
				for variable in key.type_literal().variables() {
					errors.push(DiError::UnresolvedGenericType {
						variable: variable.to_string(),
						site: point.to_string(),
					});
				}
			}
		}
		errors.into_result(point)
	}
}
