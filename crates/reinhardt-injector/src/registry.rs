//! Binding registry
//!
//! Holds every explicit, built-in and just-in-time binding of an injector.
//! The live map sits behind an `Arc` that is copied on write, so snapshots
//! handed to callers are immutable and cheap to take while lookups keep
//! adding just-in-time bindings.

use crate::binding::{Binding, BindingOrigin, BindingStrategy, ConstructorBinding, Source};
use crate::catalog::{InjectionPointCatalog, TypeDescriptor, TypeKind};
use crate::config::InjectorConfig;
use crate::error::{DiError, Errors};
use crate::hooks::ConstructionHook;
use crate::key::{Key, TypeLiteral};
use crate::module::{ConstructorRef, Declaration, Target};
use crate::scope::Scope;
use crate::selector::ConstructorSelector;
use crate::suggestions::missing_implementation_hints;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;

type BindingMap = IndexMap<Key, Arc<Binding>>;

pub struct BindingRegistry {
	catalog: Arc<dyn InjectionPointCatalog>,
	hook: Arc<dyn ConstructionHook>,
	bindings: RwLock<Arc<BindingMap>>,
	/// Types already announced to the hook.
	encountered: Mutex<HashSet<TypeLiteral>>,
	require_explicit_bindings: bool,
	max_suggestions: usize,
}

impl BindingRegistry {
	pub fn new(
		catalog: Arc<dyn InjectionPointCatalog>,
		hook: Arc<dyn ConstructionHook>,
		config: &InjectorConfig,
	) -> Self {
		Self {
			catalog,
			hook,
			bindings: RwLock::new(Arc::new(IndexMap::new())),
			encountered: Mutex::new(HashSet::new()),
			require_explicit_bindings: config.require_explicit_bindings,
			max_suggestions: config.max_suggestions,
		}
	}

	/// Registers a binding every injector carries.
	pub(crate) fn install_builtin(&self, key: Key, strategy: BindingStrategy) {
		let binding = Binding::new(
			key.clone(),
			strategy,
			Scope::NoScope,
			Source::BuiltIn,
			BindingOrigin::BuiltIn,
		);
		Arc::make_mut(&mut *self.bindings.write()).insert(key, Arc::new(binding));
	}

	/// Installs one module declaration, recording any problem in `errors`.
	pub fn install(&self, declaration: Declaration, errors: &mut Errors) {
		let Declaration {
			key,
			target,
			scope,
			source,
		} = declaration;

		if !key.type_literal().is_fully_specified() {
			for variable in key.type_literal().variables() {
				errors.push(DiError::UnresolvedGenericType {
					variable: variable.to_string(),
					site: format!("binding for {} declared at {}", key, source),
				});
			}
			return;
		}

		if let Some(existing) = self.get(&key) {
			// The same declaration seen twice, e.g. a module installed twice.
			if existing.source() != source || !source.is_code() {
				errors.push(DiError::DuplicateBinding {
					key,
					first: existing.source(),
					second: source,
				});
			}
			return;
		}

		let (strategy, annotated) = match self.strategy_for(&key, target, source) {
			Ok(resolved) => resolved,
			Err(e) => {
				errors.extend(e);
				return;
			}
		};
		let scope = scope.or(annotated).unwrap_or(Scope::NoScope);
		let binding = Binding::new(key.clone(), strategy, scope, source, BindingOrigin::Explicit);
		tracing::debug!(key = %key, source = %source, strategy = ?binding.strategy(), "binding installed");

		Arc::make_mut(&mut *self.bindings.write()).insert(key, Arc::new(binding));
	}

	/// Turns a declared target into a strategy plus the scope annotation of
	/// the constructed type, if any.
	fn strategy_for(
		&self,
		key: &Key,
		target: Target,
		source: Source,
	) -> Result<(BindingStrategy, Option<Scope>), Errors> {
		match target {
			Target::Instance(instance) => Ok((BindingStrategy::Instance(instance), None)),
			Target::ProviderInstance(provider) => Ok((BindingStrategy::ProviderInstance(provider), None)),
			Target::ProviderKey(provider) => Ok((BindingStrategy::ProviderKey(provider), None)),
			Target::Linked(linked) if linked == *key => Err(DiError::Configuration {
				type_literal: key.type_literal().clone(),
				message: format!("Binding for {} points to itself.", key),
				declared_at: source,
			}
			.into()),
			Target::Linked(linked) => Ok((BindingStrategy::Linked(linked), None)),
			Target::Untargetted => {
				let descriptor = self.concrete_descriptor(key)?;
				let literal = literal_for(key, &descriptor);
				let binding = self.constructor_binding(&descriptor, &literal, None)?;
				Ok((BindingStrategy::Constructor(binding), descriptor.scope.clone()))
			}
			Target::Constructor {
				constructor,
				type_literal,
			} => {
				let Some(descriptor) = self.catalog.type_of(constructor.declaring()) else {
					return Err(self.missing(&Key::of(constructor.declaring())).into());
				};
				let literal = type_literal.unwrap_or_else(|| literal_for(key, &descriptor));
				let index = match &constructor {
					ConstructorRef::Declared { index, .. } => Some(*index),
					ConstructorRef::Injectable(_) => None,
				};
				let binding = self.constructor_binding(&descriptor, &literal, index)?;
				Ok((BindingStrategy::Constructor(binding), descriptor.scope.clone()))
			}
		}
	}

	/// Selects the constructor and members of `literal`, reporting every
	/// problem at once.
	fn constructor_binding(
		&self,
		descriptor: &TypeDescriptor,
		literal: &TypeLiteral,
		index: Option<usize>,
	) -> Result<ConstructorBinding, Errors> {
		let mut errors = Errors::new();
		let constructor = match index {
			Some(index) => ConstructorSelector::constructor_at(descriptor, index, literal),
			None => ConstructorSelector::select(descriptor, literal),
		};
		let members = ConstructorSelector::members(descriptor, literal);

		let (constructor, members) = match (constructor, members) {
			(Ok(constructor), Ok(members)) => (constructor, members),
			(constructor, members) => {
				if let Err(e) = constructor {
					errors.extend(e);
				}
				if let Err(e) = members {
					errors.extend(e);
				}
				return Err(errors);
			}
		};

		self.encounter(literal);
		Ok(ConstructorBinding {
			type_literal: literal.clone(),
			constructor,
			members,
		})
	}

	fn encounter(&self, literal: &TypeLiteral) {
		let first = self.encountered.lock().insert(literal.clone());
		if first {
			self.hook.on_type_encountered(literal);
		}
	}

	fn concrete_descriptor(&self, key: &Key) -> Result<Arc<TypeDescriptor>, Errors> {
		match self.catalog.type_of(key.raw_name()) {
			Some(descriptor) if descriptor.kind == TypeKind::Concrete => Ok(descriptor),
			_ => Err(self.missing(key).into()),
		}
	}

	/// A missing-implementation error with suggestions from the current
	/// bindings.
	pub(crate) fn missing(&self, key: &Key) -> DiError {
		let snapshot = self.snapshot();
		DiError::MissingImplementation {
			key: key.clone(),
			hints: missing_implementation_hints(key, snapshot.bindings(), self.max_suggestions),
			requested_by: None,
		}
	}

	pub fn get(&self, key: &Key) -> Option<Arc<Binding>> {
		self.bindings.read().get(key).cloned()
	}

	/// The binding for `key`, creating and committing a just-in-time binding
	/// when none is registered.
	///
	/// Racing callers for the same key all receive the binding that was
	/// committed first.
	pub fn resolve(&self, key: &Key) -> Result<Arc<Binding>, Errors> {
		if let Some(binding) = self.get(key) {
			return Ok(binding);
		}
		let created = Arc::new(self.just_in_time(key)?);

		let mut bindings = self.bindings.write();
		if let Some(existing) = bindings.get(key) {
			return Ok(existing.clone());
		}
		Arc::make_mut(&mut *bindings).insert(key.clone(), created.clone());
		tracing::trace!(key = %key, "just-in-time binding created");
		Ok(created)
	}

	fn just_in_time(&self, key: &Key) -> Result<Binding, Errors> {
		if !key.type_literal().is_fully_specified() {
			let mut errors = Errors::new();
			for variable in key.type_literal().variables() {
				errors.push(DiError::UnresolvedGenericType {
					variable: variable.to_string(),
					site: format!("lookup of {}", key),
				});
			}
			return Err(errors);
		}
		// Qualified keys are only ever satisfied by explicit bindings.
		if key.qualifier().is_some() {
			return Err(self.missing(key).into());
		}
		let descriptor = self.concrete_descriptor(key)?;
		if self.require_explicit_bindings {
			return Err(DiError::ExplicitBindingRequired { key: key.clone() }.into());
		}

		let binding = self.constructor_binding(&descriptor, &literal_for(key, &descriptor), None)?;
		Ok(Binding::new(
			key.clone(),
			BindingStrategy::Constructor(binding),
			descriptor.scope.clone().unwrap_or(Scope::NoScope),
			Source::JustInTime,
			BindingOrigin::JustInTime,
		))
	}

	/// Immutable point-in-time copy of every binding.
	pub fn snapshot(&self) -> RegistrySnapshot {
		RegistrySnapshot {
			bindings: self.bindings.read().clone(),
		}
	}
}

/// The literal a key constructs: the key's own type when it names the
/// descriptor with every type argument supplied, the declared generic form
/// otherwise.
fn literal_for(key: &Key, descriptor: &TypeDescriptor) -> TypeLiteral {
	let literal = key.type_literal();
	if literal.raw_name() == &*descriptor.name && literal.args().len() == descriptor.type_params.len() {
		literal.clone()
	} else {
		descriptor.declared_literal()
	}
}

/// A frozen view of the registry, in insertion order.
#[derive(Clone)]
pub struct RegistrySnapshot {
	bindings: Arc<BindingMap>,
}

impl RegistrySnapshot {
	pub fn get(&self, key: &Key) -> Option<&Binding> {
		self.bindings.get(key).map(|b| &**b)
	}

	pub fn contains_key(&self, key: &Key) -> bool {
		self.bindings.contains_key(key)
	}

	pub fn keys(&self) -> impl Iterator<Item = &Key> {
		self.bindings.keys()
	}

	pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
		self.bindings.values().map(|b| &**b)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Key, &Binding)> {
		self.bindings.iter().map(|(k, b)| (k, &**b))
	}

	pub fn len(&self) -> usize {
		self.bindings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}
}

impl std::fmt::Debug for RegistrySnapshot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.keys().map(ToString::to_string)).finish()
	}
}
