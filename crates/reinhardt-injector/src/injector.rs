//! The injector: creation, validation and lookups
//!
//! Building an injector installs every module declaration, validates the
//! whole dependency graph reachable from explicit bindings, and constructs
//! eager singletons. Every problem found along the way is reported together
//! in one [`ErrorReport`].

use crate::binding::{Binding, BindingStrategy};
use crate::catalog::{InjectionPointCatalog, StaticCatalog};
use crate::config::{InjectorConfig, Stage};
use crate::error::{DiError, DiResult, ErrorPhase, ErrorReport, Errors};
use crate::graph::GraphBuilder;
use crate::hooks::{ConstructionHook, NoopHook};
use crate::instance::{Instance, Provider};
use crate::key::Key;
use crate::module::{Binder, Declaration, Element, Module};
use crate::registry::{BindingRegistry, RegistrySnapshot};
use crate::scope::ScopeManager;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// Raw type name of the built-in injector binding.
pub const INJECTOR_TYPE: &str = "Injector";

/// Raw type name of the built-in stage binding.
pub const STAGE_TYPE: &str = "Stage";

struct InjectorInner {
	registry: BindingRegistry,
	scopes: ScopeManager,
	hook: Arc<dyn ConstructionHook>,
	config: InjectorConfig,
	/// Keys whose dependency graph has already been checked.
	validated: Mutex<HashSet<Key>>,
}

/// Resolves keys to fully wired instances.
///
/// Cloning is cheap; clones share bindings and singleton caches.
#[derive(Clone)]
pub struct Injector {
	inner: Arc<InjectorInner>,
}

impl Injector {
	pub fn builder() -> InjectorBuilder {
		InjectorBuilder::new()
	}

	/// The instance bound to `key`.
	///
	/// The first lookup of a key validates its dependency graph, so every
	/// missing dependency along the way is reported at once.
	pub fn get_instance(&self, key: &Key) -> DiResult<Instance> {
		self.validate_key(key)
			.and_then(|()| self.graph().resolve(key))
			.map_err(|errors| ErrorReport::new(ErrorPhase::Resolution, errors))
	}

	/// Typed variant of [`get_instance`](Self::get_instance).
	pub fn get<T: Any + Send + Sync>(&self, key: &Key) -> DiResult<Arc<T>> {
		let instance = self.get_instance(key)?;
		instance.downcast::<T>().ok_or_else(|| {
			ErrorReport::new(
				ErrorPhase::Resolution,
				DiError::Provision {
					key: key.clone(),
					message: format!("instance is not a {}", std::any::type_name::<T>()),
				}
				.into(),
			)
		})
	}

	/// The binding for `key`, creating a just-in-time binding when allowed.
	pub fn get_binding(&self, key: &Key) -> DiResult<Arc<Binding>> {
		self.inner
			.registry
			.resolve(key)
			.map_err(|errors| ErrorReport::new(ErrorPhase::Resolution, errors))
	}

	/// Immutable snapshot of every binding known right now.
	pub fn get_all_bindings(&self) -> RegistrySnapshot {
		self.inner.registry.snapshot()
	}

	/// A provider that resolves `key` on every call.
	pub fn get_provider(&self, key: &Key) -> DiResult<BoundProvider> {
		self.validate_key(key)
			.map_err(|errors| ErrorReport::new(ErrorPhase::Resolution, errors))?;
		Ok(BoundProvider {
			injector: self.clone(),
			key: key.clone(),
		})
	}

	pub fn config(&self) -> &InjectorConfig {
		&self.inner.config
	}

	pub fn stage(&self) -> Stage {
		self.inner.config.stage
	}

	fn graph(&self) -> GraphBuilder<'_> {
		GraphBuilder::new(&self.inner.registry, &self.inner.scopes, self.inner.hook.as_ref())
	}

	fn validate_key(&self, key: &Key) -> Result<(), Errors> {
		if self.inner.validated.lock().contains(key) {
			return Ok(());
		}
		let mut errors = Errors::new();
		let visited = self.walk(vec![(key.clone(), None)], &mut errors);
		errors.into_result(())?;
		self.inner.validated.lock().extend(visited);
		Ok(())
	}

	/// Checks that every key reachable from `roots` has a usable binding,
	/// creating just-in-time bindings on the way.
	fn walk(&self, roots: Vec<(Key, Option<String>)>, errors: &mut Errors) -> HashSet<Key> {
		let mut visited = HashSet::new();
		let mut pending = roots;
		pending.reverse();

		while let Some((key, site)) = pending.pop() {
			if !visited.insert(key.clone()) {
				continue;
			}
			match self.inner.registry.resolve(&key) {
				Ok(binding) => {
					let mut dependencies = binding.dependencies();
					dependencies.reverse();
					pending.extend(dependencies.into_iter().map(|(k, s)| (k, Some(s))));
				}
				Err(found) => {
					for error in found {
						errors.push(match &site {
							Some(site) => error.requested_by(site),
							None => error,
						});
					}
				}
			}
		}
		visited
	}
}

impl PartialEq for Injector {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for Injector {}

impl std::fmt::Debug for Injector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Injector")
			.field("stage", &self.inner.config.stage)
			.field("bindings", &self.inner.registry.snapshot().len())
			.finish()
	}
}

/// Provider for one key of one injector.
#[derive(Clone, Debug)]
pub struct BoundProvider {
	injector: Injector,
	key: Key,
}

impl BoundProvider {
	pub fn key(&self) -> &Key {
		&self.key
	}
}

impl Provider for BoundProvider {
	fn get(&self) -> anyhow::Result<Instance> {
		Ok(self.injector.get_instance(&self.key)?)
	}
}

/// Hands out the injector it belongs to without keeping it alive.
struct SelfProvider(Weak<InjectorInner>);

impl Provider for SelfProvider {
	fn get(&self) -> anyhow::Result<Instance> {
		match self.0.upgrade() {
			Some(inner) => Ok(Instance::new(Injector { inner })),
			None => anyhow::bail!("the injector has already been dropped"),
		}
	}
}

/// Collects configuration and modules, then builds an [`Injector`].
pub struct InjectorBuilder {
	catalog: Arc<dyn InjectionPointCatalog>,
	config: InjectorConfig,
	hook: Arc<dyn ConstructionHook>,
	binder: Binder,
}

impl Default for InjectorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl InjectorBuilder {
	pub fn new() -> Self {
		Self {
			catalog: Arc::new(StaticCatalog::new()),
			config: InjectorConfig::default(),
			hook: Arc::new(NoopHook),
			binder: Binder::new(),
		}
	}

	pub fn catalog(mut self, catalog: impl InjectionPointCatalog + 'static) -> Self {
		self.catalog = Arc::new(catalog);
		self
	}

	pub fn shared_catalog(mut self, catalog: Arc<dyn InjectionPointCatalog>) -> Self {
		self.catalog = catalog;
		self
	}

	pub fn config(mut self, config: InjectorConfig) -> Self {
		self.config = config;
		self
	}

	pub fn stage(mut self, stage: Stage) -> Self {
		self.config.stage = stage;
		self
	}

	pub fn hook(mut self, hook: impl ConstructionHook + 'static) -> Self {
		self.hook = Arc::new(hook);
		self
	}

	/// Runs `module` against this builder's binder.
	pub fn module(mut self, module: impl Module) -> Self {
		module.configure(&mut self.binder);
		self
	}

	/// Appends declarations produced outside of a module, e.g. by a loader.
	pub fn declarations(mut self, declarations: impl IntoIterator<Item = Declaration>) -> Self {
		for declaration in declarations {
			self.binder.add_declaration(declaration);
		}
		self
	}

	/// Builds and validates the injector.
	///
	/// # Errors
	///
	/// Returns a [`ErrorPhase::Creation`] report listing every installation,
	/// validation and eager-construction problem.
	pub fn build(self) -> DiResult<Injector> {
		let Self {
			catalog,
			config,
			hook,
			binder,
		} = self;

		let inner = Arc::new(InjectorInner {
			registry: BindingRegistry::new(catalog, hook.clone(), &config),
			scopes: ScopeManager::new(),
			hook,
			config,
			validated: Mutex::new(HashSet::new()),
		});
		let injector = Injector { inner };
		let registry = &injector.inner.registry;

		registry.install_builtin(
			Key::of(INJECTOR_TYPE),
			BindingStrategy::ProviderInstance(Arc::new(SelfProvider(Arc::downgrade(&injector.inner)))),
		);
		registry.install_builtin(
			Key::of(STAGE_TYPE),
			BindingStrategy::Instance(Instance::new(injector.stage())),
		);

		let mut errors = Errors::new();
		let mut roots = Vec::new();
		for element in binder.into_elements() {
			match element {
				Element::Binding(declaration) => {
					let key = declaration.key.clone();
					registry.install(declaration, &mut errors);
					// Rejected declarations are already reported.
					if registry.get(&key).is_some() {
						roots.push((key, None));
					}
				}
				Element::RequireKey { key, .. } => roots.push((key, None)),
			}
		}

		let visited = injector.walk(roots, &mut errors);
		if !errors.is_empty() {
			tracing::warn!(errors = errors.len(), "injector configuration is invalid");
			return Err(ErrorReport::new(ErrorPhase::Creation, errors));
		}
		injector.inner.validated.lock().extend(visited);

		let stage = injector.stage();
		let eager: Vec<Key> = registry
			.snapshot()
			.iter()
			.filter(|(_, binding)| binding.scope().is_eager(stage))
			.map(|(key, _)| key.clone())
			.collect();
		let graph = injector.graph();
		for key in &eager {
			if let Err(found) = graph.resolve(key) {
				errors.extend(found);
			}
		}
		if !errors.is_empty() {
			tracing::warn!(errors = errors.len(), "eager singleton construction failed");
			return Err(ErrorReport::new(ErrorPhase::Creation, errors));
		}

		tracing::debug!(
			bindings = registry.snapshot().len(),
			eager = eager.len(),
			stage = %stage,
			"injector created"
		);
		Ok(injector)
	}
}
