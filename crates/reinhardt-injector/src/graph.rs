//! Object-graph construction
//!
//! Resolution walks a key's binding depth-first. Constructor arguments must
//! be fully built before the constructor runs, so a key that comes back to
//! itself through constructor parameters is an error. Field and method
//! dependencies are resolved after construction; when one of them points at
//! a key that is still being built, in this lookup or another one, it
//! receives a proxy, and the member is injected as soon as that key
//! completes.

use crate::binding::{Binding, BindingStrategy, ConstructorBinding};
use crate::cycle_detection::{DeferredInjection, ResolutionState, Resolved};
use crate::error::{DiError, Errors};
use crate::hooks::ConstructionHook;
use crate::instance::Instance;
use crate::key::Key;
use crate::registry::BindingRegistry;
use crate::scope::{Claim, Scope, ScopeManager};

/// What kind of injection point is asking for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
	Request,
	Constructor,
	Member,
}

pub(crate) struct GraphBuilder<'a> {
	registry: &'a BindingRegistry,
	scopes: &'a ScopeManager,
	hook: &'a dyn ConstructionHook,
}

impl<'a> GraphBuilder<'a> {
	pub(crate) fn new(
		registry: &'a BindingRegistry,
		scopes: &'a ScopeManager,
		hook: &'a dyn ConstructionHook,
	) -> Self {
		Self {
			registry,
			scopes,
			hook,
		}
	}

	/// Builds the instance for `key` with a fresh cycle-detection state.
	pub(crate) fn resolve(&self, key: &Key) -> Result<Instance, Errors> {
		let mut state = ResolutionState::new();
		let result = self.resolve_root(key, &mut state);
		if result.is_err() {
			self.scopes.fail(&state);
		}
		result
	}

	fn resolve_root(&self, key: &Key, state: &mut ResolutionState) -> Result<Instance, Errors> {
		let resolved = self.resolve_in(key, Site::Request, state)?;

		// Member dependencies another lookup was constructing.
		while let Some(pending) = state.next_elsewhere() {
			match self.scopes.await_elsewhere(&pending, state) {
				Some(instance) => {
					let ready = state.complete(&pending, &instance);
					self.run_deferred(ready)?;
					self.scopes.settle(state);
				}
				None => {
					self.resolve_in(&pending, Site::Member, state)?;
				}
			}
		}

		let unresolved = state.unresolved();
		let instance = match resolved.instance() {
			Some(instance) if unresolved.is_empty() => instance,
			_ => {
				return Err(DiError::CyclicDependency {
					key: key.clone(),
					path: unresolved
						.iter()
						.map(ToString::to_string)
						.collect::<Vec<_>>()
						.join(", "),
				}
				.into());
			}
		};

		if !self.scopes.finish(state) {
			return Err(DiError::Provision {
				key: key.clone(),
				message: "a singleton sharing its dependency cycle failed to construct".to_string(),
			}
			.into());
		}
		Ok(instance)
	}

	fn resolve_in(&self, key: &Key, site: Site, state: &mut ResolutionState) -> Result<Resolved, Errors> {
		let binding = self.registry.resolve(key)?;

		if let Some(instance) = self.scopes.cached(&binding) {
			tracing::trace!(key = %key, "scope cache hit");
			return Ok(Resolved::Ready(instance));
		}

		if state.is_in_progress(key) {
			return match site {
				Site::Member => Ok(Resolved::Pending(state.issue_proxy(key))),
				Site::Request | Site::Constructor => Err(DiError::CyclicDependency {
					key: key.clone(),
					path: state.cycle_path(key),
				}
				.into()),
			};
		}

		let resolved = match binding.scope() {
			Scope::NoScope => state.with_resolution(key, |state| self.construct(&binding, site, state))?,
			Scope::Singleton | Scope::EagerSingleton => {
				match self.scopes.claim(&binding, state, site != Site::Member) {
					Claim::Existing(instance) => Resolved::Ready(instance),
					Claim::Elsewhere => return Ok(Resolved::Pending(state.issue_remote_proxy(key))),
					Claim::Deadlock => {
						return Err(DiError::CyclicDependency {
							key: key.clone(),
							path: state.path_through(key),
						}
						.into());
					}
					Claim::Build => {
						match state.with_resolution(key, |state| self.construct(&binding, site, state)) {
							Ok(Resolved::Ready(instance)) => {
								self.scopes.built(key, state, instance.clone());
								Resolved::Ready(instance)
							}
							// A proxy coming back through a link is handed on uncached.
							Ok(pending) => {
								self.scopes.abandon(key, state);
								return Ok(pending);
							}
							Err(e) => {
								self.scopes.abandon(key, state);
								return Err(e);
							}
						}
					}
				}
			}
			Scope::Custom(scope) => {
				let instance = scope.get_or_create(key, &mut || -> Result<Instance, Errors> {
					match state.with_resolution(key, |state| self.construct(&binding, site, state))? {
						Resolved::Ready(instance) => Ok(instance),
						Resolved::Pending(proxy) => Err(DiError::CyclicDependency {
							key: key.clone(),
							path: state.cycle_path(proxy.key()),
						}
						.into()),
					}
				})?;
				Resolved::Ready(instance)
			}
		};

		if let Resolved::Ready(instance) = &resolved {
			let ready = state.complete(key, instance);
			self.run_deferred(ready)?;
			self.scopes.settle(state);
		}
		Ok(resolved)
	}

	fn construct(&self, binding: &Binding, site: Site, state: &mut ResolutionState) -> Result<Resolved, Errors> {
		let key = binding.key();
		let instance = match binding.strategy() {
			// The link's own scope governs the source key.
			BindingStrategy::Linked(target) => return self.resolve_in(target, site, state),
			BindingStrategy::Instance(instance) => instance.clone(),
			BindingStrategy::ProviderInstance(provider) => {
				provider.get().map_err(|e| DiError::provision(key, e))?
			}
			BindingStrategy::ProviderKey(provider_key) => {
				let provided = self.resolve_ready(provider_key, state)?;
				let Some(provider) = provided.as_provider() else {
					return Err(DiError::Provision {
						key: key.clone(),
						message: format!("the instance bound to {} is not a provider", provider_key),
					}
					.into());
				};
				provider.get().map_err(|e| DiError::provision(key, e))?
			}
			BindingStrategy::Constructor(constructor) => self.construct_type(key, constructor, state)?,
		};
		Ok(Resolved::Ready(instance))
	}

	/// Resolves a dependency that must exist in full right now.
	fn resolve_ready(&self, key: &Key, state: &mut ResolutionState) -> Result<Instance, Errors> {
		match self.resolve_in(key, Site::Constructor, state)? {
			Resolved::Ready(instance) => Ok(instance),
			Resolved::Pending(proxy) => Err(DiError::CyclicDependency {
				key: proxy.key().clone(),
				path: state.cycle_path(proxy.key()),
			}
			.into()),
		}
	}

	fn construct_type(
		&self,
		key: &Key,
		binding: &ConstructorBinding,
		state: &mut ResolutionState,
	) -> Result<Instance, Errors> {
		let mut errors = Errors::new();

		let mut args = Vec::with_capacity(binding.constructor().dependencies().len());
		for (dependency, site) in binding.constructor().dependency_sites() {
			match self.resolve_ready(&dependency, state) {
				Ok(instance) => args.push(instance),
				Err(e) => push_all(&mut errors, e, &site),
			}
		}
		if !errors.is_empty() {
			return Err(errors);
		}

		let raw = binding
			.constructor()
			.construct(&args)
			.map_err(|e| DiError::provision(key, e))?;

		for point in binding.members() {
			let mut member_args = Vec::with_capacity(point.dependencies().len());
			for (dependency, site) in point.dependency_sites() {
				match self.resolve_in(&dependency, Site::Member, state) {
					Ok(resolved) => member_args.push(resolved),
					Err(e) => push_all(&mut errors, e, &site),
				}
			}
			if !errors.is_empty() {
				continue;
			}

			let ready: Option<Vec<Instance>> = member_args
				.iter()
				.map(|r| match r {
					Resolved::Ready(instance) => Some(instance.clone()),
					Resolved::Pending(_) => None,
				})
				.collect();
			match ready {
				Some(instances) => {
					if let Err(e) = point.inject(&raw, &instances) {
						errors.push(DiError::provision(key, e));
					}
				}
				None => state.defer(DeferredInjection {
					target: raw.clone(),
					point: point.clone(),
					args: member_args,
				}),
			}
		}
		errors.into_result(())?;

		Ok(self.hook.wrap_constructed(binding.type_literal(), raw))
	}

	fn run_deferred(&self, ready: Vec<DeferredInjection>) -> Result<(), Errors> {
		let mut errors = Errors::new();
		for injection in ready {
			let owner = Key::from(injection.point.declaring_type().clone());
			let Some(args) = injection.arguments() else {
				continue;
			};
			if let Err(e) = injection.point.inject(&injection.target, &args) {
				errors.push(DiError::provision(&owner, e));
			}
		}
		errors.into_result(())
	}
}

fn push_all(errors: &mut Errors, found: Errors, site: &str) {
	for error in found {
		errors.push(error.requested_by(site));
	}
}
