//! Instance scopes
//!
//! A [`Scope`] decides how long an instance produced by a binding is reused.
//! The [`ScopeManager`] owns the per-binding caches for the built-in scopes and
//! hands custom scopes their own lifetime management.

use crate::binding::Binding;
use crate::config::Stage;
use crate::cycle_detection::{ResolutionId, ResolutionState};
use crate::error::{DiError, Errors};
use crate::instance::Instance;
use crate::key::Key;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Caching policy of a binding.
#[derive(Clone)]
pub enum Scope {
	/// A new instance for every request.
	NoScope,
	/// One instance per binding, created on first use.
	Singleton,
	/// One instance per binding, created while the injector is being built.
	EagerSingleton,
	/// A scope whose lifetime is managed outside the injector.
	Custom(Arc<dyn CustomScope>),
}

impl Scope {
	pub fn custom(scope: impl CustomScope + 'static) -> Self {
		Self::Custom(Arc::new(scope))
	}

	/// Whether at most one instance exists per binding.
	pub fn is_singleton(&self) -> bool {
		matches!(self, Self::Singleton | Self::EagerSingleton)
	}

	/// Whether the binding is constructed when the injector is built.
	pub fn is_eager(&self, stage: Stage) -> bool {
		match self {
			Self::EagerSingleton => true,
			Self::Singleton => stage == Stage::Production,
			_ => false,
		}
	}

	pub fn name(&self) -> &str {
		match self {
			Self::NoScope => "NoScope",
			Self::Singleton => "Singleton",
			Self::EagerSingleton => "EagerSingleton",
			Self::Custom(scope) => scope.name(),
		}
	}
}

impl PartialEq for Scope {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::NoScope, Self::NoScope)
			| (Self::Singleton, Self::Singleton)
			| (Self::EagerSingleton, Self::EagerSingleton) => true,
			(Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl fmt::Debug for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Custom(scope) => write!(f, "Custom({})", scope.name()),
			other => f.write_str(other.name()),
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Externally managed scope lifetime.
///
/// `create` builds a fresh instance; implementations decide whether to call
/// it or return a cached value.
pub trait CustomScope: Send + Sync {
	fn name(&self) -> &str;

	fn enter(&self);

	fn exit(&self);

	fn get_or_create(
		&self,
		key: &Key,
		create: &mut dyn FnMut() -> Result<Instance, Errors>,
	) -> Result<Instance, Errors>;
}

/// A custom scope that caches one instance per key between `enter` and
/// `exit`.
///
/// # Examples
///
/// ```
/// use reinhardt_injector::{CustomScope, Instance, Key, SimpleScope};
///
/// let scope = SimpleScope::new("Batch");
/// scope.enter();
/// let first = scope.get_or_create(&Key::of("Job"), &mut || Ok(Instance::new(1_u32))).unwrap();
/// let again = scope.get_or_create(&Key::of("Job"), &mut || Ok(Instance::new(2_u32))).unwrap();
/// assert!(first.ptr_eq(&again));
/// scope.exit();
/// ```
pub struct SimpleScope {
	name: Arc<str>,
	entries: RwLock<Option<HashMap<Key, Instance>>>,
}

impl SimpleScope {
	pub fn new(name: impl Into<Arc<str>>) -> Self {
		Self {
			name: name.into(),
			entries: RwLock::new(None),
		}
	}

	pub fn is_active(&self) -> bool {
		self.entries.read().is_some()
	}
}

impl CustomScope for SimpleScope {
	fn name(&self) -> &str {
		&self.name
	}

	fn enter(&self) {
		let mut entries = self.entries.write();
		if entries.is_none() {
			*entries = Some(HashMap::new());
		}
	}

	fn exit(&self) {
		*self.entries.write() = None;
	}

	fn get_or_create(
		&self,
		key: &Key,
		create: &mut dyn FnMut() -> Result<Instance, Errors>,
	) -> Result<Instance, Errors> {
		match self.entries.read().as_ref() {
			Some(entries) => {
				if let Some(instance) = entries.get(key) {
					return Ok(instance.clone());
				}
			}
			None => {
				return Err(DiError::OutOfScope {
					key: key.clone(),
					scope: self.name.to_string(),
				}
				.into());
			}
		}

		// Built without holding the lock; nested keys of the same scope may be
		// created from inside `create`.
		let created = create()?;
		let mut entries = self.entries.write();
		match entries.as_mut() {
			Some(entries) => Ok(entries.entry(key.clone()).or_insert(created).clone()),
			None => Err(DiError::OutOfScope {
				key: key.clone(),
				scope: self.name.to_string(),
			}
			.into()),
		}
	}
}

impl fmt::Debug for SimpleScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SimpleScope")
			.field("name", &self.name)
			.field("active", &self.is_active())
			.finish()
	}
}

/// A singleton that has been claimed but is not yet visible to every caller.
enum SlotState {
	/// The owning lookup is running the constructor.
	Building(ResolutionId),
	/// Constructed; members of its cyclic group may still be injecting into it.
	Built(ResolutionId, Instance),
}

struct Member {
	group: ResolutionId,
	settled: bool,
}

/// Bookkeeping for singletons under construction.
///
/// Lookups that hand each other unpublished instances form a group. A group
/// publishes all of its instances at once, when none of its lookups has a
/// member injection left waiting on a proxy.
#[derive(Default)]
struct Construction {
	slots: HashMap<Key, SlotState>,
	/// Lookup blocked on a singleton another lookup is building
	waiting: HashMap<ResolutionId, ResolutionId>,
	members: HashMap<ResolutionId, Member>,
	/// Groups one of whose lookups failed after handing out instances
	poisoned: HashSet<ResolutionId>,
}

impl Construction {
	fn enter(&mut self, id: ResolutionId, settled: bool) {
		self.members
			.entry(id)
			.or_insert(Member { group: id, settled })
			.settled = settled;
	}

	fn leave(&mut self, id: ResolutionId) {
		self.members.remove(&id);
		self.waiting.remove(&id);
		let members = &self.members;
		self.poisoned
			.retain(|group| members.values().any(|m| m.group == *group));
	}

	fn group_of(&self, id: ResolutionId) -> ResolutionId {
		self.members.get(&id).map_or(id, |m| m.group)
	}

	fn join(&mut self, id: ResolutionId, owner: ResolutionId) {
		let (into, from) = (self.group_of(owner), self.group_of(id));
		if into == from {
			return;
		}
		for member in self.members.values_mut() {
			if member.group == from {
				member.group = into;
			}
		}
		if self.poisoned.remove(&from) {
			self.poisoned.insert(into);
		}
	}

	/// Whether `owner` waits, directly or through other lookups, on `id`.
	fn waits_on(&self, owner: ResolutionId, id: ResolutionId) -> bool {
		let mut current = owner;
		for _ in 0..=self.waiting.len() {
			if current == id {
				return true;
			}
			match self.waiting.get(&current) {
				Some(next) => current = *next,
				None => return false,
			}
		}
		false
	}

	fn is_settled(&self, group: ResolutionId) -> bool {
		self.members
			.values()
			.filter(|m| m.group == group)
			.all(|m| m.settled)
	}

	fn has_unpublished(&self, group: ResolutionId) -> bool {
		self.slots.values().any(|slot| match slot {
			SlotState::Built(owner, _) => self.group_of(*owner) == group,
			SlotState::Building(_) => false,
		})
	}

	/// Moves every instance built by `group` to `ready` and dissolves the
	/// group. Returns whether anything was published.
	fn publish(&mut self, group: ResolutionId, ready: &mut HashMap<Key, Instance>) -> bool {
		let keys: Vec<Key> = self
			.slots
			.iter()
			.filter_map(|(key, slot)| match slot {
				SlotState::Built(owner, _) if self.group_of(*owner) == group => Some(key.clone()),
				_ => None,
			})
			.collect();
		for key in &keys {
			if let Some(SlotState::Built(_, instance)) = self.slots.remove(key) {
				tracing::trace!(key = %key, "singleton published");
				ready.insert(key.clone(), instance);
			}
		}
		for (id, member) in self.members.iter_mut() {
			if member.group == group {
				member.group = *id;
			}
		}
		!keys.is_empty()
	}
}

enum Lookup {
	Found(Instance),
	Vacant,
	Building(ResolutionId),
}

/// Outcome of asking for a singleton that is not published yet.
pub(crate) enum Claim {
	/// Published, or built by a lookup the caller is now grouped with.
	Existing(Instance),
	/// The caller owns the construction and must report `built` or `abandon`.
	Build,
	/// Another lookup is building it and the caller chose not to wait.
	Elsewhere,
	/// Waiting would close a cycle through another lookup's constructor.
	Deadlock,
}

/// Per-binding instance caches for the singleton scopes.
///
/// Constructors run without any lock held. A lookup that needs a singleton
/// another lookup is constructing either waits for it or, at a member
/// injection point, continues with a proxy. Callers outside a cyclic group
/// only ever see singletons whose member injections have all completed.
#[derive(Default)]
pub struct ScopeManager {
	ready: RwLock<HashMap<Key, Instance>>,
	construction: Mutex<Construction>,
	changed: Condvar,
}

impl ScopeManager {
	pub fn new() -> Self {
		Self::default()
	}

	/// The published instance for a singleton binding.
	pub fn cached(&self, binding: &Binding) -> Option<Instance> {
		if !binding.scope().is_singleton() {
			return None;
		}
		self.ready.read().get(binding.key()).cloned()
	}

	fn lookup(&self, table: &mut Construction, key: &Key, id: ResolutionId) -> Lookup {
		if let Some(instance) = self.ready.read().get(key) {
			return Lookup::Found(instance.clone());
		}
		let slot = table.slots.get(key).map(|slot| match slot {
			SlotState::Building(owner) => (*owner, None),
			SlotState::Built(owner, instance) => (*owner, Some(instance.clone())),
		});
		match slot {
			None => Lookup::Vacant,
			Some((owner, Some(instance))) => {
				table.join(id, owner);
				Lookup::Found(instance)
			}
			Some((owner, None)) => Lookup::Building(owner),
		}
	}

	/// Claims the construction of a singleton, or hands back an instance
	/// someone else built. With `wait` unset a construction in another lookup
	/// is reported as [`Claim::Elsewhere`] instead of blocking.
	pub(crate) fn claim(&self, binding: &Binding, state: &mut ResolutionState, wait: bool) -> Claim {
		state.mark_shared();
		let key = binding.key();
		let id = state.id();
		let mut table = self.construction.lock();
		table.enter(id, state.is_settled());
		loop {
			match self.lookup(&mut table, key, id) {
				Lookup::Found(instance) => return Claim::Existing(instance),
				Lookup::Vacant => {
					table.slots.insert(key.clone(), SlotState::Building(id));
					return Claim::Build;
				}
				Lookup::Building(_) if !wait => return Claim::Elsewhere,
				Lookup::Building(owner) => {
					if table.waits_on(owner, id) {
						return Claim::Deadlock;
					}
					table.waiting.insert(id, owner);
					tracing::trace!(key = %key, "waiting for singleton under construction");
					self.changed.wait(&mut table);
					table.waiting.remove(&id);
				}
			}
		}
	}

	/// Records the constructed instance of a claimed singleton. It becomes
	/// visible to other callers when its group is published.
	pub(crate) fn built(&self, key: &Key, state: &ResolutionState, instance: Instance) {
		let mut table = self.construction.lock();
		table.enter(state.id(), state.is_settled());
		table.slots.insert(key.clone(), SlotState::Built(state.id(), instance));
		self.changed.notify_all();
	}

	/// Releases a claim whose construction did not produce an instance.
	pub(crate) fn abandon(&self, key: &Key, state: &ResolutionState) {
		let mut table = self.construction.lock();
		if matches!(table.slots.get(key), Some(SlotState::Building(owner)) if *owner == state.id()) {
			table.slots.remove(key);
			self.changed.notify_all();
		}
	}

	/// Updates whether the lookup still waits on proxies, publishing its
	/// group once every lookup in it is settled.
	pub(crate) fn settle(&self, state: &ResolutionState) {
		if !state.is_shared() {
			return;
		}
		let mut table = self.construction.lock();
		table.enter(state.id(), state.is_settled());
		self.try_publish(&mut table, state.id());
	}

	fn try_publish(&self, table: &mut Construction, id: ResolutionId) {
		let group = table.group_of(id);
		if table.is_settled(group)
			&& !table.poisoned.contains(&group)
			&& table.publish(group, &mut self.ready.write())
		{
			self.changed.notify_all();
		}
	}

	/// Blocks until a singleton built by another lookup has an instance.
	/// Returns `None` when that construction was abandoned.
	pub(crate) fn await_elsewhere(&self, key: &Key, state: &ResolutionState) -> Option<Instance> {
		let id = state.id();
		let mut table = self.construction.lock();
		table.enter(id, state.is_settled());
		loop {
			match self.lookup(&mut table, key, id) {
				Lookup::Found(instance) => return Some(instance),
				Lookup::Vacant => return None,
				// A lookup waiting here builds nothing, so no one else waits on it.
				Lookup::Building(owner) => {
					table.waiting.insert(id, owner);
					self.changed.wait(&mut table);
					table.waiting.remove(&id);
				}
			}
		}
	}

	/// Waits until every singleton the lookup built or borrowed is
	/// published, then forgets the lookup. Returns `false` when another
	/// lookup in its group failed.
	pub(crate) fn finish(&self, state: &ResolutionState) -> bool {
		if !state.is_shared() {
			return true;
		}
		let id = state.id();
		let mut table = self.construction.lock();
		table.enter(id, true);
		loop {
			let group = table.group_of(id);
			if table.poisoned.contains(&group) {
				return false;
			}
			if !table.has_unpublished(group) {
				table.leave(id);
				return true;
			}
			self.try_publish(&mut table, id);
			if table.has_unpublished(table.group_of(id)) {
				self.changed.wait(&mut table);
			}
		}
	}

	/// Drops everything a failed lookup still holds.
	pub(crate) fn fail(&self, state: &ResolutionState) {
		if !state.is_shared() {
			return;
		}
		let id = state.id();
		let mut table = self.construction.lock();
		let group = table.group_of(id);
		table.slots.retain(|_, slot| match slot {
			SlotState::Building(owner) | SlotState::Built(owner, _) => *owner != id,
		});
		if table.members.iter().any(|(other, m)| *other != id && m.group == group) {
			tracing::debug!("singleton group poisoned by a failed lookup");
			table.poisoned.insert(group);
		}
		table.leave(id);
		self.changed.notify_all();
	}
}
