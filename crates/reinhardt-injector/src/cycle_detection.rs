//! Per-resolution cycle detection and proxy back-filling
//!
//! Every top-level lookup owns one [`ResolutionState`]. It tracks the keys
//! currently being constructed so that:
//!
//! - a key requested again through a constructor parameter is reported as an
//!   unbreakable cycle,
//! - a key requested again through a field or method receives a
//!   [`ProxyHandle`] that is filled in once the real instance exists, and the
//!   member injection waiting on it runs at that moment.
//!
//! State never outlives the call tree that created it, so unrelated concurrent
//! lookups cannot observe each other's in-progress keys. A member dependency
//! that another call tree is constructing gets a proxy as well; the top-level
//! lookup fills it once that construction finishes.

use crate::error::{DiError, Errors};
use crate::instance::Instance;
use crate::key::Key;
use crate::selector::InjectionPoint;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Maximum resolution depth (prevents pathological cases)
pub(crate) const MAX_RESOLUTION_DEPTH: usize = 256;

/// Identity of one top-level lookup and its call tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ResolutionId(u64);

impl ResolutionId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// Forward reference to an instance that is still under construction.
#[derive(Clone)]
pub(crate) struct ProxyHandle {
	key: Key,
	target: Arc<OnceLock<Instance>>,
}

impl ProxyHandle {
	pub(crate) fn key(&self) -> &Key {
		&self.key
	}

	pub(crate) fn is_resolved(&self) -> bool {
		self.target.get().is_some()
	}

	pub(crate) fn get(&self) -> Option<Instance> {
		self.target.get().cloned()
	}

	fn resolve(&self, instance: &Instance) {
		// A handle is only ever filled by the completion of its own key.
		let _ = self.target.set(instance.clone());
	}
}

/// Outcome of resolving one dependency.
#[derive(Clone)]
pub(crate) enum Resolved {
	Ready(Instance),
	Pending(ProxyHandle),
}

impl Resolved {
	pub(crate) fn instance(&self) -> Option<Instance> {
		match self {
			Self::Ready(instance) => Some(instance.clone()),
			Self::Pending(handle) => handle.get(),
		}
	}

	pub(crate) fn is_ready(&self) -> bool {
		match self {
			Self::Ready(_) => true,
			Self::Pending(handle) => handle.is_resolved(),
		}
	}
}

/// A member injection postponed until every proxy argument is filled.
pub(crate) struct DeferredInjection {
	pub(crate) target: Instance,
	pub(crate) point: InjectionPoint,
	pub(crate) args: Vec<Resolved>,
}

impl DeferredInjection {
	fn is_ready(&self) -> bool {
		self.args.iter().all(Resolved::is_ready)
	}

	/// The argument instances, once every proxy has been filled.
	pub(crate) fn arguments(&self) -> Option<Vec<Instance>> {
		self.args.iter().map(Resolved::instance).collect()
	}
}

pub(crate) struct ResolutionState {
	id: ResolutionId,
	/// Set once the lookup has touched the shared singleton table
	shared: bool,
	/// Keys currently being constructed (O(1) cycle check)
	in_progress: HashSet<Key>,
	/// Construction stack, for rendering cycle paths
	path: Vec<Key>,
	proxies: HashMap<Key, Vec<ProxyHandle>>,
	deferred: Vec<DeferredInjection>,
	/// Keys whose proxies wait on a construction in another call tree
	elsewhere: HashSet<Key>,
}

impl ResolutionState {
	pub(crate) fn new() -> Self {
		Self {
			id: ResolutionId::next(),
			shared: false,
			in_progress: HashSet::new(),
			path: Vec::new(),
			proxies: HashMap::new(),
			deferred: Vec::new(),
			elsewhere: HashSet::new(),
		}
	}

	pub(crate) fn id(&self) -> ResolutionId {
		self.id
	}

	pub(crate) fn is_shared(&self) -> bool {
		self.shared
	}

	pub(crate) fn mark_shared(&mut self) {
		self.shared = true;
	}

	/// No member injection is waiting on a proxy.
	pub(crate) fn is_settled(&self) -> bool {
		self.deferred.is_empty()
	}

	pub(crate) fn is_in_progress(&self, key: &Key) -> bool {
		self.in_progress.contains(key)
	}

	pub(crate) fn depth(&self) -> usize {
		self.path.len()
	}

	/// Runs `f` with `key` marked in progress. The mark is removed whether or
	/// not `f` succeeds.
	pub(crate) fn with_resolution<T>(
		&mut self,
		key: &Key,
		f: impl FnOnce(&mut Self) -> Result<T, Errors>,
	) -> Result<T, Errors> {
		if self.depth() >= MAX_RESOLUTION_DEPTH {
			return Err(DiError::ResolutionDepthExceeded {
				key: key.clone(),
				depth: self.depth() + 1,
			}
			.into());
		}
		self.in_progress.insert(key.clone());
		self.path.push(key.clone());

		let result = f(self);

		self.in_progress.remove(key);
		if let Some(pos) = self.path.iter().rposition(|k| k == key) {
			self.path.remove(pos);
		}
		result
	}

	/// Renders the construction stack from the first occurrence of `key`,
	/// e.g. `A -> B -> A`.
	pub(crate) fn cycle_path(&self, key: &Key) -> String {
		match self.path.iter().position(|k| k == key) {
			Some(start) => {
				let mut names: Vec<String> = self.path[start..].iter().map(ToString::to_string).collect();
				names.push(key.to_string());
				names.join(" -> ")
			}
			None => format!("Unknown cycle involving {}", key),
		}
	}

	/// Renders the construction stack followed by `key`, for cycles that
	/// close through a construction on another thread.
	pub(crate) fn path_through(&self, key: &Key) -> String {
		self.path
			.iter()
			.chain(std::iter::once(key))
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join(" -> ")
	}

	pub(crate) fn issue_proxy(&mut self, key: &Key) -> ProxyHandle {
		let handle = ProxyHandle {
			key: key.clone(),
			target: Arc::new(OnceLock::new()),
		};
		self.proxies
			.entry(key.clone())
			.or_default()
			.push(handle.clone());
		tracing::trace!(key = %key, "proxy issued for in-progress key");
		handle
	}

	/// A proxy for `key` while another call tree constructs it.
	pub(crate) fn issue_remote_proxy(&mut self, key: &Key) -> ProxyHandle {
		self.elsewhere.insert(key.clone());
		self.issue_proxy(key)
	}

	/// A key whose proxies still wait on another call tree.
	pub(crate) fn next_elsewhere(&self) -> Option<Key> {
		self.elsewhere.iter().next().cloned()
	}

	pub(crate) fn defer(&mut self, injection: DeferredInjection) {
		self.deferred.push(injection);
	}

	/// Fills every proxy issued for `key` and hands back the deferred
	/// injections that no longer wait on anything.
	pub(crate) fn complete(&mut self, key: &Key, instance: &Instance) -> Vec<DeferredInjection> {
		self.elsewhere.remove(key);
		let Some(handles) = self.proxies.remove(key) else {
			return Vec::new();
		};
		for handle in &handles {
			handle.resolve(instance);
		}
		tracing::trace!(key = %key, proxies = handles.len(), "proxies back-filled");

		let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.deferred)
			.into_iter()
			.partition(DeferredInjection::is_ready);
		self.deferred = waiting;
		ready
	}

	/// Proxies that were issued but never filled.
	pub(crate) fn unresolved(&self) -> Vec<Key> {
		self.proxies
			.iter()
			.filter(|(_, handles)| handles.iter().any(|h| !h.is_resolved()))
			.map(|(key, _)| key.clone())
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::{MemberDecl, Parameter, TypeDescriptor};
	use crate::key::TypeLiteral;
	use crate::selector::ConstructorSelector;
	use rstest::rstest;

	fn member_point() -> InjectionPoint {
		let descriptor = TypeDescriptor::concrete("B").member(MemberDecl::field(
			"a",
			Parameter::of("A"),
			|_, _| Ok(()),
		));
		ConstructorSelector::members(&descriptor, &TypeLiteral::class("B"))
			.unwrap()
			.remove(0)
	}

	#[rstest]
	fn test_in_progress_cleared_after_resolution() {
		// Arrange
		let mut state = ResolutionState::new();
		let a = Key::of("A");

		// Act
		let inside = state
			.with_resolution(&a, |s| Ok(s.is_in_progress(&a)))
			.unwrap();

		// Assert
		assert!(inside);
		assert!(!state.is_in_progress(&a));
		assert_eq!(state.depth(), 0);
	}

	#[rstest]
	fn test_in_progress_cleared_after_failure() {
		// Arrange
		let mut state = ResolutionState::new();
		let a = Key::of("A");

		// Act
		let result: Result<(), Errors> = state.with_resolution(&a, |_| {
			Err(DiError::ExplicitBindingRequired { key: Key::of("A") }.into())
		});

		// Assert
		assert!(result.is_err());
		assert!(!state.is_in_progress(&a));
	}

	#[rstest]
	fn test_cycle_path_rendering() {
		// Arrange
		let mut state = ResolutionState::new();
		let (a, b) = (Key::of("A"), Key::of("B"));

		// Act
		let path = state
			.with_resolution(&a, |s| s.with_resolution(&b, |s| Ok(s.cycle_path(&a))))
			.unwrap();

		// Assert
		assert_eq!(path, "A -> B -> A");
	}

	#[rstest]
	fn test_depth_limit() {
		// Arrange
		fn descend(state: &mut ResolutionState, n: usize) -> Result<(), Errors> {
			let key = Key::of(format!("T{}", n).as_str());
			state.with_resolution(&key, |s| descend(s, n + 1))
		}
		let mut state = ResolutionState::new();

		// Act
		let result = descend(&mut state, 0);

		// Assert
		let message = result.err().map(|e| e.to_string()).unwrap_or_default();
		assert!(message.contains("Maximum resolution depth exceeded"));
		assert_eq!(state.depth(), 0);
	}

	#[rstest]
	fn test_remote_proxy_tracked_until_completed() {
		// Arrange
		let mut state = ResolutionState::new();
		let owner = Key::of("Owner");
		let proxy = state.issue_remote_proxy(&owner);
		state.defer(DeferredInjection {
			target: Instance::new("part"),
			point: member_point(),
			args: vec![Resolved::Pending(proxy)],
		});

		// Act
		let before = state.next_elsewhere();
		let settled_before = state.is_settled();
		let ready = state.complete(&owner, &Instance::new("owner"));

		// Assert
		assert_eq!(before, Some(owner));
		assert!(!settled_before);
		assert_eq!(ready.len(), 1);
		assert!(state.next_elsewhere().is_none());
		assert!(state.is_settled());
	}

	#[rstest]
	fn test_path_through_other_call_tree() {
		// Arrange
		let mut state = ResolutionState::new();
		let part = Key::of("Part");

		// Act
		let path = state
			.with_resolution(&part, |s| Ok(s.path_through(&Key::of("Owner"))))
			.unwrap();

		// Assert
		assert_eq!(path, "Part -> Owner");
		assert_ne!(state.id(), ResolutionState::new().id());
	}

	#[rstest]
	fn test_completion_fills_proxies_and_releases_deferred() {
		// Arrange
		let mut state = ResolutionState::new();
		let a = Key::of("A");
		let proxy = state.issue_proxy(&a);
		state.defer(DeferredInjection {
			target: Instance::new("b"),
			point: member_point(),
			args: vec![Resolved::Pending(proxy.clone())],
		});
		let real = Instance::new("a");

		// Act
		assert_eq!(state.unresolved(), vec![a.clone()]);
		let ready = state.complete(&a, &real);

		// Assert
		assert_eq!(proxy.key(), &a);
		assert!(proxy.get().is_some_and(|p| p.ptr_eq(&real)));
		assert_eq!(ready.len(), 1);
		let args = ready[0].arguments().unwrap();
		assert!(args[0].ptr_eq(&real));
		assert!(state.unresolved().is_empty());
	}
}
