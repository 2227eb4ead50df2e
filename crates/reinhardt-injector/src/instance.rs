//! Type-erased instances and providers

use std::any::Any;
use std::fmt;
use std::sync::Arc;

type ArcAny = Arc<dyn Any + Send + Sync>;

/// A shared, type-erased object produced by the injector.
///
/// Cloning an `Instance` clones the pointer, never the object, so identity
/// can be compared with [`Instance::ptr_eq`].
#[derive(Clone)]
pub struct Instance(ArcAny);

impl Instance {
	pub fn new<T: Any + Send + Sync>(value: T) -> Self {
		Self(Arc::new(value))
	}

	pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
		Self(value)
	}

	/// Wraps a provider so it can travel through the graph as a dependency.
	pub fn provider<P: Provider + 'static>(provider: P) -> Self {
		Self::new(ProviderHandle(Arc::new(provider)))
	}

	/// Downcasts to a shared pointer of the concrete type.
	pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.0.clone().downcast::<T>().ok()
	}

	pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
		self.0.downcast_ref::<T>()
	}

	pub fn is<T: Any + Send + Sync>(&self) -> bool {
		self.0.is::<T>()
	}

	/// Returns the provider when this instance was built with [`Instance::provider`].
	pub fn as_provider(&self) -> Option<Arc<dyn Provider>> {
		self.downcast_ref::<ProviderHandle>().map(|h| h.0.clone())
	}

	pub fn ptr_eq(&self, other: &Instance) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for Instance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Instance({:p})", Arc::as_ptr(&self.0))
	}
}

/// A factory for instances.
pub trait Provider: Send + Sync {
	fn get(&self) -> anyhow::Result<Instance>;
}

impl<F> Provider for F
where
	F: Fn() -> anyhow::Result<Instance> + Send + Sync,
{
	fn get(&self) -> anyhow::Result<Instance> {
		self()
	}
}

struct ProviderHandle(Arc<dyn Provider>);
