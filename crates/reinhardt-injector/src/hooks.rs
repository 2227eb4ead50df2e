//! Construction hooks

use crate::instance::Instance;
use crate::key::TypeLiteral;

/// Cross-cutting behaviour around constructed instances.
///
/// `on_type_encountered` runs once per distinct type the injector prepares a
/// constructor binding for. `wrap_constructed` runs once per construction,
/// after member injection, and its return value is what dependents receive.
pub trait ConstructionHook: Send + Sync {
	fn on_type_encountered(&self, _type_literal: &TypeLiteral) {}

	fn wrap_constructed(&self, _type_literal: &TypeLiteral, instance: Instance) -> Instance {
		instance
	}
}

/// Leaves every instance untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl ConstructionHook for NoopHook {}
