//! Configuration errors and their aggregation

use crate::binding::Source;
use crate::key::{Key, TypeLiteral};
use std::fmt;

/// A single configuration or provisioning problem.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
	/// No binding exists for the key and none could be created.
	#[error("{}", render_missing(.key, .hints, .requested_by))]
	MissingImplementation {
		key: Key,
		/// Pre-rendered "Did you mean?" lines.
		hints: Vec<String>,
		requested_by: Option<String>,
	},

	#[error("A binding to {key} was already configured at {first}.\n  at {second}")]
	DuplicateBinding {
		key: Key,
		first: Source,
		second: Source,
	},

	/// The type has no usable injection constructor.
	#[error("{message}\n  at {type_literal} (declared at {declared_at})")]
	Configuration {
		type_literal: TypeLiteral,
		message: String,
		declared_at: Source,
	},

	#[error("{variable} cannot be used as a key; it is not fully specified.\n  at {site}")]
	UnresolvedGenericType { variable: String, site: String },

	#[error(
		"Circular dependency detected while provisioning {key}\n  Path: {path}\n  Cycles through constructor parameters cannot be broken; inject one side through a field or method."
	)]
	CyclicDependency { key: Key, path: String },

	/// User construction code failed.
	#[error("Error provisioning {key}: {message}")]
	Provision { key: Key, message: String },

	#[error("Cannot access scoped object {key}; no {scope} scope is in progress.")]
	OutOfScope { key: Key, scope: String },

	#[error("Explicit bindings are required and {key} is not explicitly bound.")]
	ExplicitBindingRequired { key: Key },

	#[error(
		"Maximum resolution depth exceeded: {depth} while provisioning {key}\nThis likely indicates an extremely deep dependency chain."
	)]
	ResolutionDepthExceeded { key: Key, depth: usize },
}

fn render_missing(key: &Key, hints: &[String], requested_by: &Option<String>) -> String {
	let mut out = format!("No implementation for {} was bound.", key);
	if !hints.is_empty() {
		out.push_str("\n  Did you mean?");
		for hint in hints {
			out.push_str("\n    ");
			out.push_str(hint);
		}
	}
	if let Some(site) = requested_by {
		out.push_str("\n  Requested by: ");
		out.push_str(site);
	}
	out
}

impl DiError {
	pub(crate) fn provision(key: &Key, err: anyhow::Error) -> Self {
		Self::Provision {
			key: key.clone(),
			message: format!("{:#}", err),
		}
	}

	/// Attaches the injection point that required a missing key, unless one
	/// is already recorded.
	pub(crate) fn requested_by(self, site: &str) -> Self {
		match self {
			Self::MissingImplementation {
				key,
				hints,
				requested_by: None,
			} => Self::MissingImplementation {
				key,
				hints,
				requested_by: Some(site.to_string()),
			},
			other => other,
		}
	}

	/// The key a missing-implementation error is about.
	pub fn missing_key(&self) -> Option<&Key> {
		match self {
			Self::MissingImplementation { key, .. } => Some(key),
			_ => None,
		}
	}
}

/// Collects errors across a whole pass instead of stopping at the first one.
///
/// Identical messages are recorded once, and each missing key is reported
/// once with its first suggestion list.
#[derive(Debug, Clone, Default)]
pub struct Errors {
	errors: Vec<DiError>,
}

impl Errors {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, error: DiError) {
		if let Some(key) = error.missing_key()
			&& self.errors.iter().any(|e| e.missing_key() == Some(key))
		{
			return;
		}
		let message = error.to_string();
		if self.errors.iter().any(|e| e.to_string() == message) {
			return;
		}
		self.errors.push(error);
	}

	pub fn extend(&mut self, other: Errors) {
		for error in other.errors {
			self.push(error);
		}
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn len(&self) -> usize {
		self.errors.len()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, DiError> {
		self.errors.iter()
	}

	/// `Ok(value)` when nothing was collected.
	pub fn into_result<T>(self, value: T) -> Result<T, Errors> {
		if self.is_empty() {
			Ok(value)
		} else {
			Err(self)
		}
	}

	pub fn into_vec(self) -> Vec<DiError> {
		self.errors
	}
}

impl From<DiError> for Errors {
	fn from(error: DiError) -> Self {
		Self {
			errors: vec![error],
		}
	}
}

impl fmt::Display for Errors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, error) in self.errors.iter().enumerate() {
			if i > 0 {
				f.write_str("\n")?;
			}
			write!(f, "{}", error)?;
		}
		Ok(())
	}
}

impl IntoIterator for Errors {
	type Item = DiError;
	type IntoIter = std::vec::IntoIter<DiError>;

	fn into_iter(self) -> Self::IntoIter {
		self.errors.into_iter()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
	/// Raised while building the injector.
	Creation,
	/// Raised by a single lookup on an otherwise valid injector.
	Resolution,
}

/// The aggregate failure returned by public injector operations.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", render_report(.phase, .errors))]
pub struct ErrorReport {
	phase: ErrorPhase,
	errors: Vec<DiError>,
}

impl ErrorReport {
	pub(crate) fn new(phase: ErrorPhase, errors: Errors) -> Self {
		Self {
			phase,
			errors: errors.into_vec(),
		}
	}

	pub fn phase(&self) -> ErrorPhase {
		self.phase
	}

	pub fn errors(&self) -> &[DiError] {
		&self.errors
	}

	pub fn len(&self) -> usize {
		self.errors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	/// Whether any recorded error satisfies `predicate`.
	pub fn contains(&self, predicate: impl Fn(&DiError) -> bool) -> bool {
		self.errors.iter().any(predicate)
	}

	pub fn header(&self) -> &'static str {
		self.phase.header()
	}
}

impl ErrorPhase {
	pub fn header(self) -> &'static str {
		match self {
			Self::Creation => "Unable to create injector, see the following errors:",
			Self::Resolution => "Injector configuration errors:",
		}
	}
}

fn render_report(phase: &ErrorPhase, errors: &[DiError]) -> String {
	let mut out = String::from(phase.header());
	out.push_str("\n\n");
	for (i, error) in errors.iter().enumerate() {
		out.push_str(&format!("{}) {}\n\n", i + 1, error));
	}
	let count = errors.len();
	out.push_str(&format!(
		"{} error{}",
		count,
		if count == 1 { "" } else { "s" }
	));
	out
}

/// Result type for public injector operations.
pub type DiResult<T> = Result<T, ErrorReport>;
