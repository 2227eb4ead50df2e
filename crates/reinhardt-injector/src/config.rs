//! Injector configuration
//!
//! Settings can be built in code, parsed from TOML or read from environment
//! variables.
//!
//! ```
//! use reinhardt_injector::{InjectorConfig, Stage};
//!
//! let config = InjectorConfig::from_toml_str(
//!     r#"
//!     stage = "production"
//!     max_suggestions = 5
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.stage, Stage::Production);
//! assert!(!config.require_explicit_bindings);
//! assert_eq!(config.max_suggestions, 5);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default cap on "Did you mean?" entries per missing key.
pub const DEFAULT_MAX_SUGGESTIONS: usize = 3;

/// Application stage the injector runs in.
///
/// The stage is bound as an instance so application code can inspect it.
/// `Production` additionally builds every singleton while the injector is
/// created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
	#[default]
	Development,
	Production,
	Tool,
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Development => "DEVELOPMENT",
			Self::Production => "PRODUCTION",
			Self::Tool => "TOOL",
		})
	}
}

impl FromStr for Stage {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"development" => Ok(Self::Development),
			"production" => Ok(Self::Production),
			"tool" => Ok(Self::Tool),
			_ => Err(ConfigError::InvalidValue {
				name: "stage",
				value: s.to_string(),
			}),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid injector configuration: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("Invalid value for {name}: {value}")]
	InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
	pub stage: Stage,

	/// Refuse just-in-time bindings; every key must be bound by a module.
	pub require_explicit_bindings: bool,

	/// Cap on "Did you mean?" entries per missing key.
	pub max_suggestions: usize,
}

impl Default for InjectorConfig {
	fn default() -> Self {
		Self {
			stage: Stage::default(),
			require_explicit_bindings: false,
			max_suggestions: DEFAULT_MAX_SUGGESTIONS,
		}
	}
}

impl InjectorConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a TOML document. Missing fields keep their defaults.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(source)?)
	}

	/// Load settings from environment variables
	///
	/// Reads `REINHARDT_INJECTOR_STAGE`, `REINHARDT_INJECTOR_REQUIRE_EXPLICIT_BINDINGS`
	/// and `REINHARDT_INJECTOR_MAX_SUGGESTIONS` on top of the defaults.
	pub fn from_env() -> Result<Self, ConfigError> {
		let mut config = Self::default();

		if let Ok(stage) = std::env::var("REINHARDT_INJECTOR_STAGE") {
			config.stage = stage.parse()?;
		}

		if let Ok(explicit) = std::env::var("REINHARDT_INJECTOR_REQUIRE_EXPLICIT_BINDINGS") {
			config.require_explicit_bindings = explicit.to_lowercase() == "true" || explicit == "1";
		}

		if let Ok(max) = std::env::var("REINHARDT_INJECTOR_MAX_SUGGESTIONS") {
			config.max_suggestions = max.trim().parse().map_err(|_| ConfigError::InvalidValue {
				name: "max_suggestions",
				value: max.clone(),
			})?;
		}

		Ok(config)
	}

	pub fn with_stage(mut self, stage: Stage) -> Self {
		self.stage = stage;
		self
	}

	pub fn with_require_explicit_bindings(mut self, require: bool) -> Self {
		self.require_explicit_bindings = require;
		self
	}

	pub fn with_max_suggestions(mut self, max: usize) -> Self {
		self.max_suggestions = max;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_empty_document_uses_defaults() {
		// Act
		let config = InjectorConfig::from_toml_str("").unwrap();

		// Assert
		assert_eq!(config, InjectorConfig::default());
		assert_eq!(config.max_suggestions, DEFAULT_MAX_SUGGESTIONS);
	}

	#[rstest]
	fn test_full_document() {
		// Arrange
		let source = r#"
			stage = "tool"
			require_explicit_bindings = true
			max_suggestions = 1
		"#;

		// Act
		let config = InjectorConfig::from_toml_str(source).unwrap();

		// Assert
		assert_eq!(config.stage, Stage::Tool);
		assert!(config.require_explicit_bindings);
		assert_eq!(config.max_suggestions, 1);
	}

	#[rstest]
	fn test_unknown_stage_rejected() {
		// Act
		let result = InjectorConfig::from_toml_str(r#"stage = "staging""#);

		// Assert
		assert!(matches!(result, Err(ConfigError::Parse(_))));
	}

	#[rstest]
	#[case("production", Stage::Production)]
	#[case("DEVELOPMENT", Stage::Development)]
	#[case("Tool", Stage::Tool)]
	fn test_stage_from_str(#[case] input: &str, #[case] expected: Stage) {
		assert_eq!(input.parse::<Stage>().unwrap(), expected);
	}

	#[rstest]
	fn test_builders_override_fields() {
		// Act
		let config = InjectorConfig::new()
			.with_stage(Stage::Production)
			.with_require_explicit_bindings(true)
			.with_max_suggestions(0);

		// Assert
		assert_eq!(config.stage, Stage::Production);
		assert!(config.require_explicit_bindings);
		assert_eq!(config.max_suggestions, 0);
	}
}
