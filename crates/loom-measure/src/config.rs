// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the measurement client.
//!
//! Sources are applied in order: defaults, then a TOML file, then
//! `LOOM_MEASURE_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hit::AppIdentity;

/// Default inactivity period after which a new session starts.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

const ENV_SAMPLE_RATE: &str = "LOOM_MEASURE_SAMPLE_RATE";
const ENV_SESSION_TIMEOUT: &str = "LOOM_MEASURE_SESSION_TIMEOUT_SECS";
const ENV_ENDPOINT: &str = "LOOM_MEASURE_ENDPOINT";
const ENV_DATA_DIR: &str = "LOOM_MEASURE_DATA_DIR";
const ENV_TRACKING_ID: &str = "LOOM_MEASURE_TRACKING_ID";
const ENV_APP_NAME: &str = "LOOM_MEASURE_APP_NAME";
const ENV_APP_VERSION: &str = "LOOM_MEASURE_APP_VERSION";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// I/O error reading config file
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// TOML parsing error
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// Environment variable error
	#[error("Environment error: {0}")]
	Env(String),

	/// Validation error
	#[error("Validation error: {0}")]
	Validation(String),

	/// No data directory could be determined
	#[error("could not determine data directory")]
	DataDirNotFound,
}

/// Settings for a [`MeasureClient`](crate::MeasureClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
	/// Percentage of new visitors to track, `[0, 100]`
	pub sample_rate: f64,
	/// Inactivity period after which the next hit starts a new session
	#[serde(with = "duration_secs")]
	pub session_timeout: Duration,
	/// Base URL hits are sent to
	pub endpoint: Option<String>,
	/// Directory for persisted client id and session state
	pub data_dir: Option<PathBuf>,
	/// Property the hits are attributed to, e.g. `UA-319000-10`
	pub tracking_id: Option<String>,
	pub app_name: Option<String>,
	pub app_version: Option<String>,
}

impl Default for MeasureConfig {
	fn default() -> Self {
		Self {
			sample_rate: 100.0,
			session_timeout: DEFAULT_SESSION_TIMEOUT,
			endpoint: None,
			data_dir: None,
			tracking_id: None,
			app_name: None,
			app_version: None,
		}
	}
}

impl MeasureConfig {
	/// Load configuration from defaults, an optional TOML file and the process
	/// environment.
	///
	/// A missing file is not an error.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let mut config = match path {
			Some(path) if path.exists() => Self::from_file(path)?,
			Some(path) => {
				tracing::debug!(path = %path.display(), "measure config file not found, using defaults");
				Self::default()
			}
			None => Self::default(),
		};

		config.apply_env(|key| std::env::var(key).ok())?;
		config.validate()?;
		Ok(config)
	}

	/// Parse a TOML config file.
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)?;
		toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Apply `LOOM_MEASURE_*` overrides read through `lookup`.
	pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(value) = lookup(ENV_SAMPLE_RATE) {
			self.sample_rate = value
				.trim()
				.parse()
				.map_err(|_| ConfigError::Env(format!("{ENV_SAMPLE_RATE} is not a number: {value}")))?;
		}

		if let Some(value) = lookup(ENV_SESSION_TIMEOUT) {
			let secs: u64 = value.trim().parse().map_err(|_| {
				ConfigError::Env(format!("{ENV_SESSION_TIMEOUT} is not a whole number: {value}"))
			})?;
			self.session_timeout = Duration::from_secs(secs);
		}

		if let Some(value) = lookup(ENV_ENDPOINT) {
			self.endpoint = Some(value);
		}

		if let Some(value) = lookup(ENV_DATA_DIR) {
			self.data_dir = Some(PathBuf::from(value));
		}

		if let Some(value) = lookup(ENV_TRACKING_ID) {
			self.tracking_id = Some(value);
		}

		if let Some(value) = lookup(ENV_APP_NAME) {
			self.app_name = Some(value);
		}

		if let Some(value) = lookup(ENV_APP_VERSION) {
			self.app_version = Some(value);
		}

		Ok(())
	}

	/// Reject values no client could run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.sample_rate.is_nan() {
			return Err(ConfigError::Validation(
				"sample_rate must be a number".to_string(),
			));
		}
		if self.session_timeout.is_zero() {
			return Err(ConfigError::Validation(
				"session_timeout must be greater than zero".to_string(),
			));
		}
		if let Some(endpoint) = &self.endpoint {
			url::Url::parse(endpoint)
				.map_err(|e| ConfigError::Validation(format!("endpoint {endpoint}: {e}")))?;
		}
		if let Some(tracking_id) = &self.tracking_id {
			if tracking_id.is_empty() || tracking_id.contains(char::is_whitespace) {
				return Err(ConfigError::Validation(format!(
					"tracking_id must be a single non-empty token, got {tracking_id:?}"
				)));
			}
		}
		match (&self.app_name, &self.app_version) {
			(Some(name), _) if name.trim().is_empty() => {
				return Err(ConfigError::Validation(
					"app_name must not be blank".to_string(),
				));
			}
			(None, Some(_)) => {
				return Err(ConfigError::Validation(
					"app_version requires app_name".to_string(),
				));
			}
			_ => {}
		}
		Ok(())
	}

	/// The property and application every hit is attributed to.
	pub fn app_identity(&self) -> AppIdentity {
		AppIdentity {
			tracking_id: self.tracking_id.clone(),
			app_name: self.app_name.clone(),
			app_version: self.app_version.clone(),
		}
	}

	/// The configured data directory, or `$XDG_DATA_HOME/loom/measure`.
	pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
		if let Some(dir) = &self.data_dir {
			return Ok(dir.clone());
		}
		dirs::data_dir()
			.map(|dir| dir.join("loom").join("measure"))
			.ok_or(ConfigError::DataDirNotFound)
	}
}

mod duration_secs {
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use std::time::Duration;

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		duration.as_secs().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let secs = u64::deserialize(deserializer)?;
		Ok(Duration::from_secs(secs))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::collections::HashMap;
	use std::io::Write;

	fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |key: &str| map.get(key).cloned()
	}

	#[test]
	fn test_defaults() {
		let config = MeasureConfig::default();
		assert_eq!(config.sample_rate, 100.0);
		assert_eq!(config.session_timeout, Duration::from_secs(1200));
		assert!(config.endpoint.is_none());
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"sample_rate = 25.0\nsession_timeout = 60\nendpoint = \"https://loom.example.com\""
		)
		.unwrap();

		let config = MeasureConfig::from_file(file.path()).unwrap();
		assert_eq!(config.sample_rate, 25.0);
		assert_eq!(config.session_timeout, Duration::from_secs(60));
		assert_eq!(config.endpoint.as_deref(), Some("https://loom.example.com"));
	}

	#[test]
	fn test_partial_file_keeps_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "sample_rate = 50.0").unwrap();

		let config = MeasureConfig::from_file(file.path()).unwrap();
		assert_eq!(config.sample_rate, 50.0);
		assert_eq!(config.session_timeout, DEFAULT_SESSION_TIMEOUT);
	}

	#[test]
	fn test_invalid_toml_reports_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "sample_rate = = 3").unwrap();

		let result = MeasureConfig::from_file(file.path());
		match result {
			Err(ConfigError::TomlParse { path, .. }) => assert_eq!(path, file.path()),
			other => panic!("expected TomlParse, got {other:?}"),
		}
	}

	#[test]
	fn test_env_overrides() {
		let mut config = MeasureConfig::default();
		config
			.apply_env(env(&[
				(ENV_SAMPLE_RATE, "12.5"),
				(ENV_SESSION_TIMEOUT, "90"),
				(ENV_ENDPOINT, "https://collect.example.com"),
				(ENV_DATA_DIR, "/tmp/measure"),
			]))
			.unwrap();

		assert_eq!(config.sample_rate, 12.5);
		assert_eq!(config.session_timeout, Duration::from_secs(90));
		assert_eq!(config.endpoint.as_deref(), Some("https://collect.example.com"));
		assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/measure")));
	}

	#[test]
	fn test_app_identity_from_file_and_env() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"tracking_id = \"UA-319000-10\"\napp_name = \"AppName\"\napp_version = \"1.2.3.4\""
		)
		.unwrap();

		let mut config = MeasureConfig::from_file(file.path()).unwrap();
		config
			.apply_env(env(&[(ENV_APP_VERSION, "1.2.3.5")]))
			.unwrap();
		config.validate().unwrap();

		let app = config.app_identity();
		assert_eq!(app.tracking_id.as_deref(), Some("UA-319000-10"));
		assert_eq!(app.app_name.as_deref(), Some("AppName"));
		assert_eq!(app.app_version.as_deref(), Some("1.2.3.5"));
	}

	#[test]
	fn test_env_sets_tracking_id() {
		let mut config = MeasureConfig::default();
		config
			.apply_env(env(&[(ENV_TRACKING_ID, "UA-1-1"), (ENV_APP_NAME, "Loom")]))
			.unwrap();
		assert_eq!(config.tracking_id.as_deref(), Some("UA-1-1"));
		assert_eq!(config.app_name.as_deref(), Some("Loom"));
	}

	#[test]
	fn test_validate_rejects_bad_tracking_id() {
		for bad in ["", "UA 1 1"] {
			let config = MeasureConfig {
				tracking_id: Some(bad.to_string()),
				..Default::default()
			};
			assert!(
				matches!(config.validate(), Err(ConfigError::Validation(_))),
				"accepted {bad:?}"
			);
		}
	}

	#[test]
	fn test_validate_rejects_version_without_name() {
		let config = MeasureConfig {
			app_version: Some("1.0".to_string()),
			..Default::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

		let blank = MeasureConfig {
			app_name: Some("  ".to_string()),
			..Default::default()
		};
		assert!(matches!(blank.validate(), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_env_rejects_bad_numbers() {
		let mut config = MeasureConfig::default();
		let result = config.apply_env(env(&[(ENV_SESSION_TIMEOUT, "soon")]));
		assert!(matches!(result, Err(ConfigError::Env(_))));
	}

	#[test]
	fn test_validate_rejects_zero_timeout() {
		let config = MeasureConfig {
			session_timeout: Duration::ZERO,
			..Default::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_validate_rejects_bad_endpoint() {
		let config = MeasureConfig {
			endpoint: Some("not a url".to_string()),
			..Default::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
	}

	proptest! {
		#[test]
		fn toml_written_config_loads_back(
			sample_rate in 0.0f64..=100.0,
			timeout_secs in 1u64..=86_400 * 365,
			tracking_id in proptest::option::of("UA-[0-9]{1,8}-[0-9]{1,2}"),
			app in proptest::option::of((
				"[A-Za-z][A-Za-z0-9 ]{0,15}",
				proptest::option::of("[0-9]{1,3}(\\.[0-9]{1,3}){0,3}"),
			)),
		) {
			let (app_name, app_version) = match app {
				Some((name, version)) => (Some(name), version),
				None => (None, None),
			};
			let config = MeasureConfig {
				sample_rate,
				session_timeout: Duration::from_secs(timeout_secs),
				endpoint: Some("https://loom.example.com".to_string()),
				data_dir: None,
				tracking_id,
				app_name,
				app_version,
			};

			let text = toml::to_string(&config).unwrap();
			let loaded: MeasureConfig = toml::from_str(&text).unwrap();

			prop_assert!(loaded.validate().is_ok());
			prop_assert_eq!(loaded, config);
		}

		#[test]
		fn env_overrides_parse_what_they_print(
			sample_rate in 0.0f64..=100.0,
			timeout_secs in 1u64..=u64::from(u32::MAX),
		) {
			let mut config = MeasureConfig::default();
			config
				.apply_env(env(&[
					(ENV_SAMPLE_RATE, sample_rate.to_string().as_str()),
					(ENV_SESSION_TIMEOUT, timeout_secs.to_string().as_str()),
				]))
				.unwrap();

			prop_assert_eq!(config.sample_rate, sample_rate);
			prop_assert_eq!(config.session_timeout, Duration::from_secs(timeout_secs));
			prop_assert!(config.validate().is_ok());
		}
	}

	#[test]
	fn test_explicit_data_dir_wins() {
		let config = MeasureConfig {
			data_dir: Some(PathBuf::from("/var/lib/measure")),
			..Default::default()
		};
		assert_eq!(
			config.resolve_data_dir().unwrap(),
			PathBuf::from("/var/lib/measure")
		);
	}
}
