// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File-backed key-value store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use loom_measure_core::{KeyValueStore, SessionsError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, MeasureConfig};

const STORE_FILE: &str = "store.json";

/// Persists string values as one JSON object in `store.json`.
///
/// Writes go to a temporary file that is then renamed over the original, so
/// a crash mid-write leaves the previous contents intact.
pub struct FileStore {
	dir: PathBuf,
	lock: Mutex<()>,
}

impl FileStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
			lock: Mutex::new(()),
		}
	}

	/// Opens the store in the configured data directory, creating it if
	/// needed. Falls back to `$XDG_DATA_HOME/loom/measure`.
	pub fn open(config: &MeasureConfig) -> Result<Self, ConfigError> {
		let dir = config.resolve_data_dir()?;
		std::fs::create_dir_all(&dir)?;

		info!(dir = %dir.display(), "initialized measure file store");

		Ok(Self::new(dir))
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn path(&self) -> PathBuf {
		self.dir.join(STORE_FILE)
	}

	fn read_all(&self) -> Result<BTreeMap<String, String>, SessionsError> {
		let path = self.path();
		if !path.exists() {
			return Ok(BTreeMap::new());
		}

		let contents = std::fs::read_to_string(&path).map_err(storage_error)?;
		match serde_json::from_str(&contents) {
			Ok(values) => Ok(values),
			Err(e) => {
				warn!(path = %path.display(), error = %e, "store file is corrupt, treating as empty");
				Ok(BTreeMap::new())
			}
		}
	}

	fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), SessionsError> {
		std::fs::create_dir_all(&self.dir).map_err(storage_error)?;

		let path = self.path();
		let tmp_path = self.dir.join(format!("{STORE_FILE}.tmp"));
		let json = serde_json::to_string_pretty(values)?;

		std::fs::write(&tmp_path, json).map_err(storage_error)?;
		std::fs::rename(&tmp_path, &path).map_err(storage_error)?;
		Ok(())
	}
}

impl KeyValueStore for FileStore {
	fn get(&self, key: &str) -> Result<Option<String>, SessionsError> {
		let _guard = self.lock.lock();
		let value = self.read_all()?.remove(key);
		debug!(key, found = value.is_some(), "read store value");
		Ok(value)
	}

	fn set(&self, key: &str, value: &str) -> Result<(), SessionsError> {
		let _guard = self.lock.lock();
		let mut values = self.read_all()?;
		values.insert(key.to_string(), value.to_string());
		self.write_all(&values)?;
		debug!(key, path = %self.path().display(), "wrote store value");
		Ok(())
	}
}

fn storage_error(err: std::io::Error) -> SessionsError {
	SessionsError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_missing_file_reads_empty() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path());
		assert_eq!(store.get("client_id").unwrap(), None);
	}

	#[test]
	fn test_values_survive_reopen() {
		let dir = tempfile::tempdir().unwrap();
		FileStore::new(dir.path()).set("client_id", "abc").unwrap();

		let reopened = FileStore::new(dir.path());
		assert_eq!(reopened.get("client_id").unwrap(), Some("abc".to_string()));
	}

	#[test]
	fn test_set_keeps_other_keys() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path());
		store.set("a", "1").unwrap();
		store.set("b", "2").unwrap();
		store.set("a", "3").unwrap();

		assert_eq!(store.get("a").unwrap(), Some("3".to_string()));
		assert_eq!(store.get("b").unwrap(), Some("2".to_string()));
		assert!(!dir.path().join("store.json.tmp").exists());
	}

	#[test]
	fn test_creates_missing_directory() {
		let dir = tempfile::tempdir().unwrap();
		let nested = dir.path().join("loom").join("measure");
		let store = FileStore::new(&nested);
		store.set("k", "v").unwrap();
		assert!(nested.join("store.json").exists());
	}

	#[test]
	fn test_open_creates_configured_data_dir() {
		let dir = tempfile::tempdir().unwrap();
		let data_dir = dir.path().join("state");
		let config = MeasureConfig {
			data_dir: Some(data_dir.clone()),
			..Default::default()
		};

		let store = FileStore::open(&config).unwrap();

		assert_eq!(store.dir(), data_dir.as_path());
		assert!(data_dir.is_dir());
	}

	#[test]
	fn test_corrupt_file_reads_empty() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("store.json"), "{ not json").unwrap();

		let store = FileStore::new(dir.path());
		assert_eq!(store.get("k").unwrap(), None);

		store.set("k", "v").unwrap();
		assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
	}
}
