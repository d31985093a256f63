// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host key-value persistence and visitor identifier acquisition.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::visitor::ClientId;

/// Key under which the visitor's client id is persisted.
pub const CLIENT_ID_KEY: &str = "client_id";

/// Durable key-value storage supplied by the host.
pub trait KeyValueStore: Send + Sync {
	fn get(&self, key: &str) -> Result<Option<String>>;
	fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
	values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>> {
		Ok(self.values.lock().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		self.values.lock().insert(key.to_string(), value.to_string());
		Ok(())
	}
}

static ACQUIRE_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Reads the persisted client id, creating and persisting one if absent.
///
/// Serialized within the process. Store failures degrade to an id that only
/// lives for this process; they are logged and never returned.
pub fn acquire_client_id(store: &dyn KeyValueStore) -> ClientId {
	let _guard = ACQUIRE_LOCK.lock();

	match store.get(CLIENT_ID_KEY) {
		Ok(Some(value)) => match value.parse::<ClientId>() {
			Ok(id) => {
				debug!(client_id = %id, "Loaded persisted client id");
				return id;
			}
			Err(e) => {
				warn!(error = %e, "Persisted client id is unreadable, replacing it");
			}
		},
		Ok(None) => {}
		Err(e) => {
			warn!(error = %e, "Failed to read client id, generating a new one");
		}
	}

	let id = ClientId::new();
	match store.set(CLIENT_ID_KEY, &id.to_string()) {
		Ok(()) => info!(client_id = %id, "Created new client id"),
		Err(e) => warn!(
			client_id = %id,
			error = %e,
			"Failed to persist client id, it will only last for this process"
		),
	}
	id
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::error::SessionsError;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	/// A store whose every operation fails.
	pub(crate) struct BrokenStore;

	impl KeyValueStore for BrokenStore {
		fn get(&self, _key: &str) -> Result<Option<String>> {
			Err(SessionsError::Storage("disk on fire".to_string()))
		}

		fn set(&self, _key: &str, _value: &str) -> Result<()> {
			Err(SessionsError::Storage("disk on fire".to_string()))
		}
	}

	struct CountingStore {
		inner: MemoryStore,
		writes: AtomicUsize,
	}

	impl KeyValueStore for CountingStore {
		fn get(&self, key: &str) -> Result<Option<String>> {
			self.inner.get(key)
		}

		fn set(&self, key: &str, value: &str) -> Result<()> {
			self.writes.fetch_add(1, Ordering::SeqCst);
			self.inner.set(key, value)
		}
	}

	#[test]
	fn test_memory_store_get_set() {
		let store = MemoryStore::new();
		assert_eq!(store.get("a").unwrap(), None);
		store.set("a", "1").unwrap();
		assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
	}

	#[test]
	fn test_acquire_creates_and_persists() {
		let store = MemoryStore::new();
		let id = acquire_client_id(&store);
		assert_eq!(store.get(CLIENT_ID_KEY).unwrap(), Some(id.to_string()));
	}

	#[test]
	fn test_acquire_reuses_existing() {
		let store = MemoryStore::new();
		let first = acquire_client_id(&store);
		let second = acquire_client_id(&store);
		assert_eq!(first, second);
	}

	#[test]
	fn test_acquire_replaces_unreadable_value() {
		let store = MemoryStore::new();
		store.set(CLIENT_ID_KEY, "garbage").unwrap();
		let id = acquire_client_id(&store);
		assert_eq!(store.get(CLIENT_ID_KEY).unwrap(), Some(id.to_string()));
	}

	#[test]
	fn test_acquire_survives_broken_store() {
		let first = acquire_client_id(&BrokenStore);
		let second = acquire_client_id(&BrokenStore);
		assert_ne!(first, second);
	}

	#[test]
	fn test_concurrent_acquire_creates_one_id() {
		let store = Arc::new(CountingStore {
			inner: MemoryStore::new(),
			writes: AtomicUsize::new(0),
		});

		let handles: Vec<_> = (0..16)
			.map(|_| {
				let store = Arc::clone(&store);
				std::thread::spawn(move || acquire_client_id(store.as_ref()))
			})
			.collect();

		let ids: Vec<ClientId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

		assert!(ids.iter().all(|id| *id == ids[0]));
		assert_eq!(store.writes.load(Ordering::SeqCst), 1);
	}
}
