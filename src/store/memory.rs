//! Thread-safe in-memory [`SessionStore`] implementation scoped to the running process.

// self
use crate::{
	_prelude::*,
	store::{SessionKey, SessionStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<&'static str, String>>>;

/// Thread-safe storage backend that keeps session values in-process.
///
/// Clones share the same underlying map, so a store handed to a coordinator can still be
/// inspected by the caller that created it.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns `true` when a value is stored under `key`.
	pub fn contains(&self, key: SessionKey) -> bool {
		self.0.read().contains_key(key.as_str())
	}

	/// Number of stored values.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Copies the stored values keyed by their storage names.
	pub fn snapshot(&self) -> HashMap<&'static str, String> {
		self.0.read().clone()
	}

	fn get_now(map: StoreMap, key: SessionKey) -> Option<String> {
		map.read().get(key.as_str()).cloned()
	}

	fn set_now(map: StoreMap, key: SessionKey, value: String) -> Result<(), StoreError> {
		map.write().insert(key.as_str(), value);

		Ok(())
	}

	fn remove_now(map: StoreMap, key: SessionKey) -> Option<String> {
		map.write().remove(key.as_str())
	}
}
impl SessionStore for MemoryStore {
	fn get(&self, key: SessionKey) -> StoreFuture<'_, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(map, key)) })
	}

	fn set(&self, key: SessionKey, value: String) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::set_now(map, key, value) })
	}

	fn remove(&self, key: SessionKey) -> StoreFuture<'_, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::remove_now(map, key)) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().clear();

			Ok(())
		})
	}
}
