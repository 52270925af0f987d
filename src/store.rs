//! Session credential storage contracts and the built-in in-memory store.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Process-wide key/value store holding the current session's credentials.
///
/// Values live for the duration of the session (not across restarts). The coordinator is the
/// only writer of the token keys once a login has completed.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present.
	fn get(&self, key: SessionKey) -> StoreFuture<'_, Option<String>>;

	/// Stores or replaces the value under `key`.
	fn set(&self, key: SessionKey, value: String) -> StoreFuture<'_, ()>;

	/// Removes the value under `key`, returning the previous value.
	fn remove(&self, key: SessionKey) -> StoreFuture<'_, Option<String>>;

	/// Removes every stored value.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Names of the values kept in a [`SessionStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKey {
	/// Canonical access token key.
	AccessToken,
	/// Access token key written by older clients; only read during session restore.
	LegacyAccessToken,
	/// Refresh token key.
	RefreshToken,
	/// Email address of the logged-in user.
	UserEmail,
	/// Remote user identifier.
	UserId,
}
impl SessionKey {
	/// Every key the crate reads or writes; used to purge a session key by key.
	pub const ALL: [SessionKey; 5] = [
		SessionKey::AccessToken,
		SessionKey::LegacyAccessToken,
		SessionKey::RefreshToken,
		SessionKey::UserEmail,
		SessionKey::UserId,
	];

	/// Returns the storage name of the key.
	pub const fn as_str(self) -> &'static str {
		match self {
			SessionKey::AccessToken => "userToken",
			SessionKey::LegacyAccessToken => "accessToken",
			SessionKey::RefreshToken => "refreshToken",
			SessionKey::UserEmail => "userEmail",
			SessionKey::UserId => "userId",
		}
	}
}
impl Display for SessionKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Moves a token stored under [`SessionKey::LegacyAccessToken`] to [`SessionKey::AccessToken`].
///
/// The canonical key wins when both are present. The legacy key is removed either way.
pub async fn migrate_legacy_access_token(store: &dyn SessionStore) -> Result<(), StoreError> {
	let Some(legacy) = store.remove(SessionKey::LegacyAccessToken).await? else {
		return Ok(());
	};

	if store.get(SessionKey::AccessToken).await?.is_none() {
		store.set(SessionKey::AccessToken, legacy).await?;
	}

	Ok(())
}
