//! Authenticated request coordination against the configured API.
//!
//! [`Coordinator`] owns the HTTP transport, the session store, and the refresh bookkeeping so
//! every caller on a page shares one view of the current access token. Requests go out with
//! the current bearer token; a 401 triggers at most one refresh per storm of concurrent
//! failures and the original request is replayed once with the new token.

pub mod refresh;
pub mod request;
pub mod session;

pub use refresh::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ApiConfig,
	http::ApiHttpClient,
	store::{SessionKey, SessionStore, StoreError},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Coordinator specialized for the crate's default reqwest transport.
pub type ReqwestCoordinator = Coordinator<ReqwestHttpClient>;

/// Observable refresh state of a [`Coordinator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshState {
	/// No refresh call is in flight.
	Idle,
	/// A refresh call is in flight; callers needing a refresh wait for its outcome.
	Refreshing,
}

/// Outcome of the most recently settled credential change.
///
/// `epoch` advances whenever a refresh settles or a login/logout replaces the session. A
/// caller that snapshotted an older epoch before dispatching can reuse `outcome` instead of
/// refreshing again.
#[derive(Debug, Default)]
pub(crate) struct RefreshLedger {
	pub(crate) epoch: u64,
	pub(crate) outcome: Option<TokenSecret>,
	pub(crate) in_flight: bool,
}

/// Coordinates authenticated API calls for one browsing session.
///
/// The coordinator is the only writer of the access and refresh tokens once a session
/// exists. Refreshes, logins, logouts, and restores serialize on a single gate, so a late
/// refresh can never overwrite a fresh login or resurrect a logged-out session.
pub struct Coordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// HTTP client used for every outbound call.
	pub http_client: Arc<C>,
	/// Session store holding the credentials.
	pub store: Arc<dyn SessionStore>,
	/// API endpoints.
	pub config: ApiConfig,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	cached_token: Arc<RwLock<Option<TokenSecret>>>,
	ledger: Arc<Mutex<RefreshLedger>>,
	gate: Arc<AsyncMutex<()>>,
}
impl<C> Coordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a coordinator that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn SessionStore>,
		config: ApiConfig,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			config,
			refresh_metrics: Default::default(),
			cached_token: Default::default(),
			ledger: Default::default(),
			gate: Arc::new(AsyncMutex::new(())),
		}
	}

	/// Returns whether a refresh call is currently in flight.
	pub fn refresh_state(&self) -> RefreshState {
		if self.ledger.lock().in_flight { RefreshState::Refreshing } else { RefreshState::Idle }
	}

	pub(crate) fn refresh_epoch(&self) -> u64 {
		self.ledger.lock().epoch
	}

	/// Records a settled credential change and returns the new epoch.
	pub(crate) fn settle(&self, outcome: Option<TokenSecret>) -> u64 {
		let mut ledger = self.ledger.lock();

		ledger.epoch += 1;
		ledger.outcome = outcome;

		ledger.epoch
	}

	/// Reads the access token from the store, falling back to the in-memory copy when the
	/// store no longer holds one.
	pub(crate) async fn current_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		let stored = self.stored_secret(SessionKey::AccessToken).await?;

		if let Some(token) = stored {
			let mut cached = self.cached_token.write();

			if cached.as_ref() != Some(&token) {
				*cached = Some(token.clone());
			}

			return Ok(Some(token));
		}

		let cached = self.cached_token.read().clone();

		Ok(cached)
	}

	pub(crate) async fn stored_secret(
		&self,
		key: SessionKey,
	) -> Result<Option<TokenSecret>, StoreError> {
		let value = self.store.get(key).await?;

		Ok(value.filter(|value| !value.is_empty()).map(TokenSecret::new))
	}

	pub(crate) fn cache_token(&self, token: Option<TokenSecret>) {
		*self.cached_token.write() = token;
	}

	/// Drops every credential, in memory and in the store.
	///
	/// When the backend cannot clear in bulk, each [`SessionKey`] is removed individually; the
	/// first removal failure is returned after every key has been attempted.
	pub(crate) async fn clear_session(&self) -> Result<(), StoreError> {
		self.cache_token(None);

		if self.store.clear().await.is_ok() {
			return Ok(());
		}

		let mut purged = Ok(());

		for key in SessionKey::ALL {
			if let Err(e) = self.store.remove(key).await {
				purged = purged.and(Err(e));
			}
		}

		purged
	}
}
#[cfg(feature = "reqwest")]
impl Coordinator<ReqwestHttpClient> {
	/// Creates a new coordinator with its own reqwest-backed transport.
	pub fn new(store: Arc<dyn SessionStore>, config: ApiConfig) -> Self {
		Self::with_http_client(store, config, ReqwestHttpClient::default())
	}
}
impl<C> Clone for Coordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			store: self.store.clone(),
			config: self.config.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			cached_token: self.cached_token.clone(),
			ledger: self.ledger.clone(),
			gate: self.gate.clone(),
		}
	}
}
impl<C> Debug for Coordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("config", &self.config)
			.field("refresh_state", &self.refresh_state())
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}
