//! Session-scoped bearer credentials for portal and checkout API clients: single-flight token
//! refresh, retry-once request replay, and login bookkeeping in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod obs;
pub mod store;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for unit and integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::ApiConfig,
		coordinator::Coordinator,
		http::ReqwestHttpClient,
		store::{MemoryStore, SessionKey, SessionStore, StoreError, StoreFuture},
	};

	/// Coordinator type alias used by reqwest-backed integration tests.
	pub type ReqwestTestCoordinator = Coordinator<ReqwestHttpClient>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds an [`ApiConfig`] rooted at a mock server base URL with default endpoint paths.
	pub fn test_api_config(base_url: &str) -> ApiConfig {
		ApiConfig::builder(Url::parse(base_url).expect("Mock server base URL should parse."))
			.build()
			.expect("Mock API configuration should validate.")
	}

	/// Constructs a [`Coordinator`] backed by an in-memory store and the reqwest transport used
	/// across integration tests.
	pub fn build_reqwest_test_coordinator(
		config: ApiConfig,
	) -> (ReqwestTestCoordinator, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let coordinator = build_reqwest_test_coordinator_with_store(store_backend.clone(), config);

		(coordinator, store_backend)
	}

	/// Constructs a [`Coordinator`] over a caller-provided store.
	pub fn build_reqwest_test_coordinator_with_store(
		store: Arc<dyn SessionStore>,
		config: ApiConfig,
	) -> ReqwestTestCoordinator {
		Coordinator::with_http_client(store, config, Arc::new(test_reqwest_http_client()))
	}

	/// [`MemoryStore`] wrapper whose bulk clear or selected writes fail with a backend error.
	#[derive(Clone, Debug, Default)]
	pub struct FaultyStore {
		/// Backing store that still serves every operation that is not set to fail.
		pub inner: MemoryStore,
		/// Makes [`SessionStore::clear`] fail without touching the stored values.
		pub fail_clear: bool,
		/// Makes [`SessionStore::set`] fail for this key.
		pub fail_set: Option<SessionKey>,
	}
	impl FaultyStore {
		fn refused<T>(operation: String) -> StoreFuture<'static, T>
		where
			T: 'static + Send,
		{
			Box::pin(async move { Err(StoreError::Backend { message: operation }) })
		}
	}
	impl SessionStore for FaultyStore {
		fn get(&self, key: SessionKey) -> StoreFuture<'_, Option<String>> {
			self.inner.get(key)
		}

		fn set(&self, key: SessionKey, value: String) -> StoreFuture<'_, ()> {
			if self.fail_set == Some(key) {
				return Self::refused(format!("set {key} refused"));
			}

			self.inner.set(key, value)
		}

		fn remove(&self, key: SessionKey) -> StoreFuture<'_, Option<String>> {
			self.inner.remove(key)
		}

		fn clear(&self) -> StoreFuture<'_, ()> {
			if self.fail_clear {
				return Self::refused("clear refused".into());
			}

			self.inner.clear()
		}
	}

	/// Seeds access and refresh tokens directly into a store, bypassing the login flow.
	pub async fn seed_session(store: &MemoryStore, access: Option<&str>, refresh: Option<&str>) {
		if let Some(value) = access {
			store
				.set(SessionKey::AccessToken, value.into())
				.await
				.expect("Failed to seed access token into the store.");
		}
		if let Some(value) = refresh {
			store
				.set(SessionKey::RefreshToken, value.into())
				.await
				.expect("Failed to seed refresh token into the store.");
		}
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use color_eyre as _;
