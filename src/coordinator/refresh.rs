//! Single-flight token refresh.
//!
//! Every caller that needs a new access token funnels through [`Coordinator::refresh`].
//! The first caller takes the refresh gate and performs the network call; callers that queue
//! on the gate meanwhile find the settled outcome in the ledger and return it without
//! touching the network. A failed refresh is terminal for the session: credentials are
//! cleared and every waiter observes `None`.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	coordinator::{Coordinator, RefreshLedger},
	http::{self, ApiHttpClient, ApiRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, RefreshFailure},
	store::{SessionKey, StoreError},
};

#[derive(Serialize)]
struct RefreshBody<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshGrant {
	access_token: Option<String>,
	refresh_token: Option<String>,
}

/// Clears the in-flight flag even when the refreshing future is dropped mid-call.
struct InFlight<'a>(&'a Mutex<RefreshLedger>);
impl<'a> InFlight<'a> {
	fn enter(ledger: &'a Mutex<RefreshLedger>) -> Self {
		ledger.lock().in_flight = true;

		Self(ledger)
	}
}
impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.0.lock().in_flight = false;
	}
}

impl<C> Coordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Obtains a new access token, joining the in-flight refresh when there is one.
	///
	/// Returns `None` when the session cannot be refreshed; the session has been cleared by
	/// then and the user must log in again. `None` is never retried automatically.
	pub async fn refresh(&self) -> Option<TokenSecret> {
		let epoch = self.refresh_epoch();

		self.refresh_since(epoch, None).await
	}

	/// Refreshes unless a credential change settled after `epoch`.
	///
	/// A settled success is reused unless it is the very token the caller just had rejected;
	/// a settled failure is always reused.
	pub(crate) async fn refresh_since(
		&self,
		epoch: u64,
		rejected: Option<&TokenSecret>,
	) -> Option<TokenSecret> {
		let span = FlowSpan::new(FlowKind::Refresh, "refresh");

		span.instrument(async {
			let _gate = self.gate.lock().await;

			if let Some(outcome) = self.settled_since(epoch, rejected) {
				self.refresh_metrics.record_coalesced();
				span.record(FlowOutcome::Coalesced);

				return outcome;
			}

			let _in_flight = InFlight::enter(&self.ledger);

			self.refresh_metrics.record_attempt();

			let outcome = match self.exchange_refresh_token().await {
				Ok(token) => {
					self.refresh_metrics.record_success();
					span.record(FlowOutcome::Success);

					Some(token)
				},
				Err(reason) => {
					self.refresh_metrics.record_failure();
					obs::record_refresh_failure(reason);

					if self.clear_session().await.is_err() {
						obs::record_refresh_failure(RefreshFailure::Storage);
					}

					span.record(FlowOutcome::Failure);

					None
				},
			};

			self.settle(outcome.clone());

			outcome
		})
		.await
	}

	fn settled_since(
		&self,
		epoch: u64,
		rejected: Option<&TokenSecret>,
	) -> Option<Option<TokenSecret>> {
		let ledger = self.ledger.lock();

		if ledger.epoch == epoch {
			return None;
		}

		match &ledger.outcome {
			Some(token) if Some(token) == rejected => None,
			outcome => Some(outcome.clone()),
		}
	}

	/// Calls the refresh endpoint and stores the new credentials.
	async fn exchange_refresh_token(&self) -> Result<TokenSecret, RefreshFailure> {
		let refresh_token = self
			.stored_secret(SessionKey::RefreshToken)
			.await
			.map_err(|_| RefreshFailure::Storage)?
			.ok_or(RefreshFailure::MissingRefreshToken)?;
		let request = ApiRequest::post(self.config.endpoints.refresh.clone())
			.json(&RefreshBody { refresh_token: refresh_token.expose() })
			.and_then(|request| request.to_http(None))
			.map_err(|_| RefreshFailure::Transport)?;
		let response = self
			.http_client
			.execute(request)
			.await
			.map_err(|_| RefreshFailure::Transport)?;
		let status = response.status();

		if !status.is_success() {
			return Err(RefreshFailure::Rejected);
		}

		let grant = http::parse_json::<RefreshGrant>(status, response.body())
			.map_err(|_| RefreshFailure::Malformed)?;
		let access_token = grant
			.access_token
			.filter(|token| !token.is_empty())
			.map(TokenSecret::new)
			.ok_or(RefreshFailure::Malformed)?;
		let rotated = grant.refresh_token.filter(|token| !token.is_empty()).map(TokenSecret::new);

		self.store_refreshed(&access_token, rotated).await.map_err(|_| RefreshFailure::Storage)?;

		Ok(access_token)
	}

	async fn store_refreshed(
		&self,
		access_token: &TokenSecret,
		rotated: Option<TokenSecret>,
	) -> Result<(), StoreError> {
		self.store.set(SessionKey::AccessToken, access_token.expose().to_owned()).await?;

		if let Some(refresh_token) = rotated {
			self.store.set(SessionKey::RefreshToken, refresh_token.expose().to_owned()).await?;
		}

		self.cache_token(Some(access_token.clone()));

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	#[cfg(feature = "reqwest")] use httpmock::prelude::*;
	// self
	use super::*;
	#[cfg(feature = "reqwest")] use crate::_preludet::*;

	#[cfg(feature = "reqwest")]
	#[test]
	fn settled_outcome_is_reused_unless_it_was_just_rejected() {
		let (coordinator, _) = build_reqwest_test_coordinator(test_api_config("http://127.0.0.1:9"));
		let settled = TokenSecret::new("access-settled");
		let older = TokenSecret::new("access-older");

		assert_eq!(coordinator.settled_since(0, None), None);
		assert_eq!(coordinator.settle(Some(settled.clone())), 1);
		assert_eq!(coordinator.settled_since(1, Some(&older)), None);
		assert_eq!(coordinator.settled_since(0, Some(&older)), Some(Some(settled.clone())));
		assert_eq!(coordinator.settled_since(0, None), Some(Some(settled.clone())));
		assert_eq!(coordinator.settled_since(0, Some(&settled)), None);

		coordinator.settle(None);

		assert_eq!(coordinator.settled_since(1, Some(&settled)), Some(None));
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn rejected_settled_token_triggers_a_fresh_refresh() {
		let server = MockServer::start_async().await;
		let (coordinator, store) =
			build_reqwest_test_coordinator(test_api_config(&server.base_url()));

		seed_session(&store, Some("access-settled"), Some("refresh-live")).await;

		let refresh = server
			.mock_async(|when, then| {
				when.method(POST).path("/token/refresh");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"access_token\":\"access-next\"}");
			})
			.await;
		let settled = TokenSecret::new("access-settled");

		coordinator.settle(Some(settled.clone()));

		let reused = coordinator.refresh_since(0, Some(&TokenSecret::new("access-older"))).await;

		assert_eq!(reused.as_ref(), Some(&settled));
		assert_eq!(coordinator.refresh_metrics.coalesced(), 1);

		refresh.assert_calls_async(0).await;

		let renewed = coordinator.refresh_since(0, Some(&settled)).await;

		assert_eq!(renewed.as_ref().map(TokenSecret::expose), Some("access-next"));
		assert_eq!(coordinator.refresh_epoch(), 2);
		assert_eq!(coordinator.refresh_metrics.attempts(), 1);

		refresh.assert_calls_async(1).await;
	}

	#[test]
	fn in_flight_flag_resets_on_drop() {
		let ledger = Mutex::new(RefreshLedger::default());

		{
			let _guard = InFlight::enter(&ledger);

			assert!(ledger.lock().in_flight);
		}

		assert!(!ledger.lock().in_flight);
	}

	#[test]
	fn refresh_grant_tolerates_missing_rotation() {
		let grant: RefreshGrant = serde_json::from_str(r#"{"access_token":"a-2"}"#)
			.expect("Grant without refresh_token should deserialize.");

		assert_eq!(grant.access_token.as_deref(), Some("a-2"));
		assert!(grant.refresh_token.is_none());
	}
}
