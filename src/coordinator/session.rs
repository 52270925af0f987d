//! Login, logout, and restore for the coordinator's session.
//!
//! These are the only writers of credentials besides the refresh path. Each takes the refresh
//! gate for its write phase and settles the refresh ledger, so a refresh that was queued
//! behind a login reuses the login token and a refresh queued behind a logout observes the
//! cleared session.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{SessionCredentials, TokenSecret},
	coordinator::Coordinator,
	error::{self, TransientError},
	http::{self, ApiHttpClient, ApiRequest},
	obs::{FlowKind, FlowSpan},
	store::{self, SessionKey, StoreError},
};

/// Message used when a login failure carries no displayable detail.
pub const DEFAULT_LOGIN_FAILURE: &str = "Login failed. Please check your credentials.";

/// Credentials submitted to the login endpoint.
#[derive(Clone)]
pub struct LoginRequest {
	/// Email address, sent as the `username` form field.
	pub email: String,
	/// Plain-text password.
	pub password: String,
}
impl LoginRequest {
	/// Creates a login request; surrounding whitespace is stripped from the email.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		let email = email.into();

		Self { email: email.trim().to_owned(), password: password.into() }
	}
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

#[derive(Deserialize)]
struct LoginGrant {
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	user_id: Option<UserId>,
}

/// The login endpoint reports numeric ids on some deployments and string ids on others.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserId {
	Text(String),
	Number(serde_json::Number),
}
impl From<UserId> for String {
	fn from(id: UserId) -> Self {
		match id {
			UserId::Text(text) => text,
			UserId::Number(number) => number.to_string(),
		}
	}
}

impl<C> Coordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Submits `credentials` to the login endpoint and replaces the session on success.
	///
	/// Failures carry a displayable message in [`Error::Login`]; the existing session is left
	/// untouched unless the store fails while the new one is written.
	pub async fn login(&self, credentials: LoginRequest) -> Result<SessionCredentials> {
		let span = FlowSpan::new(FlowKind::Login, "login");
		let result = span
			.instrument(async {
				let session = self.submit_login(&credentials).await?;

				self.install_session(&session).await?;

				Ok::<_, Error>(session)
			})
			.await;

		span.record_result(&result);

		result
	}

	/// Ends the session: the in-memory token and every stored credential are dropped.
	pub async fn logout(&self) -> Result<()> {
		let span = FlowSpan::new(FlowKind::Logout, "logout");
		let result = span
			.instrument(async {
				let _gate = self.gate.lock().await;
				let cleared = self.clear_session().await;

				self.settle(None);

				cleared
			})
			.await;

		span.record_result(&result);

		Ok(result?)
	}

	/// Loads the stored session at startup.
	///
	/// Migrates a token stored under the legacy key, primes the in-memory token, and returns
	/// the stored credentials when either token is present.
	pub async fn restore_session(&self) -> Result<Option<SessionCredentials>> {
		let span = FlowSpan::new(FlowKind::Restore, "restore_session");
		let result = span
			.instrument(async {
				let _gate = self.gate.lock().await;

				store::migrate_legacy_access_token(&*self.store).await?;

				let session = self.credentials().await?;

				self.cache_token(session.access_token.clone());

				Ok::<_, Error>(if session.is_empty() { None } else { Some(session) })
			})
			.await;

		span.record_result(&result);

		result
	}

	/// Reads a snapshot of the stored credentials.
	pub async fn credentials(&self) -> Result<SessionCredentials, StoreError> {
		Ok(SessionCredentials {
			access_token: self.stored_secret(SessionKey::AccessToken).await?,
			refresh_token: self.stored_secret(SessionKey::RefreshToken).await?,
			user_email: self.store.get(SessionKey::UserEmail).await?,
			user_id: self.store.get(SessionKey::UserId).await?,
		})
	}

	/// Returns `true` when an access token is available to attach to requests.
	pub async fn is_authenticated(&self) -> Result<bool, StoreError> {
		Ok(self.current_token().await?.is_some())
	}

	async fn submit_login(&self, credentials: &LoginRequest) -> Result<SessionCredentials> {
		let email = credentials.email.trim();
		let request = ApiRequest::post(self.config.endpoints.login.clone())
			.form([
				("username", email),
				("password", credentials.password.as_str()),
			])
			.to_http(None)?;
		let response =
			self.http_client.execute(request).await.map_err(error::map_transport_error)?;
		let status = response.status();
		let body = response.body();

		if !http::is_json(response.headers()) {
			let text = String::from_utf8_lossy(body).trim().to_owned();
			let message = if text.is_empty() { DEFAULT_LOGIN_FAILURE.to_owned() } else { text };

			return Err(Error::Login { message, status: Some(status.as_u16()) });
		}
		if !status.is_success() {
			let message = serde_json::from_slice::<Value>(body)
				.ok()
				.as_ref()
				.and_then(http::detail_message)
				.unwrap_or_else(|| DEFAULT_LOGIN_FAILURE.to_owned());

			return Err(Error::Login { message, status: Some(status.as_u16()) });
		}

		let grant = http::parse_json::<LoginGrant>(status, body)?;
		let access_token = grant
			.access_token
			.filter(|token| !token.is_empty())
			.map(TokenSecret::new)
			.ok_or_else(|| TransientError::UnexpectedResponse {
				message: "login response did not include an access token".into(),
				status: Some(status.as_u16()),
			})?;

		Ok(SessionCredentials {
			access_token: Some(access_token),
			refresh_token: grant
				.refresh_token
				.filter(|token| !token.is_empty())
				.map(TokenSecret::new),
			user_email: Some(email.to_owned()),
			user_id: grant.user_id.map(String::from),
		})
	}

	/// Replaces whatever the store holds with `session` and settles the ledger.
	async fn install_session(&self, session: &SessionCredentials) -> Result<(), StoreError> {
		let _gate = self.gate.lock().await;
		let written = self.write_session(session).await;

		match &written {
			Ok(()) => {
				self.cache_token(session.access_token.clone());
				self.settle(session.access_token.clone());
			},
			Err(_) => {
				// A partially written session must not outlive the failed login.
				let _ = self.clear_session().await;

				self.settle(None);
			},
		}

		written
	}

	async fn write_session(&self, session: &SessionCredentials) -> Result<(), StoreError> {
		self.store.clear().await?;

		let secret = |token: &Option<TokenSecret>| token.as_ref().map(|t| t.expose().to_owned());
		let entries = [
			(SessionKey::AccessToken, secret(&session.access_token)),
			(SessionKey::RefreshToken, secret(&session.refresh_token)),
			(SessionKey::UserEmail, session.user_email.clone()),
			(SessionKey::UserId, session.user_id.clone()),
		];

		for (key, value) in entries {
			if let Some(value) = value {
				self.store.set(key, value).await?;
			}
		}

		Ok(())
	}
}
