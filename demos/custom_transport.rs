//! Drives a whole session against an in-process API through a custom [`ApiHttpClient`].
//!
//! 1. Implement [`ApiHttpClient`] for a transport that answers requests without a network.
//! 2. Wrap it in `Arc` and pass it to [`Coordinator::with_http_client`] next to a
//!    [`MemoryStore`].
//! 3. Log in, let the access token expire, and watch the coordinator refresh it behind a
//!    request before logging out.
//! 4. Report transport failures through [`HttpClientError::Reqwest`] so the coordinator maps
//!    them to [`Error::Transport`].

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};
// crates.io
use color_eyre::Result;
use oauth2::{
	HttpClientError, HttpRequest, HttpResponse,
	http::{
		HeaderValue, Method, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};
use url::Url;
// self
use portal_session::{
	config::ApiConfig,
	coordinator::{Coordinator, LoginRequest},
	error::Error,
	http::{ApiHttpClient, ApiRequest, HttpFuture},
	store::{MemoryStore, SessionStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::default());
	let config = ApiConfig::builder(Url::parse("https://api.example.com")?).build()?;
	let api = Arc::new(InProcessApi::default());
	let coordinator: Coordinator<InProcessApi> =
		Coordinator::with_http_client(store, config.clone(), Arc::clone(&api));
	let session =
		coordinator.login(LoginRequest::new(" ada@example.com ", "correct horse")).await?;

	println!(
		"Logged in as {} with user id {}.",
		session.user_email.as_deref().unwrap_or("<unknown>"),
		session.user_id.as_deref().unwrap_or("<unknown>"),
	);

	api.expire_access_tokens();

	let profile_url = coordinator.endpoint("/api/users/me")?;
	let profile = coordinator.request(ApiRequest::get(profile_url.clone())).await?;

	println!(
		"Profile answered {} (refreshed: {}): {}.",
		profile.status(),
		profile.was_refreshed(),
		profile.text(),
	);

	coordinator.logout().await?;

	let anonymous = coordinator.request(ApiRequest::get(profile_url.clone())).await?;

	println!(
		"After logout the API answered {} (re-authentication required: {}).",
		anonymous.status(),
		anonymous.requires_reauthentication(),
	);

	let offline: Coordinator<InProcessApi> = Coordinator::with_http_client(
		Arc::new(MemoryStore::default()),
		config,
		Arc::new(InProcessApi::offline()),
	);

	match offline.request(ApiRequest::get(profile_url)).await {
		Ok(response) => println!("Offline transport unexpectedly answered {}.", response.status()),
		Err(e @ Error::Transport(_)) => println!("Transport failure surfaced as: {e}."),
		Err(e) => return Err(e.into()),
	}

	Ok(())
}

#[derive(Debug)]
struct Unreachable {
	host: String,
}
impl Display for Unreachable {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} is unreachable", self.host)
	}
}
impl StdError for Unreachable {}

/// Serves the login, refresh, and profile endpoints from memory.
#[derive(Default)]
struct InProcessApi {
	expired: AtomicBool,
	offline: bool,
}
impl InProcessApi {
	fn offline() -> Self {
		Self { offline: true, ..Default::default() }
	}

	fn expire_access_tokens(&self) {
		self.expired.store(true, Ordering::SeqCst);
	}

	fn answer(&self, request: &HttpRequest) -> HttpResponse {
		let authorized = request.headers().contains_key(AUTHORIZATION);

		match (request.method(), request.uri().path()) {
			(&Method::POST, "/api/users/token") => {
				self.expired.store(false, Ordering::SeqCst);

				json(
					StatusCode::OK,
					r#"{"access_token":"access-1","refresh_token":"refresh-1","user_id":42}"#,
				)
			},
			(&Method::POST, "/token/refresh") => {
				self.expired.store(false, Ordering::SeqCst);

				json(StatusCode::OK, r#"{"access_token":"access-2","refresh_token":"refresh-2"}"#)
			},
			(&Method::GET, "/api/users/me") if authorized && !self.expired.load(Ordering::SeqCst) =>
				json(StatusCode::OK, r#"{"email":"ada@example.com"}"#),
			(&Method::GET, "/api/users/me") =>
				json(StatusCode::UNAUTHORIZED, r#"{"detail":"Not authenticated"}"#),
			_ => json(StatusCode::NOT_FOUND, r#"{"detail":"Not Found"}"#),
		}
	}
}
impl ApiHttpClient for InProcessApi {
	type TransportError = Unreachable;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		Box::pin(async move {
			if self.offline {
				let host = request.uri().host().unwrap_or_default().to_owned();

				// oauth2 names the boxed transport variant after reqwest, but any error fits.
				return Err(HttpClientError::Reqwest(Box::new(Unreachable { host })));
			}

			Ok(self.answer(&request))
		})
	}
}

fn json(status: StatusCode, body: &str) -> HttpResponse {
	let mut response = HttpResponse::new(body.as_bytes().to_vec());

	*response.status_mut() = status;
	response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

	response
}
