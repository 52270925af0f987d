//! Transport primitives for authenticated API calls.
//!
//! The module exposes [`ApiHttpClient`], the coordinator's only dependency on an HTTP stack,
//! together with the [`ApiRequest`] descriptor callers hand to the coordinator and the
//! [`ApiResponse`] wrapper it hands back. Requests and responses travel as the `http` crate
//! types re-exported by `oauth2`, so any client able to execute an `http::Request<Vec<u8>>`
//! can sit behind the coordinator.

// std
use std::ops::Deref;
// crates.io
use oauth2::{
	HttpClientError, HttpRequest, HttpResponse,
	http::{
		HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransientError},
};

/// Boxed future returned by [`ApiHttpClient::execute`].
pub type HttpFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, HttpClientError<E>>> + 'a + Send>>;

/// Abstraction over HTTP transports able to execute API calls for the coordinator.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// caller holding the coordinator, and the futures they return must be `Send` so coordinator
/// futures can hop executors. Transports report every HTTP status as a response; only
/// failures that prevent a response from arriving are errors.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes a single request without retries or redirects handled on the caller's behalf.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Timeouts, proxies, and TLS roots are configured on the wrapped client; the coordinator
/// imposes none of its own.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Request descriptor handed to the coordinator.
///
/// The coordinator treats the descriptor as opaque apart from the `Authorization` header,
/// which it injects or overwrites on every dispatch.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Caller-supplied headers.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Vec<u8>,
}
impl ApiRequest {
	/// Creates a descriptor with no headers and an empty body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Creates a `GET` descriptor.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Creates a `POST` descriptor.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Creates a `PUT` descriptor.
	pub fn put(url: Url) -> Self {
		Self::new(Method::PUT, url)
	}

	/// Creates a `DELETE` descriptor.
	pub fn delete(url: Url) -> Self {
		Self::new(Method::DELETE, url)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
		let name = HeaderName::from_bytes(name.as_bytes())?;
		let value = HeaderValue::from_str(value)?;

		self.headers.insert(name, value);

		Ok(self)
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = serde_json::to_vec(body).map_err(ConfigError::BodySerialization)?;
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Encodes `pairs` as `application/x-www-form-urlencoded` and sets the matching content type.
	pub fn form<'a, I>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (&'a str, &'a str)>,
	{
		self.body = url::form_urlencoded::Serializer::new(String::new())
			.extend_pairs(pairs)
			.finish()
			.into_bytes();
		self.headers.insert(
			CONTENT_TYPE,
			HeaderValue::from_static("application/x-www-form-urlencoded"),
		);

		self
	}

	/// Builds the wire request, attaching `bearer` as the `Authorization` header when present.
	pub fn to_http(&self, bearer: Option<&TokenSecret>) -> Result<HttpRequest, ConfigError> {
		let mut request = oauth2::http::Request::builder()
			.method(self.method.clone())
			.uri(self.url.as_str())
			.body(self.body.clone())?;
		let headers = request.headers_mut();

		*headers = self.headers.clone();

		if !headers.contains_key(ACCEPT) {
			headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
		}
		if let Some(token) = bearer {
			let mut value = HeaderValue::from_str(&token.bearer())?;

			value.set_sensitive(true);
			headers.insert(AUTHORIZATION, value);
		}

		Ok(request)
	}
}

/// Response returned by the coordinator.
///
/// Every status other than a recovered 401 is passed through untouched; the flags record
/// what the coordinator did on the caller's behalf.
#[derive(Debug)]
pub struct ApiResponse {
	inner: HttpResponse,
	refreshed: bool,
	reauthentication_required: bool,
}
impl ApiResponse {
	pub(crate) fn new(inner: HttpResponse) -> Self {
		Self { inner, refreshed: false, reauthentication_required: false }
	}

	pub(crate) fn mark_refreshed(mut self) -> Self {
		self.refreshed = true;

		self
	}

	pub(crate) fn mark_reauthentication_required(mut self) -> Self {
		self.reauthentication_required = true;

		self
	}

	/// HTTP status of the final response.
	pub fn status(&self) -> StatusCode {
		self.inner.status()
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.inner.status().is_success()
	}

	/// Returns `true` for 401 statuses.
	pub fn is_unauthorized(&self) -> bool {
		self.inner.status() == StatusCode::UNAUTHORIZED
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		self.inner.headers()
	}

	/// Raw response body.
	pub fn body(&self) -> &[u8] {
		self.inner.body()
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(self.inner.body()).into_owned()
	}

	/// Returns `true` when the response declares a JSON content type.
	pub fn is_json(&self) -> bool {
		is_json(self.inner.headers())
	}

	/// Deserializes the body as JSON.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		parse_json(self.inner.status(), self.inner.body())
	}

	/// Displayable message for an error response, derived from its `detail` payload.
	///
	/// Returns `None` for successful responses and for bodies that are not JSON objects
	/// carrying `detail` or `message`.
	pub fn error_detail(&self) -> Option<String> {
		if self.is_success() {
			return None;
		}

		let body = serde_json::from_slice::<Value>(self.inner.body()).ok()?;

		detail_message(&body)
	}

	/// Returns `true` when the request was replayed with a refreshed access token.
	pub fn was_refreshed(&self) -> bool {
		self.refreshed
	}

	/// Returns `true` when the session ended and the user must log in again.
	pub fn requires_reauthentication(&self) -> bool {
		self.reauthentication_required
	}

	/// Unwraps the underlying HTTP response.
	pub fn into_inner(self) -> HttpResponse {
		self.inner
	}
}

/// Formats the API's error payload for display.
///
/// `detail` arrays (field validation errors) join each item's `msg` or `message` with `". "`,
/// string details are returned verbatim, and object details yield their `message` or their
/// JSON text. Non-zero numbers and `true` are rendered as JSON. Without a usable `detail`, a
/// top-level `message` string is used.
pub fn detail_message(body: &Value) -> Option<String> {
	match body.get("detail") {
		Some(Value::Array(items)) => Some(
			items
				.iter()
				.map(|item| {
					["msg", "message"]
						.into_iter()
						.find_map(|field| non_empty_str(item, field))
						.unwrap_or("Validation error")
				})
				.collect::<Vec<_>>()
				.join(". "),
		),
		Some(Value::String(detail)) if !detail.is_empty() => Some(detail.clone()),
		Some(detail @ Value::Object(_)) => Some(
			non_empty_str(detail, "message")
				.map(ToOwned::to_owned)
				.unwrap_or_else(|| detail.to_string()),
		),
		Some(detail @ Value::Number(n)) if n.as_f64() != Some(0.) => Some(detail.to_string()),
		Some(Value::Bool(true)) => Some(true.to_string()),
		_ => non_empty_str(body, "message").map(ToOwned::to_owned),
	}
}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
	value.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub(crate) fn is_json(headers: &HeaderMap) -> bool {
	headers
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
}

pub(crate) fn parse_json<T>(status: StatusCode, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
		TransientError::ResponseParse { source, status: Some(status.as_u16()) }.into()
	})
}
