//! API endpoint configuration shared by the coordinator and its session flows.
//!
//! The module exposes a validated [`ApiConfig`] plus the builder used to assemble it, so
//! callers describe where the remote API lives once and every flow resolves URLs the same way.

/// Builder API for assembling API configurations.
pub mod builder;

pub use builder::*;

// crates.io
use url::Host;
// self
use crate::{_prelude::*, error::ConfigError};

/// Default path of the token refresh endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/token/refresh";
/// Default path of the login endpoint.
pub const DEFAULT_LOGIN_PATH: &str = "/api/users/token";
/// Port the API listens on when the client is served from a loopback origin.
pub const LOCAL_API_PORT: u16 = 8001;

/// Authentication endpoints resolved against the base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoints {
	/// Token refresh endpoint.
	pub refresh: Url,
	/// Login endpoint accepting form-encoded credentials.
	pub login: Url,
}

/// Immutable API configuration consumed by the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
	/// Base URL that relative resource paths are joined onto.
	pub base_url: Url,
	/// Authentication endpoints.
	pub endpoints: ApiEndpoints,
}
impl ApiConfig {
	/// Creates a new builder rooted at `base_url`.
	pub fn builder(base_url: Url) -> ApiConfigBuilder {
		ApiConfigBuilder::new(base_url)
	}

	/// Picks the API base for a client served from `origin`.
	///
	/// Loopback origins talk to the API on the same host at [`LOCAL_API_PORT`]; every other
	/// origin talks to `production`.
	pub fn for_origin(origin: &Url, production: Url) -> Result<Self, ApiConfigError> {
		if !is_loopback(origin) {
			return Self::builder(production).build();
		}

		let mut base = origin.clone();

		base.set_port(Some(LOCAL_API_PORT))
			.map_err(|_| ApiConfigError::CannotBeABase { url: origin.to_string() })?;
		base.set_path("/");
		base.set_query(None);
		base.set_fragment(None);

		Self::builder(base).build()
	}

	/// Resolves `path` against the base URL.
	pub fn url(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url
			.join(path)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}

	/// Returns `true` when `url` addresses the refresh endpoint, ignoring query and fragment.
	pub fn is_refresh_endpoint(&self, url: &Url) -> bool {
		let refresh = &self.endpoints.refresh;

		url.scheme() == refresh.scheme()
			&& url.host() == refresh.host()
			&& url.port_or_known_default() == refresh.port_or_known_default()
			&& url.path().trim_end_matches('/') == refresh.path().trim_end_matches('/')
	}
}

pub(crate) fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
