// self
use crate::{
	_prelude::*,
	config::{self, ApiConfig, ApiEndpoints, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH},
};

/// Errors raised while constructing or validating configurations.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ApiConfigError {
	/// Base URL cannot carry paths (e.g. `mailto:` or `data:` URLs).
	#[error("The base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// URL that failed validation.
		url: String,
	},
	/// An endpoint path could not be joined onto the base URL.
	#[error("The {endpoint} path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Path that failed to resolve.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they target a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ApiConfig`] values.
#[derive(Debug)]
pub struct ApiConfigBuilder {
	/// Base URL of the remote API.
	pub base_url: Url,
	/// Refresh endpoint path, joined onto the base URL.
	pub refresh_path: String,
	/// Login endpoint path, joined onto the base URL.
	pub login_path: String,
}
impl ApiConfigBuilder {
	/// Creates a new builder seeded with the default endpoint paths.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: DEFAULT_REFRESH_PATH.into(),
			login_path: DEFAULT_LOGIN_PATH.into(),
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the login endpoint path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ApiConfig, ApiConfigError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ApiConfigError::CannotBeABase { url: self.base_url.to_string() });
		}

		let refresh = join("refresh", &self.base_url, &self.refresh_path)?;
		let login = join("login", &self.base_url, &self.login_path)?;
		let config =
			ApiConfig { base_url: self.base_url, endpoints: ApiEndpoints { refresh, login } };

		config.validate()?;

		Ok(config)
	}
}

impl ApiConfig {
	/// Validates invariants for the configuration.
	fn validate(&self) -> Result<(), ApiConfigError> {
		validate_endpoint("base", &self.base_url)?;
		validate_endpoint("refresh", &self.endpoints.refresh)?;
		validate_endpoint("login", &self.endpoints.login)?;

		Ok(())
	}
}

fn join(endpoint: &'static str, base: &Url, path: &str) -> Result<Url, ApiConfigError> {
	base.join(path).map_err(|source| ApiConfigError::InvalidPath {
		endpoint,
		path: path.to_owned(),
		source,
	})
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ApiConfigError> {
	if url.scheme() == "https" || (url.scheme() == "http" && config::is_loopback(url)) {
		Ok(())
	} else {
		Err(ApiConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}
