//! Crate-level error types shared by the coordinator, session stores, and transports.

// crates.io
use oauth2::HttpClientError;
// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Upstream answered with a body the client could not use.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Login endpoint rejected the submitted credentials.
	#[error("{message}")]
	Login {
		/// Displayable message derived from the login response.
		message: String,
		/// HTTP status code, when a response was received.
		status: Option<u16>,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A path could not be joined onto the configured base URL.
	#[error("Path `{path}` cannot be resolved against the API base URL.")]
	InvalidPath {
		/// Path that failed to resolve.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialization(#[source] serde_json::Error),
	/// The refresh endpoint was handed to the authenticated request path.
	#[error("The refresh endpoint `{url}` cannot be wrapped in an authenticated request.")]
	RefreshEndpointWrapped {
		/// Offending request URL.
		url: String,
	},
}
impl From<oauth2::http::header::InvalidHeaderValue> for ConfigError {
	fn from(e: oauth2::http::header::InvalidHeaderValue) -> Self {
		Self::HttpRequest(e.into())
	}
}
impl From<oauth2::http::header::InvalidHeaderName> for ConfigError {
	fn from(e: oauth2::http::header::InvalidHeaderName) -> Self {
		Self::HttpRequest(e.into())
	}
}

/// Failures caused by unexpected upstream responses.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Endpoint returned a response the client cannot act on.
	#[error("Endpoint returned an unexpected response: {message}.")]
	UnexpectedResponse {
		/// Summary of what was missing or wrong.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Endpoint responded with malformed JSON that could not be parsed.
	#[error("Endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
	/// HTTP client failure that carries only a message.
	#[error("HTTP client error occurred while calling the API: {message}.")]
	Other {
		/// Client-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Converts an [`HttpClientError`] emitted by a transport into an [`Error`].
pub fn map_transport_error<E>(err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { message }.into(),
		other => TransportError::Other {
			message: format!("unhandled HTTP client error variant: {other:?}"),
		}
		.into(),
	}
}
