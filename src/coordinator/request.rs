//! Retry-once authenticated request wrapper.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	coordinator::Coordinator,
	error::{self, ConfigError},
	http::{ApiHttpClient, ApiRequest, ApiResponse},
	obs::{FlowKind, FlowSpan},
	store::SessionKey,
};

impl<C> Coordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Sends `request` with the current bearer token.
	///
	/// A 401 response triggers one refresh (shared with every concurrent caller) and one
	/// replay with the new token. When no access token is available but a refresh token is
	/// stored, the refresh happens before the first dispatch and counts as the request's only
	/// refresh. Every other status is returned untouched.
	///
	/// When the refresh fails the session has already been cleared and the original 401 is
	/// returned with [`ApiResponse::requires_reauthentication`] set.
	pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
		if self.config.is_refresh_endpoint(&request.url) {
			return Err(ConfigError::RefreshEndpointWrapped { url: request.url.to_string() }.into());
		}

		let span = FlowSpan::new(FlowKind::Request, "request");
		let result = span.instrument(self.request_with_retry(&request)).await;

		span.record_result(&result);

		result
	}

	/// Resolves `path` against the configured API base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		Ok(self.config.url(path)?)
	}

	async fn request_with_retry(&self, request: &ApiRequest) -> Result<ApiResponse> {
		let epoch = self.refresh_epoch();
		let mut token = self.current_token().await?;
		let mut refresh_spent = false;

		if token.is_none() && self.stored_secret(SessionKey::RefreshToken).await?.is_some() {
			token = self.refresh_since(epoch, None).await;
			refresh_spent = true;
		}

		let response = self.dispatch(request, token.as_ref()).await?;

		if refresh_spent {
			return Ok(match token {
				Some(_) => response.mark_refreshed(),
				None if response.is_unauthorized() => response.mark_reauthentication_required(),
				None => response,
			});
		}
		if !response.is_unauthorized() {
			return Ok(response);
		}

		match self.refresh_since(epoch, token.as_ref()).await {
			Some(token) => Ok(self.dispatch(request, Some(&token)).await?.mark_refreshed()),
			None => Ok(response.mark_reauthentication_required()),
		}
	}

	async fn dispatch(
		&self,
		request: &ApiRequest,
		bearer: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let request = request.to_http(bearer)?;
		let response =
			self.http_client.execute(request).await.map_err(error::map_transport_error)?;

		Ok(ApiResponse::new(response))
	}
}
