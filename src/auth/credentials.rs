//! Snapshot of the credentials held for the current browsing session.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Credentials stored for the active session.
///
/// Every field is optional because a session can be partially populated: a login
/// response may omit the refresh token, and a terminal refresh failure clears the
/// access token while the caller still holds an older snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
	/// Short-lived bearer credential authorizing API calls.
	pub access_token: Option<TokenSecret>,
	/// Longer-lived credential used solely to mint a new access token.
	pub refresh_token: Option<TokenSecret>,
	/// Email address the user logged in with.
	pub user_email: Option<String>,
	/// Remote user identifier returned by the login endpoint.
	pub user_id: Option<String>,
}
impl SessionCredentials {
	/// Returns `true` when an access token is present.
	pub fn is_authenticated(&self) -> bool {
		self.access_token.is_some()
	}

	/// Returns `true` when neither token is present.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_output_redacts_tokens() {
		let credentials = SessionCredentials {
			access_token: Some(TokenSecret::new("access-secret")),
			refresh_token: Some(TokenSecret::new("refresh-secret")),
			user_email: Some("ada@example.com".into()),
			user_id: Some("42".into()),
		};
		let rendered = format!("{credentials:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
		assert!(rendered.contains("ada@example.com"));
		assert!(credentials.is_authenticated());
		assert!(!credentials.is_empty());
		assert!(SessionCredentials::default().is_empty());
	}
}
