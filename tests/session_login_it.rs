#![cfg(feature = "reqwest")]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
// self
use portal_session::{
	_preludet::*,
	coordinator::{DEFAULT_LOGIN_FAILURE, LoginRequest},
	error::TransientError,
	http::ApiRequest,
	store::{SessionKey, SessionStore},
};

fn login_request() -> LoginRequest {
	LoginRequest::new("ada@example.com", "correct horse")
}

#[tokio::test]
async fn login_stores_session_and_primes_requests() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/users/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body("username=ada%40example.com&password=correct+horse");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-login\",\"refresh_token\":\"refresh-login\",\"token_type\":\"bearer\",\"user_id\":42}",
			);
		})
		.await;
	let profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me").header("authorization", "Bearer access-login");
			then.status(200).body("{}");
		})
		.await;
	let session = coordinator.login(login_request()).await.expect("Login should succeed.");

	assert_eq!(session.access_token.as_ref().map(|t| t.expose()), Some("access-login"));
	assert_eq!(session.refresh_token.as_ref().map(|t| t.expose()), Some("refresh-login"));
	assert_eq!(session.user_email.as_deref(), Some("ada@example.com"));
	assert_eq!(session.user_id.as_deref(), Some("42"));

	let snapshot = store.snapshot();

	assert_eq!(snapshot.get("userToken").map(String::as_str), Some("access-login"));
	assert_eq!(snapshot.get("refreshToken").map(String::as_str), Some("refresh-login"));
	assert_eq!(snapshot.get("userEmail").map(String::as_str), Some("ada@example.com"));
	assert_eq!(snapshot.get("userId").map(String::as_str), Some("42"));
	assert_eq!(
		coordinator.credentials().await.expect("Credentials should be readable."),
		session
	);

	let url = coordinator.endpoint("/api/users/me").expect("Profile path should resolve.");
	let response =
		coordinator.request(ApiRequest::get(url)).await.expect("Profile request should succeed.");

	assert!(response.is_success());

	login.assert_async().await;
	profile.assert_async().await;
}

#[tokio::test]
async fn login_replaces_previous_session_values() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));

	seed_session(&store, Some("access-previous"), Some("refresh-previous")).await;
	store
		.set(SessionKey::UserId, "7".into())
		.await
		.expect("Seeding the user id should succeed.");

	let _login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-login\"}");
		})
		.await;

	coordinator.login(login_request()).await.expect("Login should succeed.");

	assert!(!store.contains(SessionKey::RefreshToken));
	assert!(!store.contains(SessionKey::UserId));
	assert_eq!(
		store.snapshot().get(SessionKey::AccessToken.as_str()).map(String::as_str),
		Some("access-login")
	);
}

#[tokio::test]
async fn login_failure_uses_detail_string() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));
	let _login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"detail\":\"Incorrect email or password\"}");
		})
		.await;
	let err = coordinator.login(login_request()).await.expect_err("Login should be rejected.");

	assert!(matches!(
		&err,
		Error::Login { message, status: Some(401) } if message == "Incorrect email or password"
	));
	assert!(store.is_empty());
}

#[tokio::test]
async fn login_failure_joins_validation_details() {
	let server = MockServer::start_async().await;
	let (coordinator, _store) =
		build_reqwest_test_coordinator(test_api_config(&server.base_url()));
	let _login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/token");
			then.status(422).header("content-type", "application/json").body(
				"{\"detail\":[{\"loc\":[\"body\",\"username\"],\"msg\":\"field required\"},{\"loc\":[\"body\",\"password\"]}]}",
			);
		})
		.await;
	let err = coordinator.login(login_request()).await.expect_err("Login should be rejected.");

	assert_eq!(err.to_string(), "field required. Validation error");
}

#[tokio::test]
async fn login_failure_without_detail_uses_default_message() {
	let server = MockServer::start_async().await;
	let (coordinator, _store) =
		build_reqwest_test_coordinator(test_api_config(&server.base_url()));
	let _login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/token");
			then.status(400).header("content-type", "application/json").body("{}");
		})
		.await;
	let err = coordinator.login(login_request()).await.expect_err("Login should be rejected.");

	assert_eq!(err.to_string(), DEFAULT_LOGIN_FAILURE);
}

#[tokio::test]
async fn login_non_json_response_reports_body_text() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));
	let _login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/token");
			then.status(502).header("content-type", "text/html").body("Bad Gateway");
		})
		.await;
	let err = coordinator.login(login_request()).await.expect_err("Login should be rejected.");

	assert!(matches!(
		&err,
		Error::Login { message, status: Some(502) } if message == "Bad Gateway"
	));
	assert!(store.is_empty());
}

#[tokio::test]
async fn login_success_without_access_token_is_transient() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));
	let _login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token_type\":\"bearer\"}");
		})
		.await;
	let err = coordinator.login(login_request()).await.expect_err("Login should fail.");

	assert!(matches!(err, Error::Transient(TransientError::UnexpectedResponse { .. })));
	assert!(store.is_empty());
}

#[tokio::test]
async fn logout_clears_store_and_cached_token() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));
	let _login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-login\",\"refresh_token\":\"refresh-login\"}");
		})
		.await;
	let anonymous = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me").header_missing("authorization");
			then.status(401).body("{\"detail\":\"Not authenticated\"}");
		})
		.await;

	coordinator.login(login_request()).await.expect("Login should succeed.");

	assert!(coordinator.is_authenticated().await.expect("Store reads should succeed."));

	coordinator.logout().await.expect("Logout should succeed.");

	assert!(store.is_empty());
	assert!(!coordinator.is_authenticated().await.expect("Store reads should succeed."));

	let url = coordinator.endpoint("/api/users/me").expect("Profile path should resolve.");
	let response =
		coordinator.request(ApiRequest::get(url)).await.expect("Request should complete.");

	assert!(response.requires_reauthentication());

	anonymous.assert_async().await;
}

#[tokio::test]
async fn refresh_queued_behind_login_reuses_login_token() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));

	seed_session(&store, Some("access-old"), Some("refresh-old")).await;

	let _login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-login\",\"refresh_token\":\"refresh-login\"}");
		})
		.await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders").header("authorization", "Bearer access-old");
			then.status(401).delay(Duration::from_millis(300)).body("{}");
		})
		.await;
	let replayed = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders").header("authorization", "Bearer access-login");
			then.status(200).body("[]");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/token/refresh");
			then.status(500);
		})
		.await;
	let url = coordinator.endpoint("/api/orders").expect("Orders path should resolve.");
	let (response, login) =
		tokio::join!(coordinator.request(ApiRequest::get(url)), coordinator.login(login_request()));

	login.expect("Login should succeed.");

	let response = response.expect("Orders request should complete.");

	assert_eq!(response.status().as_u16(), 200);
	assert!(response.was_refreshed());
	assert_eq!(
		store.snapshot().get(SessionKey::AccessToken.as_str()).map(String::as_str),
		Some("access-login")
	);

	expired.assert_calls_async(1).await;
	replayed.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn restore_migrates_legacy_token_and_primes_cache() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));

	store
		.set(SessionKey::LegacyAccessToken, "access-legacy".into())
		.await
		.expect("Seeding the legacy token should succeed.");
	store
		.set(SessionKey::UserEmail, "ada@example.com".into())
		.await
		.expect("Seeding the user email should succeed.");

	let session = coordinator
		.restore_session()
		.await
		.expect("Restore should succeed.")
		.expect("A stored session should be restored.");

	assert_eq!(session.access_token.as_ref().map(|t| t.expose()), Some("access-legacy"));
	assert_eq!(session.user_email.as_deref(), Some("ada@example.com"));
	assert!(!store.contains(SessionKey::LegacyAccessToken));
	assert!(store.contains(SessionKey::AccessToken));
	assert!(coordinator.is_authenticated().await.expect("Store reads should succeed."));
}

#[tokio::test]
async fn restore_without_tokens_returns_none() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));

	store
		.set(SessionKey::UserEmail, "ada@example.com".into())
		.await
		.expect("Seeding the user email should succeed.");

	assert!(coordinator.restore_session().await.expect("Restore should succeed.").is_none());
}

#[tokio::test]
async fn login_email_is_trimmed_before_submit_and_storage() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_reqwest_test_coordinator(test_api_config(&server.base_url()));
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/users/token")
				.body("username=ada%40example.com&password=correct+horse");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-login\"}");
		})
		.await;
	let session = coordinator
		.login(LoginRequest::new("  ada@example.com \t", "correct horse"))
		.await
		.expect("Login should succeed.");

	assert_eq!(session.user_email.as_deref(), Some("ada@example.com"));
	assert_eq!(
		store.snapshot().get(SessionKey::UserEmail.as_str()).map(String::as_str),
		Some("ada@example.com")
	);

	login.assert_async().await;
}

#[tokio::test]
async fn failed_session_write_leaves_no_partial_session() {
	let server = MockServer::start_async().await;
	let faulty = FaultyStore { fail_set: Some(SessionKey::RefreshToken), ..Default::default() };
	let store = faulty.inner.clone();
	let coordinator = build_reqwest_test_coordinator_with_store(
		Arc::new(faulty),
		test_api_config(&server.base_url()),
	);

	seed_session(&store, Some("access-previous"), None).await;

	let _login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/users/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-login\",\"refresh_token\":\"refresh-login\"}");
		})
		.await;
	let anonymous = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me").header_missing("authorization");
			then.status(401).body("{\"detail\":\"Not authenticated\"}");
		})
		.await;
	let err = coordinator
		.login(login_request())
		.await
		.expect_err("A store that refuses the refresh token should fail the login.");

	assert!(matches!(err, Error::Storage(_)));
	assert!(store.is_empty());
	assert!(!coordinator.is_authenticated().await.expect("Store reads should succeed."));

	let url = coordinator.endpoint("/api/users/me").expect("Profile path should resolve.");
	let response =
		coordinator.request(ApiRequest::get(url)).await.expect("Request should complete.");

	assert!(response.requires_reauthentication());

	anonymous.assert_async().await;
}
