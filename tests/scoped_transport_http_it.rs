#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
use time::{Duration, macros};
// self
use common::*;
use ghapp_auth::{
	clock::ManualClock,
	error::{Error, IssuanceError},
	http::{ACCEPT_HEADER_VALUE, HttpTransport, ReqwestTransport},
	token::IssuanceRequest,
	transport::{ReqwestScopedTokenTransport, ScopedTokenTransport},
};

const INSTALLATION_ID: u64 = 4242;
const TOKEN_PATH: &str = "/app/installations/4242/access_tokens";

fn scoped_with(
	base_url: impl Into<String>,
	clock: &ManualClock,
	request: Option<IssuanceRequest>,
) -> ReqwestScopedTokenTransport {
	let assertion = app_transport(Arc::new(ReqwestTransport::default()), clock);
	let mut builder = ScopedTokenTransport::builder(assertion, INSTALLATION_ID).base_url(base_url);

	if let Some(request) = request {
		builder = builder.issuance_request(request);
	}

	builder.build().expect("Scoped transport fixture should build.")
}

fn scoped(server: &MockServer, clock: &ManualClock) -> ReqwestScopedTokenTransport {
	scoped_with(server.base_url(), clock, None)
}

async fn mock_token<'a>(server: &'a MockServer, token: &str, expires_at: &str) -> httpmock::Mock<'a> {
	let body = json!({ "token": token, "expires_at": expires_at });

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header_exists("authorization")
				.header("accept", ACCEPT_HEADER_VALUE);
			then.status(201).header("content-type", "application/json").json_body(body);
		})
		.await
}

async fn mock_api<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
	let authorization = format!("token {token}");

	server
		.mock_async(|when, then| {
			when.method(GET).path("/repos/acme/octo").header("authorization", authorization);
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await
}

#[tokio::test]
async fn cached_token_is_reused_then_rotated() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let transport = scoped(&server, &clock);
	let mut first_token = mock_token(&server, "ghs_one", "2030-01-01T01:00:00Z").await;
	let first_api = mock_api(&server, "ghs_one").await;

	for _ in 0..3 {
		let response = transport
			.send(get(&server.url("/repos/acme/octo")))
			.await
			.expect("Cached request should succeed.");

		assert_eq!(response.status(), 200);
	}

	clock.advance(Duration::minutes(4));
	transport.send(get(&server.url("/repos/acme/octo"))).await.expect("Request should succeed.");

	first_token.assert_calls_async(1).await;
	first_api.assert_calls_async(4).await;
	first_token.delete_async().await;

	let second_token = mock_token(&server, "ghs_two", "2030-01-01T02:00:00Z").await;
	let second_api = mock_api(&server, "ghs_two").await;

	clock.set(macros::datetime!(2030-01-01 00:59:01 UTC));
	transport.send(get(&server.url("/repos/acme/octo"))).await.expect("Rotated request should succeed.");

	second_token.assert_calls_async(1).await;
	second_api.assert_calls_async(1).await;
	assert_eq!(transport.expiry(), Some(macros::datetime!(2030-01-01 02:00 UTC)));
}

#[tokio::test]
async fn rejection_surfaces_status_then_recovers() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let transport = scoped(&server, &clock);
	let mut rejected = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401).body(r#"{"message":"Bad credentials"}"#);
		})
		.await;
	let api = mock_api(&server, "ghs_ok").await;
	let err = transport
		.send(get(&server.url("/repos/acme/octo")))
		.await
		.expect_err("Rejected issuance should fail the request.");

	assert_eq!(err.status(), Some(401));
	assert!(matches!(
		err,
		Error::Issuance(IssuanceError::Rejected { installation_id: INSTALLATION_ID, status: 401, ref body })
			if body.contains("Bad credentials")
	));
	assert!(transport.cached_token().is_none());

	rejected.assert_calls_async(1).await;
	rejected.delete_async().await;

	let accepted = mock_token(&server, "ghs_ok", "2030-01-01T01:00:00Z").await;

	transport.send(get(&server.url("/repos/acme/octo"))).await.expect("Recovered request should succeed.");

	accepted.assert_calls_async(1).await;
	api.assert_calls_async(1).await;
	assert_eq!(transport.metrics().failures(), 1);
	assert_eq!(transport.metrics().successes(), 1);
}

#[tokio::test]
async fn trailing_slash_base_url_hits_the_same_endpoint() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let bare = scoped_with(server.base_url(), &clock, None);
	let slashed = scoped_with(format!("{}/", server.base_url()), &clock, None);
	let token = mock_token(&server, "ghs_slash", "2030-01-01T01:00:00Z").await;

	assert_eq!(bare.endpoint(), slashed.endpoint());

	bare.token().await.expect("Bare base URL should issue a token.");
	slashed.token().await.expect("Slashed base URL should issue a token.");

	token.assert_calls_async(2).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_callers_share_one_issuance() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let transport = Arc::new(scoped(&server, &clock));
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(201)
				.delay(std::time::Duration::from_millis(200))
				.json_body(json!({ "token": "ghs_flight", "expires_at": "2030-01-01T01:00:00Z" }));
		})
		.await;
	let api = mock_api(&server, "ghs_flight").await;
	let url = server.url("/repos/acme/octo");
	let handles = (0..64)
		.map(|_| {
			let transport = transport.clone();
			let request = get(&url);

			tokio::spawn(async move { transport.send(request).await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let response = handle
			.await
			.expect("Caller task should not panic.")
			.expect("Concurrent request should succeed.");

		assert_eq!(response.status(), 200);
	}

	token.assert_calls_async(1).await;
	api.assert_calls_async(64).await;
	assert_eq!(transport.metrics().attempts(), 1);
	assert_eq!(transport.metrics().cache_hits(), 63);
}

#[tokio::test]
async fn issuance_body_carries_scoping_and_echo_is_exposed() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let request = IssuanceRequest::default()
		.with_repository_ids([1234])
		.with_permission("contents", "read");
	let transport = scoped_with(server.base_url(), &clock, Some(request));
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("content-type", "application/json")
				.json_body(json!({ "repository_ids": [1234], "permissions": { "contents": "read" } }));
			then.status(201).json_body(json!({
				"token": "ghs_scoped",
				"expires_at": "2030-01-01T01:00:00Z",
				"permissions": { "contents": "read" },
				"repository_selection": "selected",
				"repositories": [{ "id": 1234, "name": "octo", "full_name": "acme/octo" }]
			}));
		})
		.await;
	let secret = transport.token().await.expect("Scoped token should be issued.");

	token.assert_calls_async(1).await;
	assert_eq!(secret.expose(), "ghs_scoped");
	assert_eq!(
		transport.permissions().and_then(|permissions| permissions.get("contents").cloned()),
		Some("read".into())
	);
	assert_eq!(
		transport.repositories().map(|repositories| repositories[0].full_name.clone()),
		Some(Some("acme/octo".into()))
	);
	assert_eq!(
		transport.cached_token().and_then(|token| token.repository_selection().map(ToOwned::to_owned)),
		Some("selected".into())
	);
}

#[tokio::test]
async fn malformed_payload_reports_the_failing_field() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(start());
	let transport = scoped(&server, &clock);
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(201).body(r#"{"token":"ghs_x","expires_at":"soon"}"#);
		})
		.await;
	let err = transport.token().await.expect_err("Malformed payload should fail.");

	match err {
		Error::Issuance(IssuanceError::MalformedResponse { status, source, .. }) => {
			assert_eq!(status, 201);
			assert_eq!(source.path().to_string(), "expires_at");
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn closed_port_is_not_a_rejection() {
	let clock = ManualClock::new(start());
	let transport = scoped_with("http://127.0.0.1:1", &clock, None);
	let err = transport.token().await.expect_err("Closed port should fail.");

	assert!(matches!(err, Error::Issuance(IssuanceError::Transport { .. })));
	assert_eq!(err.status(), None);
}
