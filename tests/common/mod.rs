//! Helpers shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use http::{HeaderMap, Method, StatusCode, header::ACCEPT};
use parking_lot::Mutex;
use time::{OffsetDateTime, macros};
// self
use ghapp_auth::{
	clock::ManualClock,
	http::{HttpRequest, HttpResponse, HttpTransport, SendFuture},
	transport::AssertionTransport,
};

/// RSA private key matching [`PUBLIC_KEY`].
pub const PRIVATE_KEY: &str = include_str!("../fixtures/private-key.pem");
/// RSA public key used to verify signed assertions.
pub const PUBLIC_KEY: &str = include_str!("../fixtures/public-key.pem");
/// App ID used by every fixture.
pub const APP_ID: u64 = 12345;
/// 2030-01-01T00:00:00Z as a Unix timestamp.
pub const EPOCH_2030: i64 = 1_893_456_000;

/// Fixed starting instant for manual clocks.
pub fn start() -> OffsetDateTime {
	macros::datetime!(2030-01-01 00:00 UTC)
}

/// Error returned by transports that refuse every request.
#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
pub struct Refused;

/// Snapshot of a request that reached a [`RecordingTransport`].
#[derive(Clone, Debug)]
pub struct Recorded {
	pub method: Method,
	pub uri: String,
	pub headers: HeaderMap,
	pub body: Vec<u8>,
}
impl Recorded {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	pub fn accept_values(&self) -> Vec<String> {
		self.headers
			.get_all(ACCEPT)
			.iter()
			.map(|value| value.to_str().expect("Accept header should be ASCII.").to_owned())
			.collect()
	}
}

type Responder = dyn Fn(&Recorded) -> Result<HttpResponse, Refused> + Send + Sync;

/// In-memory transport that records requests and answers through a closure.
pub struct RecordingTransport {
	requests: Mutex<Vec<Recorded>>,
	respond: Box<Responder>,
}
impl RecordingTransport {
	pub fn new(
		respond: impl 'static + Fn(&Recorded) -> Result<HttpResponse, Refused> + Send + Sync,
	) -> Arc<Self> {
		Arc::new(Self { requests: Mutex::new(Vec::new()), respond: Box::new(respond) })
	}

	/// Answers every request with `200 OK` and an empty body.
	pub fn ok() -> Arc<Self> {
		Self::new(|_| Ok(response(StatusCode::OK, Vec::new())))
	}

	/// Fails every request.
	pub fn refusing() -> Arc<Self> {
		Self::new(|_| Err(Refused))
	}

	pub fn requests(&self) -> Vec<Recorded> {
		self.requests.lock().clone()
	}
}
impl HttpTransport for RecordingTransport {
	type Error = Refused;

	fn send(&self, request: HttpRequest) -> SendFuture<'_, Self::Error> {
		let (parts, body) = request.into_parts();
		let recorded =
			Recorded { method: parts.method, uri: parts.uri.to_string(), headers: parts.headers, body };
		let result = (self.respond)(&recorded);

		self.requests.lock().push(recorded);

		Box::pin(async move { result })
	}
}

/// Transport that answers issuance with a token and other paths with `200 OK`, but holds any
/// request whose path ends with the stalled suffix for far longer than a test should wait.
pub struct StallingTransport {
	stalled: &'static str,
	calls: AtomicUsize,
}
impl StallingTransport {
	/// Time a stalled request is held before it answers.
	pub const STALL: StdDuration = StdDuration::from_secs(10);

	pub fn new(stalled: &'static str) -> Arc<Self> {
		Arc::new(Self { stalled, calls: AtomicUsize::new(0) })
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl HttpTransport for StallingTransport {
	type Error = Refused;

	fn send(&self, request: HttpRequest) -> SendFuture<'_, Self::Error> {
		let path = request.uri().path().to_owned();
		let stalled = path.ends_with(self.stalled);

		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if stalled {
				tokio::time::sleep(Self::STALL).await;
			}

			Ok(if path.ends_with("/access_tokens") {
				response(
					StatusCode::CREATED,
					r#"{"token":"ghs_slow","expires_at":"2030-01-01T01:00:00Z"}"#,
				)
			} else {
				response(StatusCode::OK, "{}")
			})
		})
	}
}

/// Builds a response with the given status and body.
pub fn response(status: StatusCode, body: impl Into<Vec<u8>>) -> HttpResponse {
	let mut response = HttpResponse::new(body.into());

	*response.status_mut() = status;

	response
}

/// Builds a GET request for `uri`.
pub fn get(uri: &str) -> HttpRequest {
	http::Request::get(uri).body(Vec::new()).expect("Fixture request should build.")
}

/// App transport over `transport` signing with the fixture key on `clock`.
pub fn app_transport<T>(transport: Arc<T>, clock: &ManualClock) -> AssertionTransport<T>
where
	T: HttpTransport,
{
	AssertionTransport::builder(transport)
		.app_id(APP_ID)
		.private_key_pem(PRIVATE_KEY)
		.clock(Arc::new(clock.clone()))
		.build()
		.expect("Assertion transport fixture should build.")
}
