//! Transport primitives the decorators wrap.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack: "send this request, return a
//! response or an error". Both [`AssertionTransport`](crate::transport::AssertionTransport) and
//! [`ScopedTokenTransport`](crate::transport::ScopedTokenTransport) implement it themselves, so
//! they can be stacked or handed to code that only knows the capability. Retries, redirects, and
//! connection pooling stay with the wrapped implementation.

// crates.io
use ::http::{
	Extensions, HeaderMap, HeaderValue,
	header::{ACCEPT, InvalidHeaderValue},
};
// self
use crate::_prelude::*;

/// Outgoing request type accepted by every transport.
pub type HttpRequest = ::http::Request<Vec<u8>>;
/// Response type returned by every transport.
pub type HttpResponse = ::http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::send`].
pub type SendFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Accept header value appended to every outgoing request.
pub const ACCEPT_HEADER_VALUE: &str = "application/vnd.github.v3+json";

/// Opaque request sender.
///
/// Implementations must be `Send + Sync + 'static` so one instance can be shared by any number of
/// concurrent callers, and the returned future must be `Send` so callers can spawn it. Dropping the
/// future cancels the request.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted when no response could be produced.
	type Error: 'static + Send + Sync + StdError;

	/// Sends `request` and resolves to the upstream response.
	fn send(&self, request: HttpRequest) -> SendFuture<'_, Self::Error>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	type Error = T::Error;

	fn send(&self, request: HttpRequest) -> SendFuture<'_, Self::Error> {
		(**self).send(request)
	}
}

/// Absolute deadline carried in a request's [`Extensions`].
///
/// Transports bound signing, the wait for an in-flight refresh, the token issuance call, and the
/// final send by it, failing with [`Error::DeadlineExceeded`] once it passes. The remaining time is
/// measured on the transport's clock and waited out on the Tokio timer, so a deadline needs a Tokio
/// runtime with the time driver enabled. Custom signers see it through
/// [`SignContext`](crate::sign::SignContext).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestDeadline(pub OffsetDateTime);
impl RequestDeadline {
	/// Reads the deadline attached to a request, if any.
	pub fn from_extensions(extensions: &Extensions) -> Option<Self> {
		extensions.get::<Self>().copied()
	}
}

/// Thin wrapper around [`ReqwestClient`] so the default stack lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	type Error = ReqwestError;

	fn send(&self, request: HttpRequest) -> SendFuture<'_, Self::Error> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(reqwest::Request::try_from(request)?).await?;
			let status = response.status();
			let version = response.version();
			let headers = response.headers().to_owned();
			let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

			*converted.status_mut() = status;
			*converted.version_mut() = version;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Appends [`ACCEPT_HEADER_VALUE`] after any caller-supplied `Accept` values.
///
/// Nothing is added when the caller already sent that exact value.
pub fn append_accept(headers: &mut HeaderMap) {
	if headers.get_all(ACCEPT).iter().any(|value| value == ACCEPT_HEADER_VALUE) {
		return;
	}

	headers.append(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER_VALUE));
}

/// Builds a sensitive `Authorization` header value (`<scheme> <credential>`).
pub fn authorization_value(
	scheme: &str,
	credential: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
	let mut value = HeaderValue::try_from(format!("{scheme} {credential}"))?;

	value.set_sensitive(true);

	Ok(value)
}

/// Joins `path` onto `base` with exactly one `/` between them.
///
/// [`Url::join`] drops the last base segment when the base lacks a trailing slash, and naive string
/// concatenation doubles the separator when it has one. Upstream answers a doubled separator with an
/// authorization failure, so both base forms must yield the same URL.
pub fn join_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
	let base = base.as_str().trim_end_matches('/');
	let path = path.trim_start_matches('/');

	Url::parse(&format!("{base}/{path}"))
}

/// Fails with [`Error::DeadlineExceeded`] when `deadline` is not after `now`.
pub(crate) fn check_deadline(
	deadline: Option<RequestDeadline>,
	now: OffsetDateTime,
	stage: &'static str,
) -> Result<()> {
	match deadline {
		Some(RequestDeadline(deadline)) if deadline <= now => Err(Error::DeadlineExceeded { stage }),
		_ => Ok(()),
	}
}

/// Drives `future` until it completes or `deadline` passes, whichever comes first.
///
/// The pending future is dropped when the deadline wins. Without a deadline the future runs
/// unbounded.
pub(crate) async fn within_deadline<F>(
	deadline: Option<RequestDeadline>,
	now: OffsetDateTime,
	stage: &'static str,
	future: F,
) -> Result<F::Output>
where
	F: Future,
{
	check_deadline(deadline, now, stage)?;

	let Some(RequestDeadline(deadline)) = deadline else {
		return Ok(future.await);
	};

	tokio::time::timeout((deadline - now).unsigned_abs(), future)
		.await
		.map_err(|_| Error::DeadlineExceeded { stage })
}
