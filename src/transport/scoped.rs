//! Installation-level authentication with a cached, single-flight refreshed token.
//!
//! A [`ScopedTokenTransport`] keeps at most one installation token. Requests that find it outside
//! the refresh skew attach it under a read lock and never wait on anything. Otherwise the caller
//! takes the refresh guard, re-checks the slot (another caller may have refreshed while it waited),
//! and only then exchanges a fresh assertion for a new token. Concurrent callers that need a
//! refresh therefore trigger exactly one issuance call and all observe its result.
//!
//! A failed refresh falls back to the cached token while that token has not actually expired, so
//! an outage of the token endpoint only surfaces once the last token is unusable.

mod metrics;

pub use metrics::IssuanceMetrics;

// std
use std::{path::Path, time::Instant};
// crates.io
use ::http::{
	Extensions, Method,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	clock::Clock,
	error::{ConfigError, IssuanceError, TransportError},
	http::{self, HttpRequest, HttpTransport, RequestDeadline, SendFuture},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	token::{AccessTokenResponse, CachedToken, IssuanceRequest, Repository, TokenSecret},
	transport::{
		AssertionTransport, DEFAULT_BASE_URL, DEFAULT_REFRESH_SKEW, INSTALLATION_TOKEN_LIFETIME,
		ISSUANCE_COLLECTION,
	},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Scoped token transport specialized for the crate's default reqwest stack.
pub type ReqwestScopedTokenTransport = ScopedTokenTransport<ReqwestTransport>;

/// Decorator that authenticates every request as one installation of the app.
///
/// Share one instance (behind an [`Arc`]) across every caller of the same installation; the cache
/// and the refresh guard live inside it.
pub struct ScopedTokenTransport<T>
where
	T: ?Sized + HttpTransport,
{
	assertion: AssertionTransport<T>,
	installation_id: u64,
	base_url: Url,
	endpoint: Url,
	refresh_skew: Duration,
	issuance_request: RwLock<Option<IssuanceRequest>>,
	token: RwLock<Option<CachedToken>>,
	refresh_guard: AsyncMutex<()>,
	metrics: IssuanceMetrics,
}
impl<T> ScopedTokenTransport<T>
where
	T: ?Sized + HttpTransport,
{
	/// Starts configuring a transport for `installation_id` on top of an app transport.
	pub fn builder(
		assertion: AssertionTransport<T>,
		installation_id: u64,
	) -> ScopedTokenTransportBuilder<T> {
		ScopedTokenTransportBuilder {
			assertion,
			installation_id,
			base_url: None,
			issuance_request: None,
			refresh_skew: DEFAULT_REFRESH_SKEW,
		}
	}

	/// Builds a transport for a numeric app ID from a PEM-encoded RSA private key.
	pub fn new(
		transport: Arc<T>,
		app_id: u64,
		installation_id: u64,
		private_key: impl AsRef<[u8]>,
	) -> Result<Self, ConfigError> {
		Self::from_assertion(AssertionTransport::new(transport, app_id, private_key)?, installation_id)
	}

	/// Builds a transport for a numeric app ID from a PEM key file.
	pub fn from_key_file(
		transport: Arc<T>,
		app_id: u64,
		installation_id: u64,
		path: impl AsRef<Path>,
	) -> Result<Self, ConfigError> {
		Self::from_assertion(AssertionTransport::from_key_file(transport, app_id, path)?, installation_id)
	}

	/// Builds a transport with default settings on top of an existing app transport.
	pub fn from_assertion(
		assertion: AssertionTransport<T>,
		installation_id: u64,
	) -> Result<Self, ConfigError> {
		Self::builder(assertion, installation_id).build()
	}

	/// Installation the tokens are scoped to.
	pub fn installation_id(&self) -> u64 {
		self.installation_id
	}

	/// Issuer of the app assertions used for issuance.
	pub fn issuer(&self) -> &str {
		self.assertion.issuer()
	}

	/// Numeric app ID, or `None` when the app was configured with a client ID.
	pub fn app_id(&self) -> Option<u64> {
		self.assertion.app_id()
	}

	/// API base URL the token endpoint is resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Fully resolved token endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// How far before expiry the cached token is refreshed.
	pub fn refresh_skew(&self) -> Duration {
		self.refresh_skew
	}

	/// App transport used for issuance calls.
	pub fn assertion(&self) -> &AssertionTransport<T> {
		&self.assertion
	}

	/// Issuance counters for this transport.
	pub fn metrics(&self) -> &IssuanceMetrics {
		&self.metrics
	}

	/// Scoping sent with the next issuance call.
	pub fn issuance_request(&self) -> Option<IssuanceRequest> {
		self.issuance_request.read().clone()
	}

	/// Replaces the scoping sent with subsequent issuance calls.
	///
	/// The cached token is kept until it needs refreshing.
	pub fn set_issuance_request(&self, request: Option<IssuanceRequest>) {
		*self.issuance_request.write() = request;
	}

	/// Snapshot of the cached token, if any.
	pub fn cached_token(&self) -> Option<CachedToken> {
		self.token.read().clone()
	}

	/// Expiry of the cached token, if any.
	pub fn expiry(&self) -> Option<OffsetDateTime> {
		self.token.read().as_ref().map(CachedToken::expires_at)
	}

	/// Permissions granted to the cached token, if any.
	pub fn permissions(&self) -> Option<BTreeMap<String, String>> {
		self.token.read().as_ref().map(|token| token.permissions().clone())
	}

	/// Repositories the cached token is limited to, if any.
	pub fn repositories(&self) -> Option<Vec<Repository>> {
		self.token.read().as_ref().map(|token| token.repositories().to_vec())
	}

	/// Returns a usable installation token, refreshing it when needed.
	pub async fn token(&self) -> Result<TokenSecret> {
		self.with_token(&Extensions::new(), |token| token.token().clone()).await
	}

	fn clock(&self) -> &dyn Clock {
		&**self.assertion.clock()
	}

	fn read_fresh<R>(&self, now: OffsetDateTime, f: &impl Fn(&CachedToken) -> R) -> Option<R> {
		self.token
			.read()
			.as_ref()
			.filter(|token| token.is_usable_at(now, self.refresh_skew))
			.map(f)
	}

	fn record_reuse(&self) {
		self.metrics.record_cache_hit();
		obs::record_flow_outcome(FlowKind::Installation, FlowOutcome::Reused);
		obs::trace_outcome(FlowKind::Installation, FlowOutcome::Reused);
	}

	async fn with_token<R>(&self, extensions: &Extensions, f: impl Fn(&CachedToken) -> R) -> Result<R> {
		if let Some(value) = self.read_fresh(self.clock().now(), &f) {
			self.record_reuse();

			return Ok(value);
		}

		let deadline = RequestDeadline::from_extensions(extensions);
		let _singleflight = http::within_deadline(
			deadline,
			self.clock().now(),
			"issuance",
			self.refresh_guard.lock(),
		)
		.await?;
		let now = self.clock().now();

		if let Some(value) = self.read_fresh(now, &f) {
			self.record_reuse();

			return Ok(value);
		}

		http::check_deadline(deadline, now, "issuance")?;

		match self.issue(extensions).await {
			Ok(token) => {
				let value = f(&token);

				*self.token.write() = Some(token);

				Ok(value)
			},
			Err(err @ Error::DeadlineExceeded { .. }) => Err(err),
			Err(err) => {
				let now = self.clock().now();
				let fallback = self
					.token
					.read()
					.as_ref()
					.filter(|token| !token.is_expired_at(now))
					.map(&f);

				match fallback {
					Some(value) => {
						self.metrics.record_fallback();
						obs::record_flow_outcome(FlowKind::Installation, FlowOutcome::Degraded);
						obs::trace_outcome(FlowKind::Installation, FlowOutcome::Degraded);

						Ok(value)
					},
					None => Err(err),
				}
			},
		}
	}

	fn issuance_http_request(&self, extensions: &Extensions) -> Result<HttpRequest, ConfigError> {
		let body = self
			.issuance_request
			.read()
			.as_ref()
			.filter(|request| !request.is_empty())
			.map(serde_json::to_vec)
			.transpose()
			.map_err(|source| ConfigError::InvalidIssuanceRequest { source })?;
		let mut builder = ::http::Request::builder().method(Method::POST).uri(self.endpoint.as_str());

		if body.is_some() {
			builder = builder.header(CONTENT_TYPE, "application/json");
		}

		let mut request = builder.body(body.unwrap_or_default())?;

		*request.extensions_mut() = extensions.clone();

		Ok(request)
	}

	async fn issue(&self, extensions: &Extensions) -> Result<CachedToken> {
		const KIND: FlowKind = FlowKind::Issuance;

		let installation_id = self.installation_id;
		let span = FlowSpan::for_installation(KIND, "issue", installation_id);
		let started = Instant::now();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async move {
				let request = self.issuance_http_request(extensions)?;
				let sent = http::within_deadline(
					RequestDeadline::from_extensions(extensions),
					self.clock().now(),
					"issuance",
					self.assertion.send(request),
				)
				.await
				.and_then(|sent| sent);
				let response = match sent {
					Ok(response) => response,
					Err(Error::DeadlineExceeded { .. }) =>
						return Err(Error::DeadlineExceeded { stage: "issuance" }),
					Err(Error::Signing(source)) =>
						return Err(IssuanceError::Signing { installation_id, source }.into()),
					Err(Error::Transport(source)) =>
						return Err(IssuanceError::Transport { installation_id, source }.into()),
					Err(err) => return Err(err),
				};
				let status = response.status();

				if !status.is_success() {
					return Err(IssuanceError::Rejected {
						installation_id,
						status: status.as_u16(),
						body: String::from_utf8_lossy(response.body()).into_owned(),
					}
					.into());
				}

				let payload = AccessTokenResponse::from_slice(response.body()).map_err(|source| {
					IssuanceError::MalformedResponse { installation_id, status: status.as_u16(), source }
				})?;

				CachedToken::from_response(payload)
					.map_err(|_| Error::from(IssuanceError::InvalidToken { installation_id }))
			})
			.await;

		obs::record_issuance_latency(started.elapsed(), result.is_ok());

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}
}
impl<T> HttpTransport for ScopedTokenTransport<T>
where
	T: ?Sized + HttpTransport,
{
	type Error = Error;

	fn send(&self, mut request: HttpRequest) -> SendFuture<'_, Self::Error> {
		const KIND: FlowKind = FlowKind::Installation;

		Box::pin(async move {
			let span = FlowSpan::for_installation(KIND, "send", self.installation_id);

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span
				.instrument(async move {
					let deadline = RequestDeadline::from_extensions(request.extensions());
					let authorization = self
						.with_token(request.extensions(), |token| token.authorization().clone())
						.await?;
					let headers = request.headers_mut();

					headers.insert(AUTHORIZATION, authorization);
					http::append_accept(headers);

					let sending = self.assertion.transport().send(request);

					http::within_deadline(deadline, self.clock().now(), "send", sending)
						.await?
						.map_err(|err| Error::from(TransportError::network(err)))
				})
				.await;

			match &result {
				Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
				Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
			}

			result
		})
	}
}
impl<T> Debug for ScopedTokenTransport<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ScopedTokenTransport")
			.field("assertion", &self.assertion)
			.field("installation_id", &self.installation_id)
			.field("endpoint", &self.endpoint.as_str())
			.field("refresh_skew", &self.refresh_skew)
			.field("token", &*self.token.read())
			.finish()
	}
}

/// Builder for [`ScopedTokenTransport`].
pub struct ScopedTokenTransportBuilder<T>
where
	T: ?Sized + HttpTransport,
{
	assertion: AssertionTransport<T>,
	installation_id: u64,
	base_url: Option<String>,
	issuance_request: Option<IssuanceRequest>,
	refresh_skew: Duration,
}
impl<T> ScopedTokenTransportBuilder<T>
where
	T: ?Sized + HttpTransport,
{
	/// Overrides the API base URL (defaults to [`DEFAULT_BASE_URL`]).
	///
	/// An empty string keeps the default. A trailing slash is optional.
	pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
		let base_url = base_url.into();

		self.base_url = if base_url.is_empty() { None } else { Some(base_url) };

		self
	}

	/// Scopes issued tokens to a subset of repositories or permissions.
	pub fn issuance_request(mut self, request: IssuanceRequest) -> Self {
		self.issuance_request = Some(request);

		self
	}

	/// Overrides how far before expiry the cached token is refreshed (defaults to one minute).
	///
	/// Must not be negative and must stay below [`INSTALLATION_TOKEN_LIFETIME`].
	pub fn refresh_skew(mut self, skew: Duration) -> Self {
		self.refresh_skew = skew;

		self
	}

	/// Validates the refresh skew and base URL, then resolves the token endpoint.
	pub fn build(self) -> Result<ScopedTokenTransport<T>, ConfigError> {
		if self.refresh_skew.is_negative() {
			return Err(ConfigError::InvalidDuration {
				setting: "refresh_skew",
				reason: "must not be negative",
			});
		}

		if self.refresh_skew >= INSTALLATION_TOKEN_LIFETIME {
			return Err(ConfigError::InvalidDuration {
				setting: "refresh_skew",
				reason: "must be shorter than the one-hour token lifetime",
			});
		}

		let raw = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
		let invalid =
			|source| ConfigError::InvalidBaseUrl { url: raw.to_owned(), source };
		let base_url = Url::parse(raw).map_err(invalid)?;
		let endpoint = http::join_url(
			&base_url,
			&format!("{ISSUANCE_COLLECTION}/{}/access_tokens", self.installation_id),
		)
		.map_err(invalid)?;

		Ok(ScopedTokenTransport {
			assertion: self.assertion,
			installation_id: self.installation_id,
			base_url,
			endpoint,
			refresh_skew: self.refresh_skew,
			issuance_request: RwLock::new(self.issuance_request),
			token: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			metrics: IssuanceMetrics::default(),
		})
	}
}
impl<T> Debug for ScopedTokenTransportBuilder<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ScopedTokenTransportBuilder")
			.field("assertion", &self.assertion)
			.field("installation_id", &self.installation_id)
			.field("base_url", &self.base_url)
			.field("refresh_skew", &self.refresh_skew)
			.finish()
	}
}
