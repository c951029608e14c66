//! App-level authentication with a freshly signed assertion per request.
//!
//! Every [`AssertionTransport::send`](HttpTransport::send) call builds new [`Claims`] (issued-at
//! backdated by [`DEFAULT_BACKDATE`] and truncated to whole seconds, expiring
//! [`DEFAULT_VALIDITY`] later), signs them, sets `Authorization: Bearer <assertion>`, appends the
//! required `Accept` value after any caller-supplied ones, and delegates to the wrapped transport.
//! Nothing is cached: an assertion is cheap to mint and only valid for a couple of minutes.

// std
use std::path::{Path, PathBuf};
// crates.io
use ::http::{Extensions, header::AUTHORIZATION};
use jsonwebtoken::EncodingKey;
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	error::{ConfigError, SigningError, TransportError},
	http::{self, HttpRequest, HttpTransport, RequestDeadline, SendFuture},
	identity::{AppIdentity, ClientId},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	sign::{Claims, ContextSigner, RsaSigner, SignContext, Signer, SignerAdapter},
	transport::{DEFAULT_BACKDATE, DEFAULT_VALIDITY, MAX_ASSERTION_LIFETIME},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Assertion transport specialized for the crate's default reqwest stack.
pub type ReqwestAssertionTransport = AssertionTransport<ReqwestTransport>;

/// Decorator that authenticates every request as the app.
pub struct AssertionTransport<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	signer: Arc<dyn ContextSigner>,
	identity: AppIdentity,
	clock: Arc<dyn Clock>,
	backdate: Duration,
	validity: Duration,
}
impl<T> AssertionTransport<T>
where
	T: ?Sized + HttpTransport,
{
	/// Starts configuring a transport that wraps `transport`.
	pub fn builder(transport: Arc<T>) -> AssertionTransportBuilder<T> {
		AssertionTransportBuilder::new(transport)
	}

	/// Builds a transport for a numeric app ID from a PEM-encoded RSA private key.
	pub fn new(
		transport: Arc<T>,
		app_id: u64,
		private_key: impl AsRef<[u8]>,
	) -> Result<Self, ConfigError> {
		Self::builder(transport).app_id(app_id).private_key_pem(private_key).build()
	}

	/// Builds a transport for a numeric app ID from a PEM key file.
	pub fn from_key_file(
		transport: Arc<T>,
		app_id: u64,
		path: impl AsRef<Path>,
	) -> Result<Self, ConfigError> {
		Self::builder(transport).app_id(app_id).private_key_file(path).build()
	}

	/// Issuer placed in every assertion.
	pub fn issuer(&self) -> &str {
		self.identity.issuer()
	}

	/// Numeric app ID, or `None` when the transport was configured with a client ID.
	///
	/// Kept for callers that still key on the numeric ID; prefer [`AssertionTransport::issuer`].
	pub fn app_id(&self) -> Option<u64> {
		self.identity.app_id()
	}

	/// Normalized identity.
	pub fn identity(&self) -> &AppIdentity {
		&self.identity
	}

	/// Wrapped transport.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Clock used for assertion timestamps.
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Claims an assertion minted at `now` carries.
	pub fn claims_at(&self, now: OffsetDateTime) -> Claims {
		Claims::new(self.identity.issuer(), now - self.backdate, self.validity)
	}

	/// Signs a fresh assertion for a request carrying `extensions`.
	pub async fn sign_assertion(&self, extensions: &Extensions) -> Result<String> {
		let now = self.clock.now();
		let deadline = RequestDeadline::from_extensions(extensions);
		let claims = self.claims_at(now);
		let signing = self.signer.sign_with_context(SignContext::new(extensions), &claims);

		Ok(http::within_deadline(deadline, now, "sign", signing).await??)
	}

	/// Attaches a fresh assertion and the required `Accept` value to `request`.
	pub async fn authorize(&self, request: &mut HttpRequest) -> Result<()> {
		let assertion = self.sign_assertion(request.extensions()).await?;
		let value = http::authorization_value("Bearer", &assertion).map_err(SigningError::from)?;
		let headers = request.headers_mut();

		headers.insert(AUTHORIZATION, value);
		http::append_accept(headers);

		Ok(())
	}
}
impl<T> HttpTransport for AssertionTransport<T>
where
	T: ?Sized + HttpTransport,
{
	type Error = Error;

	fn send(&self, mut request: HttpRequest) -> SendFuture<'_, Self::Error> {
		const KIND: FlowKind = FlowKind::Assertion;

		Box::pin(async move {
			let span = FlowSpan::new(KIND, "send");

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span
				.instrument(async move {
					let deadline = RequestDeadline::from_extensions(request.extensions());

					self.authorize(&mut request).await?;

					http::within_deadline(deadline, self.clock.now(), "send", self.transport.send(request))
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
impl<T> Clone for AssertionTransport<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			signer: self.signer.clone(),
			identity: self.identity.clone(),
			clock: self.clock.clone(),
			backdate: self.backdate,
			validity: self.validity,
		}
	}
}
impl<T> Debug for AssertionTransport<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AssertionTransport")
			.field("issuer", &self.identity.issuer())
			.field("backdate", &self.backdate)
			.field("validity", &self.validity)
			.finish()
	}
}

enum IdentitySource {
	AppId(u64),
	ClientId(String),
}

enum KeySource {
	Pem(Vec<u8>),
	File(PathBuf),
	Encoding(EncodingKey),
	Signer(Arc<dyn ContextSigner>),
}

/// Builder for [`AssertionTransport`].
///
/// Identity and key setters overwrite each other, so the last one called wins. Key material is
/// parsed in [`AssertionTransportBuilder::build`], which never yields a partially usable transport.
pub struct AssertionTransportBuilder<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	identity: Option<IdentitySource>,
	key: Option<KeySource>,
	clock: Option<Arc<dyn Clock>>,
	backdate: Duration,
	validity: Duration,
}
impl<T> AssertionTransportBuilder<T>
where
	T: ?Sized + HttpTransport,
{
	fn new(transport: Arc<T>) -> Self {
		Self {
			transport,
			identity: None,
			key: None,
			clock: None,
			backdate: DEFAULT_BACKDATE,
			validity: DEFAULT_VALIDITY,
		}
	}

	/// Authenticates with a numeric app ID (issuer is its decimal form).
	pub fn app_id(mut self, app_id: u64) -> Self {
		self.identity = Some(IdentitySource::AppId(app_id));

		self
	}

	/// Authenticates with a client ID.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.identity = Some(IdentitySource::ClientId(client_id.into()));

		self
	}

	/// Signs with a PEM-encoded RSA private key.
	pub fn private_key_pem(mut self, pem: impl AsRef<[u8]>) -> Self {
		self.key = Some(KeySource::Pem(pem.as_ref().to_vec()));

		self
	}

	/// Signs with a PEM-encoded RSA private key read from `path` at build time.
	pub fn private_key_file(mut self, path: impl AsRef<Path>) -> Self {
		self.key = Some(KeySource::File(path.as_ref().to_path_buf()));

		self
	}

	/// Signs with an already parsed RSA key.
	pub fn private_key(mut self, key: EncodingKey) -> Self {
		self.key = Some(KeySource::Encoding(key));

		self
	}

	/// Signs with a custom [`Signer`].
	pub fn signer(mut self, signer: impl 'static + Signer) -> Self {
		self.key = Some(KeySource::Signer(Arc::new(SignerAdapter::new(signer))));

		self
	}

	/// Signs with a custom [`ContextSigner`].
	pub fn context_signer(mut self, signer: impl 'static + ContextSigner) -> Self {
		self.key = Some(KeySource::Signer(Arc::new(signer)));

		self
	}

	/// Overrides the clock (defaults to [`SystemClock`]).
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);

		self
	}

	/// Overrides how far assertions are backdated (defaults to 30 seconds).
	///
	/// Must not be negative.
	pub fn backdate(mut self, backdate: Duration) -> Self {
		self.backdate = backdate;

		self
	}

	/// Overrides assertion lifetime (defaults to 2 minutes).
	///
	/// Must exceed the backdate, and the assertion may not outlive "now" by more than
	/// [`MAX_ASSERTION_LIFETIME`].
	pub fn validity(mut self, validity: Duration) -> Self {
		self.validity = validity;

		self
	}

	/// Validates the configuration and parses key material.
	pub fn build(self) -> Result<AssertionTransport<T>, ConfigError> {
		self.check_timing()?;

		let identity = match self.identity.ok_or(ConfigError::MissingIdentity)? {
			IdentitySource::AppId(app_id) => AppIdentity::from_app_id(app_id),
			IdentitySource::ClientId(client_id) =>
				AppIdentity::from_client_id(ClientId::new(client_id)?),
		};
		let signer: Arc<dyn ContextSigner> = match self.key.ok_or(ConfigError::MissingSigner)? {
			KeySource::Pem(pem) => Arc::new(RsaSigner::from_pem(pem)?),
			KeySource::File(path) => {
				let pem = std::fs::read(&path).map_err(|source| ConfigError::PrivateKeyRead {
					path: path.display().to_string(),
					source,
				})?;

				Arc::new(RsaSigner::from_pem(pem)?)
			},
			KeySource::Encoding(key) => Arc::new(RsaSigner::new(key)),
			KeySource::Signer(signer) => signer,
		};

		Ok(AssertionTransport {
			transport: self.transport,
			signer,
			identity,
			clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
			backdate: self.backdate,
			validity: self.validity,
		})
	}

	fn check_timing(&self) -> Result<(), ConfigError> {
		let invalid = |setting, reason| Err(ConfigError::InvalidDuration { setting, reason });

		if self.backdate.is_negative() {
			return invalid("backdate", "must not be negative");
		}

		if !self.validity.is_positive() {
			return invalid("validity", "must be positive");
		}

		if self.validity <= self.backdate {
			return invalid("validity", "must exceed the backdate");
		}

		if self.validity - self.backdate > MAX_ASSERTION_LIFETIME {
			return invalid("validity", "assertion may not outlive now by more than 10 minutes");
		}

		Ok(())
	}
}
impl<T> Debug for AssertionTransportBuilder<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AssertionTransportBuilder")
			.field("identity_set", &self.identity.is_some())
			.field("key_set", &self.key.is_some())
			.field("backdate", &self.backdate)
			.field("validity", &self.validity)
			.finish()
	}
}
