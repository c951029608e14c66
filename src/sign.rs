//! Assertion signing contracts.
//!
//! A signer turns [`Claims`] into a compact signed assertion. [`Signer`] is the narrow synchronous
//! capability most key-backed implementations need; [`ContextSigner`] is the richer async variant
//! that also sees the outgoing request's [`SignContext`] so it can bound calls to an external
//! signing service. [`SignerAdapter`] lifts the former into the latter, which is the only form the
//! transports hold.

pub mod claims;
pub mod rsa;

pub use claims::*;
pub use rsa::*;

// crates.io
use ::http::Extensions;
// self
use crate::{_prelude::*, error::SigningError, http::RequestDeadline};

/// Boxed future returned by [`ContextSigner::sign_with_context`].
pub type SignFuture<'a> = Pin<Box<dyn Future<Output = Result<String, SigningError>> + 'a + Send>>;

/// Signs claims with fixed key material.
///
/// Implementations must not mutate shared state; one signer serves every concurrent request of its
/// transport.
pub trait Signer
where
	Self: Send + Sync,
{
	/// Returns the compact signed assertion for `claims`.
	fn sign(&self, claims: &Claims) -> Result<String, SigningError>;
}
impl<T> Signer for Arc<T>
where
	T: ?Sized + Signer,
{
	fn sign(&self, claims: &Claims) -> Result<String, SigningError> {
		(**self).sign(claims)
	}
}

/// Signs claims with access to the outgoing request's context.
pub trait ContextSigner
where
	Self: Send + Sync,
{
	/// Returns the compact signed assertion for `claims`.
	///
	/// Implementations that call out to a remote signer should stop waiting once
	/// [`SignContext::deadline`] passes.
	fn sign_with_context<'a>(&'a self, context: SignContext<'a>, claims: &'a Claims)
	-> SignFuture<'a>;
}
impl<T> ContextSigner for Arc<T>
where
	T: ?Sized + ContextSigner,
{
	fn sign_with_context<'a>(
		&'a self,
		context: SignContext<'a>,
		claims: &'a Claims,
	) -> SignFuture<'a> {
		(**self).sign_with_context(context, claims)
	}
}

/// Per-request context handed to a [`ContextSigner`].
#[derive(Clone, Copy, Debug)]
pub struct SignContext<'a> {
	extensions: &'a Extensions,
}
impl<'a> SignContext<'a> {
	/// Wraps the extensions of the request being signed.
	pub fn new(extensions: &'a Extensions) -> Self {
		Self { extensions }
	}

	/// Extensions of the request being signed.
	pub fn extensions(&self) -> &'a Extensions {
		self.extensions
	}

	/// Typed lookup into the request's extensions.
	pub fn get<T>(&self) -> Option<&'a T>
	where
		T: 'static + Send + Sync,
	{
		self.extensions.get::<T>()
	}

	/// Absolute deadline of the request, if the caller set one.
	pub fn deadline(&self) -> Option<OffsetDateTime> {
		self.get::<RequestDeadline>().map(|deadline| deadline.0)
	}
}

/// Lifts a plain [`Signer`] into a [`ContextSigner`] that ignores the context.
#[derive(Clone)]
pub struct SignerAdapter(Arc<dyn Signer>);
impl SignerAdapter {
	/// Wraps `signer`.
	pub fn new(signer: impl 'static + Signer) -> Self {
		Self(Arc::new(signer))
	}

	/// Wraps an already shared signer.
	pub fn from_arc(signer: Arc<dyn Signer>) -> Self {
		Self(signer)
	}
}
impl ContextSigner for SignerAdapter {
	fn sign_with_context<'a>(
		&'a self,
		_context: SignContext<'a>,
		claims: &'a Claims,
	) -> SignFuture<'a> {
		Box::pin(std::future::ready(self.0.sign(claims)))
	}
}
impl Debug for SignerAdapter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SignerAdapter(..)")
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	struct FixedSigner;
	impl Signer for FixedSigner {
		fn sign(&self, claims: &Claims) -> Result<String, SigningError> {
			Ok(format!("signed-for-{}", claims.issuer))
		}
	}

	#[tokio::test]
	async fn adapter_delegates_to_plain_signer() {
		let adapter = SignerAdapter::new(FixedSigner);
		let claims = Claims::new("42", macros::datetime!(2025-01-01 00:00 UTC), Duration::minutes(2));
		let extensions = Extensions::new();
		let signed = adapter
			.sign_with_context(SignContext::new(&extensions), &claims)
			.await
			.expect("Adapter should forward the plain signer's output.");

		assert_eq!(signed, "signed-for-42");
	}

	#[test]
	fn context_exposes_deadline() {
		let deadline = macros::datetime!(2025-01-01 00:05 UTC);
		let mut extensions = Extensions::new();

		assert_eq!(SignContext::new(&extensions).deadline(), None);

		extensions.insert(RequestDeadline(deadline));

		assert_eq!(SignContext::new(&extensions).deadline(), Some(deadline));
	}
}
