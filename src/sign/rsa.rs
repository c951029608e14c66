//! Default signer backed by an RSA private key.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, SigningError},
	sign::{Claims, ContextSigner, SignContext, SignFuture, Signer},
};

/// Signs assertions as JWTs with an RSA private key.
///
/// Output is deterministic for a given key and claims; the timestamps in the claims are the only
/// varying input.
#[derive(Clone)]
pub struct RsaSigner {
	algorithm: Algorithm,
	key: EncodingKey,
}
impl RsaSigner {
	/// Algorithm used unless [`RsaSigner::with_algorithm`] overrides it.
	pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;

	/// Wraps a parsed key, signing with [`RsaSigner::DEFAULT_ALGORITHM`].
	pub fn new(key: EncodingKey) -> Self {
		Self { algorithm: Self::DEFAULT_ALGORITHM, key }
	}

	/// Parses a PKCS#1 or PKCS#8 PEM private key.
	pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
		let key = EncodingKey::from_rsa_pem(pem.as_ref())
			.map_err(|source| ConfigError::InvalidPrivateKey { source })?;

		Ok(Self::new(key))
	}

	/// Selects another RSA algorithm (`RS*` or `PS*`).
	pub fn with_algorithm(mut self, algorithm: Algorithm) -> Result<Self, ConfigError> {
		if !matches!(
			algorithm,
			Algorithm::RS256
				| Algorithm::RS384
				| Algorithm::RS512
				| Algorithm::PS256
				| Algorithm::PS384
				| Algorithm::PS512
		) {
			return Err(ConfigError::UnsupportedAlgorithm { algorithm });
		}

		self.algorithm = algorithm;

		Ok(self)
	}

	/// Algorithm written into the assertion header.
	pub fn algorithm(&self) -> Algorithm {
		self.algorithm
	}
}
impl Signer for RsaSigner {
	fn sign(&self, claims: &Claims) -> Result<String, SigningError> {
		claims.validate()?;

		Ok(jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.key)?)
	}
}
impl ContextSigner for RsaSigner {
	fn sign_with_context<'a>(
		&'a self,
		_context: SignContext<'a>,
		claims: &'a Claims,
	) -> SignFuture<'a> {
		Box::pin(std::future::ready(self.sign(claims)))
	}
}
impl Debug for RsaSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RsaSigner")
			.field("algorithm", &self.algorithm)
			.field("key", &"<redacted>")
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{DecodingKey, Validation};
	// self
	use super::*;

	const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/private-key.pem");
	const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/public-key.pem");

	#[test]
	fn signed_assertion_verifies_with_public_key() {
		let signer = RsaSigner::from_pem(PRIVATE_KEY).expect("Fixture key should parse.");
		let claims = Claims::new("12345", OffsetDateTime::now_utc(), Duration::minutes(2));
		let token = signer.sign(&claims).expect("Signing should succeed with a valid key.");
		let key = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes())
			.expect("Fixture public key should parse.");
		let decoded = jsonwebtoken::decode::<Claims>(&token, &key, &Validation::new(Algorithm::RS256))
			.expect("Assertion should verify against the public key.");

		assert_eq!(decoded.header.alg, Algorithm::RS256);
		assert_eq!(decoded.claims, claims);
	}

	#[test]
	fn signing_is_deterministic_for_equal_claims() {
		let signer = RsaSigner::from_pem(PRIVATE_KEY).expect("Fixture key should parse.");
		let claims = Claims::new("12345", OffsetDateTime::now_utc(), Duration::minutes(2));

		assert_eq!(
			signer.sign(&claims).expect("First signature should succeed."),
			signer.sign(&claims).expect("Second signature should succeed."),
		);
	}

	#[test]
	fn rejects_garbage_and_non_rsa_algorithms() {
		assert!(matches!(
			RsaSigner::from_pem("not a key"),
			Err(ConfigError::InvalidPrivateKey { .. })
		));

		let signer = RsaSigner::from_pem(PRIVATE_KEY).expect("Fixture key should parse.");

		assert!(matches!(
			signer.clone().with_algorithm(Algorithm::HS256),
			Err(ConfigError::UnsupportedAlgorithm { algorithm: Algorithm::HS256 })
		));
		assert_eq!(
			signer
				.with_algorithm(Algorithm::PS256)
				.expect("PS256 should be accepted for RSA keys.")
				.algorithm(),
			Algorithm::PS256
		);
	}

	#[test]
	fn debug_redacts_key() {
		let signer = RsaSigner::from_pem(PRIVATE_KEY).expect("Fixture key should parse.");

		assert_eq!(format!("{signer:?}"), "RsaSigner { algorithm: RS256, key: \"<redacted>\" }");
	}
}
