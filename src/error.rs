//! Crate-level error types shared by the signer, both transports, and the issuance exchange.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by every `send` call.
///
/// The variants separate "could not obtain a token" ([`Error::Issuance`]) from "the wrapped request
/// itself failed" ([`Error::Transport`]), even though both flow through the same call.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Assertion could not be signed.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// The inner transport failed to complete the caller's request.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// An installation token could not be obtained.
	#[error(transparent)]
	Issuance(#[from] IssuanceError),

	/// The request's deadline elapsed before the named stage completed.
	#[error("Request deadline elapsed during the {stage} stage.")]
	DeadlineExceeded {
		/// Stage label (`sign`, `issuance`, `send`).
		stage: &'static str,
	},
}
impl Error {
	/// Returns the HTTP status of a rejected issuance call, if that is what failed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Issuance(err) => err.status(),
			_ => None,
		}
	}
}

/// Configuration failures raised while building a transport.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Neither an app ID nor a client ID was configured.
	#[error("No app ID or client ID was provided.")]
	MissingIdentity,
	/// Neither key material nor a signer was configured.
	#[error("No signer was provided.")]
	MissingSigner,
	/// Client ID is empty or contains whitespace.
	#[error(transparent)]
	InvalidClientId(#[from] crate::identity::ClientIdError),
	/// PEM key material could not be parsed.
	#[error("Could not parse private key.")]
	InvalidPrivateKey {
		/// Underlying parsing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// The default signer only supports RSA algorithms.
	#[error("Algorithm {algorithm:?} is not an RSA signing algorithm.")]
	UnsupportedAlgorithm {
		/// Rejected algorithm.
		algorithm: jsonwebtoken::Algorithm,
	},
	/// Private key file could not be read.
	#[error("Could not read private key from `{path}`.")]
	PrivateKeyRead {
		/// File path that failed to load.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL `{url}` is invalid.")]
	InvalidBaseUrl {
		/// Offending URL string.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A timing setting is outside its accepted range.
	#[error("`{setting}` is out of range: {reason}.")]
	InvalidDuration {
		/// Builder setting that was rejected.
		setting: &'static str,
		/// Accepted range.
		reason: &'static str,
	},
	/// Issuance request body could not be serialized.
	#[error("Could not serialize the issuance request.")]
	InvalidIssuanceRequest {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
}

/// Failures raised while producing a signed assertion.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// Claims failed validation before signing.
	#[error("Claims are invalid: {reason}.")]
	InvalidClaims {
		/// Validation failure description.
		reason: &'static str,
	},
	/// The JWT encoder rejected the key or claims.
	#[error("Could not sign assertion.")]
	Encode(#[from] jsonwebtoken::errors::Error),
	/// The signed assertion cannot be carried in an `Authorization` header.
	#[error("Signed assertion is not a valid header value.")]
	InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
	/// A custom signer failed.
	#[error("External signer failed.")]
	External {
		/// Signer-specific failure.
		#[source]
		source: BoxError,
	},
}
impl SigningError {
	/// Wraps a custom signer's failure.
	pub fn external(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::External { source: Box::new(src) }
	}
}

/// Transport-level failures; no response is available.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures while exchanging an assertion for an installation token.
#[derive(Debug, ThisError)]
pub enum IssuanceError {
	/// The token endpoint answered with a non-2xx status.
	#[error("Token endpoint rejected installation {installation_id} with HTTP {status}.")]
	Rejected {
		/// Installation whose token was requested.
		installation_id: u64,
		/// HTTP status code.
		status: u16,
		/// Response body, decoded lossily.
		body: String,
	},
	/// The assertion for the issuance call could not be signed.
	#[error("Could not sign the assertion for installation {installation_id}.")]
	Signing {
		/// Installation whose token was requested.
		installation_id: u64,
		/// Root cause.
		#[source]
		source: SigningError,
	},
	/// The issuance call never produced a response.
	#[error("Could not reach the token endpoint for installation {installation_id}.")]
	Transport {
		/// Installation whose token was requested.
		installation_id: u64,
		/// Root cause.
		#[source]
		source: TransportError,
	},
	/// The token endpoint answered 2xx with a payload that does not parse.
	#[error("Token endpoint returned a malformed payload for installation {installation_id}.")]
	MalformedResponse {
		/// Installation whose token was requested.
		installation_id: u64,
		/// HTTP status code.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The issued token cannot be carried in an `Authorization` header.
	#[error("Token endpoint returned an unusable token for installation {installation_id}.")]
	InvalidToken {
		/// Installation whose token was requested.
		installation_id: u64,
	},
}
impl IssuanceError {
	/// Returns the HTTP status when the endpoint answered.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } | Self::MalformedResponse { status, .. } => Some(*status),
			Self::Signing { .. } | Self::Transport { .. } | Self::InvalidToken { .. } => None,
		}
	}

	/// Returns the installation the failed exchange was for.
	pub fn installation_id(&self) -> u64 {
		match self {
			Self::Rejected { installation_id, .. }
			| Self::Signing { installation_id, .. }
			| Self::Transport { installation_id, .. }
			| Self::MalformedResponse { installation_id, .. }
			| Self::InvalidToken { installation_id } => *installation_id,
		}
	}
}
