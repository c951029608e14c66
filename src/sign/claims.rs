//! Registered claims carried by an app assertion.

// self
use crate::{_prelude::*, clock::truncate_to_seconds, error::SigningError};

/// Claims signed into every app assertion.
///
/// Timestamps serialize as integer seconds since the epoch; the verifying party rejects fractional
/// values, so [`Claims::new`] truncates and [`Claims::validate`] refuses anything else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Issued-at instant (`iat`).
	#[serde(rename = "iat", with = "time::serde::timestamp")]
	pub issued_at: OffsetDateTime,
	/// Expiry instant (`exp`).
	#[serde(rename = "exp", with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
	/// App ID or client ID (`iss`).
	#[serde(rename = "iss")]
	pub issuer: String,
}
impl Claims {
	/// Builds claims valid for `validity` from `issued_at`, both truncated to whole seconds.
	pub fn new(issuer: impl Into<String>, issued_at: OffsetDateTime, validity: Duration) -> Self {
		let issued_at = truncate_to_seconds(issued_at);

		Self {
			issued_at,
			expires_at: truncate_to_seconds(issued_at + validity),
			issuer: issuer.into(),
		}
	}

	/// Rejects claims the verifying party would refuse.
	pub fn validate(&self) -> Result<(), SigningError> {
		if self.issuer.is_empty() {
			return Err(SigningError::InvalidClaims { reason: "issuer is empty" });
		}
		if self.issuer.chars().any(|c| c.is_whitespace() || c.is_control()) {
			return Err(SigningError::InvalidClaims { reason: "issuer is not a compact string" });
		}
		if self.issued_at.nanosecond() != 0 || self.expires_at.nanosecond() != 0 {
			return Err(SigningError::InvalidClaims {
				reason: "timestamps must be whole seconds",
			});
		}
		if self.expires_at <= self.issued_at {
			return Err(SigningError::InvalidClaims { reason: "expiry is not after issued-at" });
		}

		Ok(())
	}
}
