//! Cached installation token and its freshness rules.

// crates.io
use ::http::{HeaderValue, header::InvalidHeaderValue};
// self
use crate::{
	_prelude::*,
	http,
	token::{AccessTokenResponse, Repository, TokenSecret},
};

/// Freshness of a cached token at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
	/// Outside the refresh skew; attach without refreshing.
	Fresh,
	/// Still valid but inside the refresh skew; refresh before use, fall back to it if that fails.
	Expiring,
	/// Past its expiry; never sent.
	Expired,
}

/// Installation token held by a [`ScopedTokenTransport`](crate::transport::ScopedTokenTransport).
///
/// The `Authorization` header value is rendered once at construction so a cache hit never
/// allocates or fails.
#[derive(Clone)]
pub struct CachedToken {
	token: TokenSecret,
	expires_at: OffsetDateTime,
	permissions: BTreeMap<String, String>,
	repositories: Vec<Repository>,
	repository_selection: Option<String>,
	authorization: HeaderValue,
}
impl CachedToken {
	/// Builds a cached token from an issuance response.
	pub fn from_response(response: AccessTokenResponse) -> Result<Self, InvalidHeaderValue> {
		let authorization = http::authorization_value("token", response.token.expose())?;

		Ok(Self {
			token: response.token,
			expires_at: response.expires_at,
			permissions: response.permissions.unwrap_or_default(),
			repositories: response.repositories.unwrap_or_default(),
			repository_selection: response.repository_selection,
			authorization,
		})
	}

	/// Builds a bare cached token with no scoping metadata.
	pub fn new(
		token: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Result<Self, InvalidHeaderValue> {
		Self::from_response(AccessTokenResponse {
			token: TokenSecret::new(token),
			expires_at,
			permissions: None,
			repositories: None,
			repository_selection: None,
		})
	}

	/// Computes freshness at `now` with the given refresh skew.
	pub fn status_at(&self, now: OffsetDateTime, refresh_skew: Duration) -> TokenStatus {
		if now >= self.expires_at {
			return TokenStatus::Expired;
		}
		if now >= self.expires_at - refresh_skew {
			return TokenStatus::Expiring;
		}

		TokenStatus::Fresh
	}

	/// Returns `true` when the token can be attached without refreshing.
	pub fn is_usable_at(&self, now: OffsetDateTime, refresh_skew: Duration) -> bool {
		matches!(self.status_at(now, refresh_skew), TokenStatus::Fresh)
	}

	/// Returns `true` once the token's own expiry has passed.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	/// Opaque token secret.
	pub fn token(&self) -> &TokenSecret {
		&self.token
	}

	/// Absolute expiry instant reported by the token endpoint.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Permissions echoed back by the token endpoint.
	pub fn permissions(&self) -> &BTreeMap<String, String> {
		&self.permissions
	}

	/// Repositories echoed back by the token endpoint.
	pub fn repositories(&self) -> &[Repository] {
		&self.repositories
	}

	/// Repository selection mode echoed back by the token endpoint.
	pub fn repository_selection(&self) -> Option<&str> {
		self.repository_selection.as_deref()
	}

	pub(crate) fn authorization(&self) -> &HeaderValue {
		&self.authorization
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("token", &self.token)
			.field("expires_at", &self.expires_at)
			.field("permissions", &self.permissions)
			.field("repositories", &self.repositories)
			.field("repository_selection", &self.repository_selection)
			.finish()
	}
}
