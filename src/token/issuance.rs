//! Token issuance request and response payloads.

// self
use crate::{_prelude::*, token::TokenSecret};

/// Optional scoping sent with a token issuance call.
///
/// An empty request is sent as no body at all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRequest {
	/// Repository names the token should be limited to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub repositories: Option<Vec<String>>,
	/// Repository IDs the token should be limited to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub repository_ids: Option<Vec<u64>>,
	/// Permission subset (`contents` → `read`, ...).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub permissions: Option<BTreeMap<String, String>>,
}
impl IssuanceRequest {
	/// Limits the token to the given repository IDs.
	pub fn with_repository_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
		self.repository_ids.get_or_insert_with(Vec::new).extend(ids);

		self
	}

	/// Limits the token to the given repository names.
	pub fn with_repositories<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.repositories.get_or_insert_with(Vec::new).extend(names.into_iter().map(Into::into));

		self
	}

	/// Requests `level` access for `permission`.
	pub fn with_permission(mut self, permission: impl Into<String>, level: impl Into<String>) -> Self {
		self.permissions.get_or_insert_with(BTreeMap::new).insert(permission.into(), level.into());

		self
	}

	/// Returns `true` when nothing would be sent.
	pub fn is_empty(&self) -> bool {
		self.repositories.is_none() && self.repository_ids.is_none() && self.permissions.is_none()
	}
}

/// Repository echoed back by the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
	/// Repository ID.
	pub id: u64,
	/// Short name.
	#[serde(default)]
	pub name: Option<String>,
	/// `owner/name`.
	#[serde(default)]
	pub full_name: Option<String>,
}

/// Successful token issuance payload.
#[derive(Clone, Debug, Deserialize)]
pub struct AccessTokenResponse {
	/// Opaque installation token.
	pub token: TokenSecret,
	/// Absolute expiry instant.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Permissions granted to the token.
	#[serde(default)]
	pub permissions: Option<BTreeMap<String, String>>,
	/// Repositories the token is limited to.
	#[serde(default)]
	pub repositories: Option<Vec<Repository>>,
	/// `all` or `selected`.
	#[serde(default)]
	pub repository_selection: Option<String>,
}
impl AccessTokenResponse {
	/// Parses a response body, reporting the JSON path of any failure.
	pub fn from_slice(body: &[u8]) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
		let mut de = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut de)
	}
}
