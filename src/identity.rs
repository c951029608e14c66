//! App identity: the issuer every assertion is signed for.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const CLIENT_ID_MAX_LEN: usize = 128;

/// Error returned when client ID validation fails.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClientIdError {
	/// The client ID was empty.
	#[error("Client ID cannot be empty.")]
	Empty,
	/// The client ID contains whitespace characters.
	#[error("Client ID contains whitespace.")]
	ContainsWhitespace,
	/// The client ID exceeded the allowed character count.
	#[error("Client ID exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Validated app client ID (for example `Iv1.8a61f9b3a7aba766`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);
impl ClientId {
	/// Creates a new client ID after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, ClientIdError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for ClientId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ClientId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for ClientId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<ClientId> for String {
	fn from(value: ClientId) -> Self {
		value.0
	}
}
impl TryFrom<String> for ClientId {
	type Error = ClientIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for ClientId {
	type Err = ClientIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for ClientId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ClientId({})", self.0)
	}
}
impl Display for ClientId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Normalized app identity.
///
/// The numeric app ID and the string client ID are interchangeable issuers; whichever was configured
/// is rendered once into a compact issuer string and that string is the only thing the signing path
/// sees.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AppIdentity {
	issuer: String,
	app_id: Option<u64>,
}
impl AppIdentity {
	/// Identity for a numeric app ID; the issuer is its decimal form.
	pub fn from_app_id(app_id: u64) -> Self {
		Self { issuer: app_id.to_string(), app_id: Some(app_id) }
	}

	/// Identity for a client ID; the issuer is the client ID itself.
	pub fn from_client_id(client_id: ClientId) -> Self {
		Self { issuer: client_id.into(), app_id: None }
	}

	/// Issuer string placed in every assertion.
	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	/// Numeric app ID, when the identity was configured from one.
	///
	/// Kept for callers that still key on the numeric ID; prefer [`AppIdentity::issuer`].
	pub fn app_id(&self) -> Option<u64> {
		self.app_id
	}
}
impl Display for AppIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.issuer)
	}
}

fn validate_view(view: &str) -> Result<(), ClientIdError> {
	if view.is_empty() {
		return Err(ClientIdError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(ClientIdError::ContainsWhitespace);
	}
	if view.len() > CLIENT_ID_MAX_LEN {
		return Err(ClientIdError::TooLong { max: CLIENT_ID_MAX_LEN });
	}

	Ok(())
}
