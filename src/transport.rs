//! Request decorators that attach app credentials.
//!
//! [`AssertionTransport`] authenticates as the app itself with a freshly signed assertion per
//! request. [`ScopedTokenTransport`] authenticates as one installation of the app, exchanging
//! assertions for an installation token and caching it until it nears expiry.

pub mod assertion;
pub mod scoped;

pub use assertion::*;
pub use scoped::*;

// self
use crate::_prelude::*;

/// Public API host used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
/// Resource collection the installation token endpoint lives under.
pub const ISSUANCE_COLLECTION: &str = "app/installations";
/// How far before expiry a cached token stops being attached without a refresh.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::minutes(1);
/// How far assertions are backdated to tolerate clock drift with the verifier.
pub const DEFAULT_BACKDATE: Duration = Duration::seconds(30);
/// Lifetime of a signed assertion.
pub const DEFAULT_VALIDITY: Duration = Duration::minutes(2);
/// Longest span past "now" an assertion may stay valid before the verifier rejects it.
pub const MAX_ASSERTION_LIFETIME: Duration = Duration::minutes(10);
/// Lifetime upstream grants an installation token; the refresh skew must stay below it.
pub const INSTALLATION_TOKEN_LIFETIME: Duration = Duration::hours(1);
