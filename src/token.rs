//! Installation token models: the redacted secret, the cached record, and the issuance payloads.

pub mod issuance;
pub mod record;
pub mod secret;

pub use issuance::*;
pub use record::*;
pub use secret::*;
