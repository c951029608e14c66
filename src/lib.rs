//! GitHub App authentication transports: mint signed app assertions, exchange them for
//! installation tokens, and keep those tokens fresh behind any HTTP client.
//!
//! Two decorators compose by delegation:
//!
//! - [`transport::AssertionTransport`] signs a short-lived assertion for every request and sends it as
//!   `Authorization: Bearer <assertion>`.
//! - [`transport::ScopedTokenTransport`] exchanges those assertions for an installation token, caches
//!   it, refreshes it lazily with a single in-flight issuance call, and sends requests with
//!   `Authorization: token <opaque>`.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod clock;
pub mod error;
pub mod http;
pub mod identity;
pub mod obs;
pub mod sign;
pub mod token;
pub mod transport;

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
pub use jsonwebtoken;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
