//! Optional observability helpers for the transports.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `ghapp_auth.flow` with the `flow` and `stage`
//!   (call site) fields, plus debug events for cache reuse and degraded fallbacks.
//! - Enable `metrics` to increment the `ghapp_auth_flow_total` counter for every flow outcome,
//!   labeled by `flow` + `outcome`, and to record token endpoint round trips in the
//!   `ghapp_auth_issuance_duration_seconds` histogram.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flows observed by the transports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Request sent with a freshly signed app assertion.
	Assertion,
	/// Assertion exchanged for an installation token.
	Issuance,
	/// Request sent with a cached installation token.
	Installation,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Assertion => "assertion",
			FlowKind::Issuance => "issuance",
			FlowKind::Installation => "installation",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a transport helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Cached token reused without an issuance call.
	Reused,
	/// Issuance failed and a still-valid token was used instead.
	Degraded,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Reused => "reused",
			FlowOutcome::Degraded => "degraded",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
