// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter incremented for every flow outcome.
pub const FLOW_COUNTER: &str = "ghapp_auth_flow_total";
/// Histogram of token endpoint round-trip times, in seconds.
pub const ISSUANCE_LATENCY_HISTOGRAM: &str = "ghapp_auth_issuance_duration_seconds";

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_COUNTER, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how long one issuance call took, labeled by whether it produced a token.
pub fn record_issuance_latency(elapsed: StdDuration, succeeded: bool) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(
		ISSUANCE_LATENCY_HISTOGRAM,
		"outcome" => if succeeded { FlowOutcome::Success.as_str() } else { FlowOutcome::Failure.as_str() }
	)
	.record(elapsed.as_secs_f64());

	#[cfg(not(feature = "metrics"))]
	let _ = (elapsed, succeeded);
}
