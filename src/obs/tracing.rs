// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome},
};

/// Resolves to an instrumented future when tracing is enabled, and to the future itself otherwise.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Resolves to an instrumented future when tracing is enabled, and to the future itself otherwise.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `ghapp_auth.flow` span carried by each transport call.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Span for an app-level call.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self {
				span: tracing::info_span!(
					"ghapp_auth.flow",
					flow = kind.as_str(),
					stage,
					installation_id = tracing::field::Empty
				),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Span for a call made on behalf of one installation.
	pub fn for_installation(kind: FlowKind, stage: &'static str, installation_id: u64) -> Self {
		let span = Self::new(kind, stage);

		#[cfg(feature = "tracing")]
		span.span.record("installation_id", installation_id);
		#[cfg(not(feature = "tracing"))]
		let _ = installation_id;

		span
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event for cache reuse or a degraded fallback inside the current span.
pub fn trace_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "tracing")]
	match outcome {
		FlowOutcome::Degraded => tracing::warn!(
			flow = kind.as_str(),
			outcome = outcome.as_str(),
			"Token refresh failed; sending with the still-valid cached token."
		),
		_ => tracing::debug!(flow = kind.as_str(), outcome = outcome.as_str(), "Flow outcome."),
	}

	#[cfg(not(feature = "tracing"))]
	let _ = (kind, outcome);
}
