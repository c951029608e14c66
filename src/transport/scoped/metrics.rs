// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one [`ScopedTokenTransport`](crate::transport::ScopedTokenTransport).
#[derive(Debug, Default)]
pub struct IssuanceMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	cache_hits: AtomicU64,
	fallbacks: AtomicU64,
}
impl IssuanceMetrics {
	/// Returns the total number of issuance calls.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of issuance calls that produced a token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed issuance calls, including ones that fell back.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of requests served from the cached token.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of requests sent with a still-valid token after a failed refresh.
	pub fn fallbacks(&self) -> u64 {
		self.fallbacks.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fallback(&self) {
		self.fallbacks.fetch_add(1, Ordering::Relaxed);
	}
}
