// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one authentication context cache.
#[derive(Debug, Default)]
pub struct AuthMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	invalidations: AtomicU64,
}
impl AuthMetrics {
	/// Returns the number of `pre_auth` executions started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of `pre_auth` executions that published a context.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed `pre_auth` executions.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of accepted invalidations.
	pub fn invalidations(&self) -> u64 {
		self.invalidations.load(Ordering::Relaxed)
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

	pub(crate) fn record_invalidation(&self) {
		self.invalidations.fetch_add(1, Ordering::Relaxed);
	}
}
