//! Optional proactive refresh on top of the reactive `AuthExpired` contract.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, provider::ProviderContext};

/// Decides when a still-valid context should be refreshed before the upstream rejects it.
///
/// The default policy is purely reactive: contexts are refreshed only after a tile fetch reports
/// `AuthExpired`. Bypassed contexts are never refreshed regardless of policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshPolicy {
	/// Refresh once a context is this close to its `expires_at`.
	///
	/// Each published context gets a random jitter of up to a quarter of the window subtracted, so
	/// instances that authenticated together do not refresh in lockstep.
	pub preemptive_window: Option<Duration>,
	/// Refresh once a context is this old, whether or not it declares an expiry.
	pub max_age: Option<Duration>,
}
impl RefreshPolicy {
	/// Purely reactive policy.
	pub fn reactive() -> Self {
		Self::default()
	}

	/// Enables expiry-driven refresh; negative windows are clamped to zero.
	pub fn with_preemptive_window(mut self, window: Duration) -> Self {
		self.preemptive_window = Some(if window.is_negative() { Duration::ZERO } else { window });

		self
	}

	/// Enables age-driven refresh; non-positive ages are ignored.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = max_age.is_positive().then_some(max_age);

		self
	}

	/// Returns `true` when neither proactive trigger is configured.
	pub fn is_reactive(&self) -> bool {
		self.preemptive_window.is_none() && self.max_age.is_none()
	}

	/// Computes the instant after which `context`, published at `issued_at`, is refreshed.
	///
	/// A trigger whose instant falls outside the representable date range is ignored.
	pub fn refresh_at(
		&self,
		context: &ProviderContext,
		issued_at: OffsetDateTime,
	) -> Option<OffsetDateTime> {
		let by_expiry =
			self.preemptive_window.zip(context.expires_at).and_then(|(window, expires_at)| {
				expires_at.checked_sub(window.checked_sub(jitter(window)).unwrap_or(Duration::ZERO))
			});
		let by_age = self.max_age.and_then(|max_age| issued_at.checked_add(max_age));

		match (by_expiry, by_age) {
			(Some(a), Some(b)) => Some(a.min(b)),
			(a, b) => a.or(b),
		}
	}
}

fn jitter(window: Duration) -> Duration {
	let bound = window.whole_milliseconds() / 4;

	if bound <= 0 {
		return Duration::ZERO;
	}

	let bound = i64::try_from(bound).unwrap_or(i64::MAX);

	Duration::milliseconds(rand::rng().random_range(0..bound))
}
