//! Per-provider authentication context cache with singleflight refreshes.
//!
//! The cache holds the most recent [`ProviderContext`] for one provider instance. Readers take an
//! immutable [`ContextSnapshot`] without touching the async guard. When no usable context exists,
//! callers record the current refresh generation and queue on a single async guard: the first to
//! acquire it runs the refresh, while everyone who queued during that cycle observes a newer
//! generation once they acquire the guard and takes the published outcome (the same context or
//! the same shared error) instead of refreshing again.
//!
//! A failed refresh leaves no poisoned state behind; the next caller starts a new cycle. A context
//! with `auth_bypass` set is terminal and is never refreshed or invalidated.

mod metrics;
mod policy;

pub use metrics::AuthMetrics;
pub use policy::RefreshPolicy;

// std
use std::ops::Deref;
// self
use crate::{
	_prelude::*,
	provider::{ProviderContext, ProviderError},
};

/// Observable lifecycle of a cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthState {
	/// No refresh has succeeded yet.
	Uninitialized,
	/// A refresh is in flight.
	Refreshing,
	/// A context is cached and served to every fetch.
	Valid,
	/// The cached context was invalidated (or is due for proactive refresh) and awaits a refresh.
	Stale,
	/// The provider needs no authentication; terminal.
	Bypassed,
}

/// Immutable view of a published context.
///
/// The generation identifies the refresh cycle that produced the context and is what
/// [`AuthContextCache::invalidate`] compares against.
#[derive(Clone, Debug)]
pub struct ContextSnapshot {
	generation: u64,
	context: Arc<ProviderContext>,
}
impl ContextSnapshot {
	/// Refresh cycle that produced this context.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Shared handle to the context.
	pub fn context(&self) -> &Arc<ProviderContext> {
		&self.context
	}

	/// Returns `true` when the context disables authentication.
	pub fn is_bypassed(&self) -> bool {
		self.context.auth_bypass
	}
}
impl Deref for ContextSnapshot {
	type Target = ProviderContext;

	fn deref(&self) -> &Self::Target {
		&self.context
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
	Uninitialized,
	Valid,
	Stale,
	Bypassed,
}

#[derive(Debug)]
struct Slot {
	phase: Phase,
	context: Option<Arc<ProviderContext>>,
	// Generation of `context`.
	context_generation: u64,
	// Completed refresh cycles, successful or not.
	generation: u64,
	// Proactive refresh instant for `context`.
	refresh_at: Option<OffsetDateTime>,
	last_failure: Option<(u64, Arc<ProviderError>)>,
	refreshing: bool,
}
impl Slot {
	fn snapshot(&self) -> Option<ContextSnapshot> {
		let context = self.context.as_ref()?.clone();

		Some(ContextSnapshot { generation: self.context_generation, context })
	}

	// Context published by the latest cycle, even if the policy already considers it due.
	fn published_by_latest_cycle(&self) -> Option<ContextSnapshot> {
		match self.phase {
			Phase::Valid | Phase::Bypassed if self.context_generation == self.generation =>
				self.snapshot(),
			_ => None,
		}
	}

	fn fresh(&self, now: OffsetDateTime) -> Option<ContextSnapshot> {
		match self.phase {
			Phase::Bypassed => self.snapshot(),
			Phase::Valid if self.refresh_at.is_none_or(|at| now < at) => self.snapshot(),
			_ => None,
		}
	}
}
impl Default for Slot {
	fn default() -> Self {
		Self {
			phase: Phase::Uninitialized,
			context: None,
			context_generation: 0,
			generation: 0,
			refresh_at: None,
			last_failure: None,
			refreshing: false,
		}
	}
}

// Clears the refreshing flag even when the leader's future is dropped mid-refresh.
struct RefreshingFlag<'a>(&'a Mutex<Slot>);
impl Drop for RefreshingFlag<'_> {
	fn drop(&mut self) {
		self.0.lock().refreshing = false;
	}
}

/// Authentication context cache for one provider instance.
///
/// Construct one per provider instance and share it by reference (or inside the owning
/// [`TileBroker`](crate::broker::TileBroker)); it is never global.
#[derive(Debug, Default)]
pub struct AuthContextCache {
	slot: Mutex<Slot>,
	singleflight: AsyncMutex<()>,
	policy: RefreshPolicy,
	metrics: AuthMetrics,
}
impl AuthContextCache {
	/// Creates an empty cache with the given refresh policy.
	pub fn new(policy: RefreshPolicy) -> Self {
		Self { policy, ..Self::default() }
	}

	/// Returns the refresh policy.
	pub fn policy(&self) -> &RefreshPolicy {
		&self.policy
	}

	/// Returns the cache counters.
	pub fn metrics(&self) -> &AuthMetrics {
		&self.metrics
	}

	/// Returns the current lifecycle state.
	pub fn state(&self) -> AuthState {
		let slot = self.slot.lock();

		if slot.refreshing {
			return AuthState::Refreshing;
		}

		match slot.phase {
			Phase::Uninitialized => AuthState::Uninitialized,
			Phase::Valid if slot.refresh_at.is_some_and(|at| OffsetDateTime::now_utc() >= at) =>
				AuthState::Stale,
			Phase::Valid => AuthState::Valid,
			Phase::Stale => AuthState::Stale,
			Phase::Bypassed => AuthState::Bypassed,
		}
	}

	/// Returns the published context without triggering a refresh, even if it is stale.
	pub fn peek(&self) -> Option<ContextSnapshot> {
		self.slot.lock().snapshot()
	}

	/// Returns a usable context, running `refresh` if none is cached.
	///
	/// `refresh` receives the previous context ([`ProviderContext::default`] on first use) and is
	/// invoked at most once per refresh cycle across all concurrent callers. Callers that waited on
	/// a cycle receive its context or its error; a failure is not cached.
	pub async fn current<F, Fut>(&self, refresh: F) -> Result<ContextSnapshot, Arc<ProviderError>>
	where
		F: FnOnce(Arc<ProviderContext>) -> Fut,
		Fut: Future<Output = Result<ProviderContext, ProviderError>>,
	{
		loop {
			let seen = {
				let slot = self.slot.lock();

				if let Some(snapshot) = slot.fresh(OffsetDateTime::now_utc()) {
					return Ok(snapshot);
				}

				slot.generation
			};
			let _singleflight = self.singleflight.lock().await;
			let previous = {
				let mut slot = self.slot.lock();

				if slot.generation != seen {
					if let Some(snapshot) = slot
						.fresh(OffsetDateTime::now_utc())
						.or_else(|| slot.published_by_latest_cycle())
					{
						return Ok(snapshot);
					}

					match &slot.last_failure {
						Some((generation, err)) if *generation == slot.generation =>
							return Err(err.clone()),
						// The context published during the wait has already been invalidated.
						_ => continue,
					}
				}

				slot.refreshing = true;

				slot.context.clone().unwrap_or_default()
			};
			let flag = RefreshingFlag(&self.slot);

			self.metrics.record_attempt();

			let outcome = refresh(previous).await;

			drop(flag);

			return self.publish(outcome);
		}
	}

	/// Marks `snapshot` stale so the next [`current`](Self::current) call refreshes it.
	///
	/// Only the first report for a generation has an effect; later reports against the same (or an
	/// older) generation, and reports against a bypassed context, return `false`.
	pub fn invalidate(&self, snapshot: &ContextSnapshot) -> bool {
		let mut slot = self.slot.lock();

		if slot.phase != Phase::Valid || slot.context_generation != snapshot.generation {
			return false;
		}

		slot.phase = Phase::Stale;

		self.metrics.record_invalidation();

		true
	}

	fn publish(
		&self,
		outcome: Result<ProviderContext, ProviderError>,
	) -> Result<ContextSnapshot, Arc<ProviderError>> {
		let mut slot = self.slot.lock();

		slot.generation += 1;

		match outcome {
			Ok(context) => {
				let now = OffsetDateTime::now_utc();
				let context = Arc::new(context);

				slot.phase = if context.auth_bypass { Phase::Bypassed } else { Phase::Valid };
				slot.refresh_at =
					if context.auth_bypass { None } else { self.policy.refresh_at(&context, now) };
				slot.context = Some(context.clone());
				slot.context_generation = slot.generation;
				slot.last_failure = None;

				self.metrics.record_success();

				Ok(ContextSnapshot { generation: slot.generation, context })
			},
			Err(err) => {
				let err = Arc::new(err);

				slot.last_failure = Some((slot.generation, err.clone()));

				self.metrics.record_failure();

				Err(err)
			},
		}
	}
}
