// self
use crate::provider::ProviderError;

/// Emits a debug event when a fetch invalidates the context of `generation`.
pub fn log_invalidation(provider: &str, generation: u64) {
	#[cfg(feature = "tracing")]
	tracing::debug!(provider, generation, "authentication context invalidated");
	#[cfg(not(feature = "tracing"))]
	let _ = (provider, generation);
}

/// Emits a warning when `pre_auth` fails.
pub fn log_refresh_failure(provider: &str, error: &ProviderError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(provider, kind = error.kind().as_str(), %error, "authentication refresh failed");
	#[cfg(not(feature = "tracing"))]
	let _ = (provider, error);
}
