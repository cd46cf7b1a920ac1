//! Tile fetch orchestration on top of one provider instance and its authentication cache.
//!
//! [`TileBroker::fetch_tile`] consults the cache, runs a single-flight `pre_auth` when no usable
//! context exists, and calls `generate_tile` with the resulting snapshot. When the provider reports
//! [`ProviderErrorKind::AuthExpired`](crate::provider::ProviderErrorKind::AuthExpired) the snapshot is
//! invalidated, the context is refreshed once, and the fetch is retried once. Every other failure
//! is returned to the caller unchanged.

// self
use crate::{
	_prelude::*,
	cache::{AuthContextCache, ContextSnapshot, RefreshPolicy},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{Provider, ProviderContext, ProviderEnv, ProviderError, ProviderSpec},
	tile::{Image, TileRequest},
};
#[cfg(feature = "reqwest")]
use crate::{
	config::{ClientConfig, ErrorMessages},
	http::ReqwestHttpClient,
};

/// Owns one provider instance, its environment, and its authentication context cache.
///
/// Share a broker behind an [`Arc`] to serve concurrent fetches; brokers never share state with
/// each other.
pub struct TileBroker {
	provider: Arc<dyn Provider>,
	env: ProviderEnv,
	cache: AuthContextCache,
}
impl TileBroker {
	/// Creates a broker with a purely reactive refresh policy.
	pub fn new(provider: Arc<dyn Provider>, env: ProviderEnv) -> Self {
		Self { provider, env, cache: AuthContextCache::default() }
	}

	/// Builds the provider described by `spec` and wraps it in a broker.
	pub fn from_spec(spec: &ProviderSpec, env: ProviderEnv) -> Result<Self> {
		Ok(Self::new(spec.build()?, env))
	}

	/// Replaces the refresh policy; call before the first fetch.
	pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
		self.cache = AuthContextCache::new(policy);

		self
	}

	/// Returns the provider instance.
	pub fn provider(&self) -> &Arc<dyn Provider> {
		&self.provider
	}

	/// Returns the environment handed to every provider call.
	pub fn env(&self) -> &ProviderEnv {
		&self.env
	}

	/// Returns the authentication context cache.
	pub fn cache(&self) -> &AuthContextCache {
		&self.cache
	}

	/// Fetches one tile, refreshing the authentication context at most once on `AuthExpired`.
	pub async fn fetch_tile(&self, request: &TileRequest) -> Result<Image> {
		const KIND: FlowKind = FlowKind::Tile;

		let span = FlowSpan::new(KIND, "fetch_tile", self.provider.name());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.fetch_with_retry(request)).await;

		match result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn fetch_with_retry(&self, request: &TileRequest) -> Result<Image> {
		let snapshot = self.context().await?;

		match self.generate(&snapshot, request).await {
			Ok(image) => return Ok(image),
			Err(e) if !e.is_auth_expired() || snapshot.is_bypassed() => return Err(self.terminal(e)),
			Err(_) => {},
		}

		if self.cache.invalidate(&snapshot) {
			obs::log_invalidation(self.provider.name(), snapshot.generation());
		}

		let snapshot = self.context().await?;

		self.generate(&snapshot, request).await.map_err(|e| self.terminal(e))
	}

	async fn context(&self) -> Result<ContextSnapshot> {
		self.cache.current(|previous| self.pre_auth(previous)).await.map_err(|source| {
			Error::AuthenticationRefresh { provider: self.provider.name().into(), source }
		})
	}

	async fn pre_auth(
		&self,
		previous: Arc<ProviderContext>,
	) -> Result<ProviderContext, ProviderError> {
		const KIND: FlowKind = FlowKind::PreAuth;

		let name = self.provider.name();
		let span = FlowSpan::new(KIND, "pre_auth", name);
		let timeout = self.env.client.timeout;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(tokio::time::timeout(timeout, self.provider.pre_auth(&previous, &self.env)))
			.await
			.unwrap_or_else(|_| Err(ProviderError::timeout("pre_auth", timeout)));

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::log_refresh_failure(name, e);
			},
		}

		result
	}

	async fn generate(
		&self,
		snapshot: &ContextSnapshot,
		request: &TileRequest,
	) -> Result<Image, ProviderError> {
		let timeout = self.env.client.timeout;

		tokio::time::timeout(
			timeout,
			self.provider.generate_tile(snapshot.context(), request, &self.env),
		)
		.await
		.unwrap_or_else(|_| Err(ProviderError::timeout("generate_tile", timeout)))
	}

	fn terminal(&self, source: ProviderError) -> Error {
		let provider = self.provider.name().to_owned();

		if source.is_auth_expired() {
			Error::AuthExpired { provider, source }
		} else {
			Error::Fetch { provider, source }
		}
	}
}
#[cfg(feature = "reqwest")]
impl TileBroker {
	/// Creates a broker backed by a fresh [`ReqwestHttpClient`] and the built-in error messages.
	pub fn with_reqwest(provider: Arc<dyn Provider>, client: ClientConfig) -> Result<Self> {
		let env = ProviderEnv::new(client, ErrorMessages::default(), ReqwestHttpClient::new()?);

		Ok(Self::new(provider, env))
	}
}
impl Debug for TileBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TileBroker")
			.field("provider", &self.provider.name())
			.field("env", &self.env)
			.field("state", &self.cache.state())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		cache::AuthState,
		config::{ClientConfig, ErrorMessages},
		provider::ProviderErrorKind,
	};

	fn body(image: &Image) -> &str {
		std::str::from_utf8(&image.bytes).expect("Counting tiles are UTF-8.")
	}

	#[tokio::test]
	async fn first_fetch_authenticates_once() {
		let provider = Arc::new(CountingProvider::new());
		let broker = counting_broker(provider.clone());
		let first = broker.fetch_tile(&tile(1, 2, 3)).await.expect("First fetch should succeed.");
		let second = broker.fetch_tile(&tile(4, 5, 6)).await.expect("Second fetch should succeed.");

		assert_eq!(body(&first), "test/1/2/3@token-1");
		assert_eq!(body(&second), "test/4/5/6@token-1");
		assert_eq!(provider.pre_auths(), 1);
		assert_eq!(broker.cache().state(), AuthState::Valid);
	}

	#[tokio::test]
	async fn auth_expired_refreshes_once_then_retries() {
		let provider = Arc::new(CountingProvider::new().with_script(TileScript::ExpireUntil(2)));
		let broker = counting_broker(provider.clone());
		let image = broker.fetch_tile(&tile(1, 2, 3)).await.expect("Retry should succeed.");

		assert_eq!(body(&image), "test/1/2/3@token-2");
		assert_eq!(provider.pre_auths(), 2);
		assert_eq!(provider.tiles(), 2);
		assert_eq!(broker.cache().metrics().invalidations(), 1);
	}

	#[tokio::test]
	async fn persistent_expiry_surfaces_after_one_retry() {
		let provider = Arc::new(CountingProvider::new().with_script(TileScript::AlwaysExpired));
		let broker = counting_broker(provider.clone());
		let err = broker.fetch_tile(&tile(1, 2, 3)).await.expect_err("Expiry should surface.");

		assert!(matches!(err, Error::AuthExpired { ref provider, .. } if provider == "counting"));
		assert_eq!(provider.pre_auths(), 2);
		assert_eq!(provider.tiles(), 2);
	}

	#[tokio::test]
	async fn bypassed_providers_never_refresh_on_expiry() {
		let provider = Arc::new(
			CountingProvider::new().bypassing().with_script(TileScript::AlwaysExpired),
		);
		let broker = counting_broker(provider.clone());

		for _ in 0..3 {
			let err = broker.fetch_tile(&tile(1, 2, 3)).await.expect_err("Expiry should surface.");

			assert!(matches!(err, Error::AuthExpired { .. }));
		}

		assert_eq!(provider.pre_auths(), 1);
		assert_eq!(provider.tiles(), 3);
		assert_eq!(broker.cache().state(), AuthState::Bypassed);
	}

	#[tokio::test]
	async fn fetch_failures_are_not_retried() {
		let provider = Arc::new(CountingProvider::new().with_script(TileScript::AlwaysFail));
		let broker = counting_broker(provider.clone());
		let err = broker.fetch_tile(&tile(1, 2, 3)).await.expect_err("Failure should surface.");

		assert!(matches!(err, Error::Fetch { .. }));
		assert_eq!(err.provider_error().map(ProviderError::kind), Some(ProviderErrorKind::Fetch));
		assert_eq!(provider.pre_auths(), 1);
		assert_eq!(provider.tiles(), 1);
	}

	#[tokio::test]
	async fn refresh_failures_do_not_poison_the_cache() {
		let provider = Arc::new(CountingProvider::new().failing_pre_auths(1));
		let broker = counting_broker(provider.clone());
		let err = broker.fetch_tile(&tile(1, 2, 3)).await.expect_err("Refresh should fail.");

		assert!(matches!(err, Error::AuthenticationRefresh { .. }));
		assert_eq!(provider.tiles(), 0);

		let image = broker.fetch_tile(&tile(1, 2, 3)).await.expect("Next fetch should recover.");

		assert_eq!(body(&image), "test/1/2/3@token-1");
		assert_eq!(provider.pre_auths(), 2);
	}

	#[tokio::test]
	async fn slow_pre_auth_times_out() {
		let provider = Arc::new(
			CountingProvider::new().with_pre_auth_delay(StdDuration::from_millis(500)),
		);
		let env = ProviderEnv::new(
			ClientConfig::default().with_timeout(StdDuration::from_millis(20)),
			ErrorMessages::default(),
			OfflineHttpClient,
		);
		let broker = TileBroker::new(provider, env);
		let err = broker.fetch_tile(&tile(1, 2, 3)).await.expect_err("Refresh should time out.");

		assert!(matches!(err, Error::AuthenticationRefresh { .. }));
		assert_eq!(err.provider_error().map(ProviderError::kind), Some(ProviderErrorKind::Timeout));
		assert_eq!(broker.cache().state(), AuthState::Uninitialized);
	}

	#[test]
	fn builds_from_specs() {
		let spec: ProviderSpec = serde_json::from_value(serde_json::json!({
			"name": "osm",
			"kind": "template",
			"params": { "url": "https://tile.openstreetmap.org/{z}/{x}/{y}.png" }
		}))
		.expect("Spec should deserialize.");
		let broker = TileBroker::from_spec(&spec, offline_env())
			.expect("Spec should build a broker.")
			.with_policy(RefreshPolicy::reactive().with_max_age(Duration::minutes(5)));

		assert_eq!(broker.provider().name(), "osm");
		assert!(!broker.cache().policy().is_reactive());
		assert!(format!("{broker:?}").contains("Uninitialized"));
	}
}
