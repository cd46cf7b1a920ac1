//! Pluggable map-tile providers behind a single-flight authentication context cache.
//!
//! A [`broker::TileBroker`] owns one provider instance together with its read-only environment and
//! an [`cache::AuthContextCache`]. Concurrent tile fetches share one cached authentication
//! outcome, at most one `pre_auth` runs per provider instance at any time, and a tile fetch that
//! reports an expired context triggers exactly one refresh before it is retried.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod provider;
pub mod tile;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		broker::TileBroker,
		config::{ClientConfig, ErrorMessages},
		http::{HttpFuture, TileHttpClient},
		provider::{
			Provider, ProviderContext, ProviderEnv, ProviderError, ProviderErrorKind,
			ProviderFuture,
		},
		tile::{Image, LayerName, TileRequest},
	};

	/// Builds a [`TileRequest`] for the `test` layer.
	pub fn tile(z: u8, x: u32, y: u32) -> TileRequest {
		let layer = LayerName::new("test").expect("Failed to build test layer name.");

		TileRequest::new(layer, z, x, y)
	}

	/// Transport that fails every call; for providers that never touch the network.
	#[derive(Debug, Default)]
	pub struct OfflineHttpClient;
	impl TileHttpClient for OfflineHttpClient {
		fn get<'a>(
			&'a self,
			_config: &'a ClientConfig,
			url: &'a Url,
			_headers: &'a [(String, String)],
		) -> HttpFuture<'a, Image> {
			Box::pin(async move {
				Err(crate::http::FetchError::network(std::io::Error::other(format!(
					"offline transport cannot reach {url}"
				))))
			})
		}

		fn post_form<'a>(
			&'a self,
			config: &'a ClientConfig,
			url: &'a Url,
			_form: &'a [(String, String)],
			headers: &'a [(String, String)],
		) -> HttpFuture<'a, Image> {
			self.get(config, url, headers)
		}
	}

	/// Scripted outcome for [`CountingProvider::generate_tile`].
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub enum TileScript {
		/// Always return an image tagged with the context token.
		Succeed,
		/// Report `AuthExpired` until the context generation reaches the given value.
		ExpireUntil(usize),
		/// Always report `AuthExpired`.
		AlwaysExpired,
		/// Always report a terminal fetch failure.
		AlwaysFail,
	}

	/// In-process provider that counts calls and can be scripted to expire or fail.
	///
	/// Each successful `pre_auth` issues the token `token-<n>` where `n` counts successful
	/// authentications, so tests can tell which refresh cycle a tile was served from.
	#[derive(Debug)]
	pub struct CountingProvider {
		/// Number of `pre_auth` invocations.
		pub pre_auth_calls: AtomicUsize,
		/// Number of `generate_tile` invocations.
		pub tile_calls: AtomicUsize,
		/// Whether `pre_auth` sets `auth_bypass`.
		pub bypass: bool,
		/// Number of leading `pre_auth` calls that fail.
		pub failing_pre_auths: usize,
		/// Delay applied inside `pre_auth` to widen race windows.
		pub pre_auth_delay: std::time::Duration,
		/// Script driving `generate_tile`.
		pub script: TileScript,
		issued: AtomicUsize,
	}
	impl CountingProvider {
		/// Creates a provider that authenticates successfully and serves every tile.
		pub fn new() -> Self {
			Self {
				pre_auth_calls: AtomicUsize::new(0),
				tile_calls: AtomicUsize::new(0),
				bypass: false,
				failing_pre_auths: 0,
				pre_auth_delay: std::time::Duration::from_millis(20),
				script: TileScript::Succeed,
				issued: AtomicUsize::new(0),
			}
		}

		/// Makes `pre_auth` return `auth_bypass = true`.
		pub fn bypassing(mut self) -> Self {
			self.bypass = true;

			self
		}

		/// Makes the first `count` `pre_auth` calls fail.
		pub fn failing_pre_auths(mut self, count: usize) -> Self {
			self.failing_pre_auths = count;

			self
		}

		/// Overrides the `pre_auth` delay.
		pub fn with_pre_auth_delay(mut self, delay: std::time::Duration) -> Self {
			self.pre_auth_delay = delay;

			self
		}

		/// Overrides the `generate_tile` script.
		pub fn with_script(mut self, script: TileScript) -> Self {
			self.script = script;

			self
		}

		/// Returns the number of `pre_auth` invocations so far.
		pub fn pre_auths(&self) -> usize {
			self.pre_auth_calls.load(Ordering::SeqCst)
		}

		/// Returns the number of `generate_tile` invocations so far.
		pub fn tiles(&self) -> usize {
			self.tile_calls.load(Ordering::SeqCst)
		}
	}
	impl Default for CountingProvider {
		fn default() -> Self {
			Self::new()
		}
	}
	impl Provider for CountingProvider {
		fn name(&self) -> &str {
			"counting"
		}

		fn pre_auth<'a>(
			&'a self,
			_previous: &'a ProviderContext,
			_env: &'a ProviderEnv,
		) -> ProviderFuture<'a, ProviderContext> {
			Box::pin(async move {
				let call = self.pre_auth_calls.fetch_add(1, Ordering::SeqCst);

				tokio::time::sleep(self.pre_auth_delay).await;

				if call < self.failing_pre_auths {
					return Err(ProviderError::new(
						ProviderErrorKind::Fetch,
						format!("identity provider unreachable (attempt {})", call + 1),
					));
				}
				if self.bypass {
					return Ok(ProviderContext::bypass());
				}

				let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

				Ok(ProviderContext::with_token(format!("token-{n}")).with_value("generation", n))
			})
		}

		fn generate_tile<'a>(
			&'a self,
			context: &'a ProviderContext,
			request: &'a TileRequest,
			_env: &'a ProviderEnv,
		) -> ProviderFuture<'a, Image> {
			Box::pin(async move {
				self.tile_calls.fetch_add(1, Ordering::SeqCst);

				let generation = context
					.value("generation")
					.and_then(|value| value.parse::<usize>().ok())
					.unwrap_or(0);
				let expired = ProviderError::new(
					ProviderErrorKind::AuthExpired,
					format!("context generation {generation} was rejected"),
				);

				match self.script {
					TileScript::Succeed => {},
					TileScript::ExpireUntil(limit) if generation < limit => return Err(expired),
					TileScript::ExpireUntil(_) => {},
					TileScript::AlwaysExpired => return Err(expired),
					TileScript::AlwaysFail =>
						return Err(ProviderError::new(
							ProviderErrorKind::Fetch,
							"upstream returned garbage",
						)),
				}

				let token = context.token.as_ref().map(|secret| secret.expose()).unwrap_or("none");
				let body = format!("{}/{}/{}/{}@{token}", request.layer, request.z, request.x, request.y);

				Ok(Image::new(body.into_bytes()).with_content_type("text/plain"))
			})
		}
	}

	/// Builds a [`ProviderEnv`] with default client settings and an offline transport.
	pub fn offline_env() -> ProviderEnv {
		ProviderEnv::new(ClientConfig::default(), ErrorMessages::default(), OfflineHttpClient)
	}

	/// Wraps `provider` in a [`TileBroker`] backed by [`offline_env`].
	pub fn counting_broker(provider: Arc<CountingProvider>) -> TileBroker {
		TileBroker::new(provider, offline_env())
	}

	#[cfg(feature = "reqwest")]
	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> crate::http::ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		crate::http::ReqwestHttpClient::with_client(client)
	}

	#[cfg(feature = "reqwest")]
	/// Builds a [`ProviderEnv`] using the insecure reqwest transport.
	pub fn reqwest_env(client: ClientConfig) -> ProviderEnv {
		ProviderEnv::new(client, ErrorMessages::default(), test_reqwest_http_client())
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
