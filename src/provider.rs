//! The provider contract (`pre_auth` + `generate_tile`) and the built-in providers.
//!
//! A [`Provider`] turns tile coordinates into image bytes, possibly through an authenticated
//! upstream. Authentication state lives in a [`ProviderContext`] produced by
//! [`Provider::pre_auth`]; the broker caches it and hands read-only snapshots to concurrent
//! [`Provider::generate_tile`] calls. A tile call that finds its context stale reports
//! [`ProviderErrorKind::AuthExpired`], the only error kind the broker reacts to.

pub mod context;
pub mod error;
pub mod factory;
pub mod template;
pub mod token;
pub mod url_template;

pub use context::*;
pub use error::*;
pub use factory::*;
pub use template::TemplateProvider;
pub use token::TokenProvider;
pub use url_template::UrlTemplate;

// self
use crate::{
	_prelude::*,
	config::{ClientConfig, ErrorMessages},
	http::TileHttpClient,
	tile::{Image, TileRequest},
};

/// Boxed future returned by [`Provider`] operations.
pub type ProviderFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ProviderError>> + 'a + Send>>;

/// Pluggable tile backend.
///
/// Implementations must be `Send + Sync`; one instance serves every concurrent request for its
/// layer. The broker guarantees that `pre_auth` is never executed concurrently with itself for the
/// same instance, but `generate_tile` runs concurrently with both operations.
pub trait Provider
where
	Self: Send + Sync,
{
	/// Returns a stable name for logs and error messages.
	fn name(&self) -> &str;

	/// Produces a fresh authentication context.
	///
	/// `previous` is [`ProviderContext::default`] on the first call and the superseded context on
	/// later refreshes. Returning a context with `auth_bypass` set disables further calls for the
	/// lifetime of the instance. Implementations do not retry internally.
	fn pre_auth<'a>(
		&'a self,
		previous: &'a ProviderContext,
		env: &'a ProviderEnv,
	) -> ProviderFuture<'a, ProviderContext>;

	/// Fetches one tile using a cached context.
	///
	/// Report [`ProviderErrorKind::AuthExpired`] when the upstream rejects `context`; any other kind
	/// is terminal for the attempt.
	fn generate_tile<'a>(
		&'a self,
		context: &'a ProviderContext,
		request: &'a TileRequest,
		env: &'a ProviderEnv,
	) -> ProviderFuture<'a, Image>;
}

/// Read-only collaborators shared by every call of one provider instance.
#[derive(Clone)]
pub struct ProviderEnv {
	/// Fetch behavior (timeout, user agent, headers).
	pub client: ClientConfig,
	/// Message templates used when describing failures.
	pub messages: ErrorMessages,
	/// Fetch primitive.
	pub http: Arc<dyn TileHttpClient>,
}
impl ProviderEnv {
	/// Bundles configuration with a transport.
	pub fn new(client: ClientConfig, messages: ErrorMessages, http: impl TileHttpClient) -> Self {
		Self::with_shared_http(client, messages, Arc::new(http))
	}

	/// Bundles configuration with a transport that is shared with other instances.
	pub fn with_shared_http(
		client: ClientConfig,
		messages: ErrorMessages,
		http: Arc<dyn TileHttpClient>,
	) -> Self {
		Self { client, messages, http }
	}
}
impl Debug for ProviderEnv {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderEnv")
			.field("client", &self.client)
			.field("messages", &self.messages)
			.finish_non_exhaustive()
	}
}
