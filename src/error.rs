//! Broker-level error types shared across the cache, providers, and transports.

// self
use crate::{_prelude::*, provider::ProviderError};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
///
/// Every failure is returned to the caller of [`TileBroker::fetch_tile`]; the broker itself only
/// reacts to [`ProviderErrorKind::AuthExpired`] by refreshing once before retrying.
///
/// [`TileBroker::fetch_tile`]: crate::broker::TileBroker::fetch_tile
/// [`ProviderErrorKind::AuthExpired`]: crate::provider::ProviderErrorKind::AuthExpired
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// `pre_auth` failed or timed out; the cache stays unrefreshed.
	///
	/// The source is shared so every request waiting on the same refresh cycle observes the same
	/// failure.
	#[error("Provider `{provider}` could not authenticate.")]
	AuthenticationRefresh {
		/// Provider name.
		provider: String,
		/// Failure reported by `pre_auth`.
		#[source]
		source: Arc<ProviderError>,
	},
	/// The provider still rejects a freshly refreshed context (or it cannot be refreshed).
	#[error("Provider `{provider}` rejected its authentication context.")]
	AuthExpired {
		/// Provider name.
		provider: String,
		/// Failure reported by `generate_tile`.
		#[source]
		source: ProviderError,
	},
	/// Terminal tile fetch failure (network, timeout, malformed response).
	#[error("Provider `{provider}` failed to generate the tile.")]
	Fetch {
		/// Provider name.
		provider: String,
		/// Failure reported by `generate_tile`.
		#[source]
		source: ProviderError,
	},
}
impl Error {
	/// Returns the provider error that caused a refresh or fetch failure, if any.
	pub fn provider_error(&self) -> Option<&ProviderError> {
		match self {
			Self::AuthenticationRefresh { source, .. } => Some(source.as_ref()),
			Self::AuthExpired { source, .. } | Self::Fetch { source, .. } => Some(source),
			Self::Config(_) => None,
		}
	}
}

/// Configuration and validation failures raised while building providers and transports.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Provider parameters do not match the provider's schema.
	#[error("Provider parameter `{path}` is invalid.")]
	InvalidParams {
		/// Path of the offending key (e.g. `url` or `headers.x-api-key`).
		path: String,
		/// Structured deserialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// URL template does not render to an absolute URL.
	#[error("URL template `{template}` is invalid.")]
	InvalidTemplate {
		/// Template as configured.
		template: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured endpoint URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Parameter that carried the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Layer name failed validation.
	#[error("Layer name is invalid.")]
	InvalidLayer(#[from] crate::tile::LayerNameError),
	/// No built-in provider is registered under the requested name.
	#[error("No provider is registered under `{name}`.")]
	UnknownProvider {
		/// Requested provider kind.
		name: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
