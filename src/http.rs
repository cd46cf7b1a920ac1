//! The fetch primitive providers use to reach upstream tile and token endpoints.
//!
//! [`TileHttpClient`] is the crate's only dependency on an HTTP stack. It applies the
//! [`ClientConfig`] (timeout, user agent, static headers, header policy) so providers only supply
//! the URL and the headers they own, typically an injected auth token. A non-success status is
//! reported as [`FetchError::Status`], which providers classify (401/403 versus everything else).

// self
use crate::{_prelude::*, config::ClientConfig, error::BoxError, tile::Image};

/// Boxed future returned by [`TileHttpClient`] operations.
pub type HttpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + 'a + Send>>;

/// Abstraction over HTTP transports used by providers.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared across provider
/// instances behind an `Arc`.
pub trait TileHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Performs a GET with the configured timeout, user agent, and headers plus `headers`.
	fn get<'a>(
		&'a self,
		config: &'a ClientConfig,
		url: &'a Url,
		headers: &'a [(String, String)],
	) -> HttpFuture<'a, Image>;

	/// Performs a form-encoded POST; used for token exchanges where GET is insufficient.
	fn post_form<'a>(
		&'a self,
		config: &'a ClientConfig,
		url: &'a Url,
		form: &'a [(String, String)],
		headers: &'a [(String, String)],
	) -> HttpFuture<'a, Image>;
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum FetchError {
	/// The upstream answered with a non-success status.
	#[error("HTTP {status} from {url}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Requested URL.
		url: String,
		/// Leading part of the response body, for diagnostics.
		body_preview: Option<String>,
	},
	/// The request did not complete within the configured timeout.
	#[error("Request to {url} timed out.")]
	Timeout {
		/// Requested URL.
		url: String,
	},
	/// DNS, TCP, TLS, or body read failure.
	#[error("Network error occurred while calling the upstream.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request could not be built (invalid header name or value).
	#[error("Request could not be built: {reason}.")]
	Build {
		/// What was rejected.
		reason: String,
	},
}
impl FetchError {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Builds a [`FetchError::Status`] and truncates the body preview.
	pub fn status(status: u16, url: impl Into<String>, body: Option<&[u8]>) -> Self {
		let body_preview = body
			.filter(|bytes| !bytes.is_empty())
			.map(|bytes| truncate_preview(String::from_utf8_lossy(bytes).into_owned()));

		Self::Status { status, url: url.into(), body_preview }
	}

	/// Returns the HTTP status for [`FetchError::Status`].
	pub fn http_status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } => Some(*status),
			_ => None,
		}
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= FetchError::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(FetchError::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The timeout and user agent come from the per-call [`ClientConfig`], so one client can serve
/// provider instances with different settings.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with rustls and connection pooling defaults.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		Ok(Self(ReqwestClient::builder().build()?))
	}

	fn apply(
		config: &ClientConfig,
		mut builder: reqwest::RequestBuilder,
		headers: &[(String, String)],
	) -> reqwest::RequestBuilder {
		builder = builder
			.timeout(config.timeout)
			.header(reqwest::header::USER_AGENT, config.user_agent.as_str());

		for (name, value) in config.merge_headers(headers) {
			builder = builder.header(name, value);
		}

		builder
	}

	async fn send(builder: reqwest::RequestBuilder, url: &Url) -> Result<Image, FetchError> {
		let map_err = |e: ReqwestError| {
			if e.is_timeout() {
				FetchError::Timeout { url: url.to_string() }
			} else if e.is_builder() {
				FetchError::Build { reason: e.to_string() }
			} else {
				FetchError::network(e)
			}
		};
		let response = builder.send().await.map_err(map_err)?;
		let status = response.status();
		let content_type = response
			.headers()
			.get(reqwest::header::CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.map(ToOwned::to_owned);
		let bytes = response.bytes().await.map_err(map_err)?;

		if !status.is_success() {
			return Err(FetchError::status(status.as_u16(), url.as_str(), Some(&bytes)));
		}

		let image = Image::new(bytes.to_vec());

		Ok(match content_type {
			Some(content_type) => image.with_content_type(content_type),
			None => image,
		})
	}
}
#[cfg(feature = "reqwest")]
impl TileHttpClient for ReqwestHttpClient {
	fn get<'a>(
		&'a self,
		config: &'a ClientConfig,
		url: &'a Url,
		headers: &'a [(String, String)],
	) -> HttpFuture<'a, Image> {
		Box::pin(async move {
			let builder = Self::apply(config, self.0.get(url.clone()), headers);

			Self::send(builder, url).await
		})
	}

	fn post_form<'a>(
		&'a self,
		config: &'a ClientConfig,
		url: &'a Url,
		form: &'a [(String, String)],
		headers: &'a [(String, String)],
	) -> HttpFuture<'a, Image> {
		Box::pin(async move {
			let builder = Self::apply(config, self.0.post(url.clone()), headers).form(form);

			Self::send(builder, url).await
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_errors_truncate_previews() {
		let body = "x".repeat(FetchError::BODY_PREVIEW_LIMIT + 10);
		let err = FetchError::status(500, "https://t/1/2/3", Some(body.as_bytes()));

		assert_eq!(err.http_status(), Some(500));

		let FetchError::Status { body_preview: Some(preview), .. } = err else {
			panic!("Expected a status error with a preview.");
		};

		assert_eq!(preview.chars().count(), FetchError::BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}

	#[test]
	fn empty_bodies_have_no_preview() {
		let err = FetchError::status(401, "https://t", Some(b""));

		assert!(matches!(err, FetchError::Status { body_preview: None, .. }));
		assert_eq!(err.to_string(), "HTTP 401 from https://t.");
	}
}
