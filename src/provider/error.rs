//! Provider-level failures tagged with an explicit kind.

// self
use crate::{_prelude::*, config::ErrorMessages, error::BoxError, http::FetchError};

/// Failure categories the broker can pattern-match on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
	/// The supplied context is no longer valid; a fresh `pre_auth` is likely to help.
	AuthExpired,
	/// Network or upstream failure.
	Fetch,
	/// The upstream answered with an unusable payload.
	InvalidResponse,
	/// The call exceeded the configured timeout.
	Timeout,
}
impl ProviderErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderErrorKind::AuthExpired => "auth_expired",
			ProviderErrorKind::Fetch => "fetch",
			ProviderErrorKind::InvalidResponse => "invalid_response",
			ProviderErrorKind::Timeout => "timeout",
		}
	}
}
impl Display for ProviderErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Error returned by [`Provider`](crate::provider::Provider) operations.
#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct ProviderError {
	kind: ProviderErrorKind,
	message: String,
	#[source]
	source: Option<BoxError>,
}
impl ProviderError {
	/// Creates an error without an underlying cause.
	pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
		Self { kind, message: message.into(), source: None }
	}

	/// Creates an `AuthExpired` error.
	pub fn auth_expired(message: impl Into<String>) -> Self {
		Self::new(ProviderErrorKind::AuthExpired, message)
	}

	/// Creates a timeout error for an operation that exceeded `after`.
	pub fn timeout(operation: &str, after: StdDuration) -> Self {
		Self::new(
			ProviderErrorKind::Timeout,
			format!("{operation} timed out after {} ms", after.as_millis()),
		)
	}

	/// Attaches an underlying cause.
	pub fn with_source(mut self, src: impl 'static + Send + Sync + StdError) -> Self {
		self.source = Some(Box::new(src));

		self
	}

	/// Returns the failure category.
	pub fn kind(&self) -> ProviderErrorKind {
		self.kind
	}

	/// Returns the human-readable message.
	pub fn message(&self) -> &str {
		&self.message
	}

	/// Returns `true` for [`ProviderErrorKind::AuthExpired`].
	pub fn is_auth_expired(&self) -> bool {
		self.kind == ProviderErrorKind::AuthExpired
	}
}
impl From<FetchError> for ProviderError {
	fn from(e: FetchError) -> Self {
		let kind = match &e {
			FetchError::Timeout { .. } => ProviderErrorKind::Timeout,
			_ => ProviderErrorKind::Fetch,
		};

		Self::new(kind, e.to_string()).with_source(e)
	}
}

/// Maps an upstream HTTP status onto the provider taxonomy.
///
/// `401` and `403` mean the credentials were rejected; everything else is a plain fetch failure.
pub fn classify_status(status: u16) -> ProviderErrorKind {
	match status {
		401 | 403 => ProviderErrorKind::AuthExpired,
		_ => ProviderErrorKind::Fetch,
	}
}

/// Converts a transport failure into a [`ProviderError`].
///
/// Status failures are classified with [`classify_status`] and described with the matching
/// [`ErrorMessages`] template; other failures keep the transport's own message.
pub fn map_fetch_error(
	e: FetchError,
	provider: &str,
	url: &Url,
	messages: &ErrorMessages,
) -> ProviderError {
	let Some(status) = e.http_status() else {
		return ProviderError::from(e);
	};
	let kind = classify_status(status);
	let key = match kind {
		ProviderErrorKind::AuthExpired => ErrorMessages::AUTH_EXPIRED,
		_ => ErrorMessages::FETCH_FAILED,
	};
	let message =
		messages.render(key, &[("provider", &provider), ("status", &status), ("url", url)]);

	ProviderError::new(kind, message).with_source(e)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_classification() {
		assert_eq!(classify_status(401), ProviderErrorKind::AuthExpired);
		assert_eq!(classify_status(403), ProviderErrorKind::AuthExpired);
		assert_eq!(classify_status(404), ProviderErrorKind::Fetch);
		assert_eq!(classify_status(500), ProviderErrorKind::Fetch);
	}

	#[test]
	fn status_failures_use_message_templates() {
		let url = Url::parse("https://t/1/2/3").expect("URL should parse.");
		let messages = ErrorMessages::default();
		let fetch = FetchError::status(403, url.as_str(), None);
		let err = map_fetch_error(fetch, "demo", &url, &messages);

		assert!(err.is_auth_expired());
		assert_eq!(err.message(), "demo: upstream rejected the credentials (HTTP 403)");

		let fetch = FetchError::status(500, url.as_str(), None);
		let err = map_fetch_error(fetch, "demo", &url, &messages);

		assert_eq!(err.kind(), ProviderErrorKind::Fetch);
		assert_eq!(err.message(), "demo: HTTP 500 from https://t/1/2/3");
	}

	#[test]
	fn fetch_errors_keep_their_source() {
		let fetch = FetchError::Timeout { url: "https://t/1/2/3".into() };
		let err = ProviderError::from(fetch);

		assert_eq!(err.kind(), ProviderErrorKind::Timeout);
		assert!(StdError::source(&err).is_some());
		assert!(!err.is_auth_expired());
	}
}
