//! Authentication state produced by `pre_auth`.

// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping tokens out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Opaque, immutable authentication state for one provider instance.
///
/// The cache replaces the whole value on every successful `pre_auth`; nothing mutates a context
/// after it has been published.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderContext {
	/// When set, `pre_auth` is never invoked again for this instance.
	pub auth_bypass: bool,
	/// Credential injected into upstream requests.
	pub token: Option<TokenSecret>,
	/// Instant after which the upstream is expected to reject [`token`](Self::token).
	pub expires_at: Option<OffsetDateTime>,
	/// Provider-defined payload.
	pub values: BTreeMap<String, String>,
}
impl ProviderContext {
	/// Context for providers that need no authentication.
	pub fn bypass() -> Self {
		Self { auth_bypass: true, ..Self::default() }
	}

	/// Context carrying a token.
	pub fn with_token(token: impl Into<String>) -> Self {
		Self { token: Some(TokenSecret::new(token)), ..Self::default() }
	}

	/// Sets the expiry instant.
	pub fn expiring_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Adds a provider-defined value.
	pub fn with_value(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.values.insert(key.into(), value.to_string());

		self
	}

	/// Returns a provider-defined value.
	pub fn value(&self, key: &str) -> Option<&str> {
		self.values.get(key).map(String::as_str)
	}

	/// Returns `true` once `now` has reached [`expires_at`](Self::expires_at).
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| now >= expires_at)
	}
}
