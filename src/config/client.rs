//! Fetch-behavior parameters shared by every request of one provider instance.

// self
use crate::_prelude::*;

/// Which side wins when provider-supplied and configured headers share a name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPolicy {
	/// Provider headers (e.g., injected auth tokens) replace configured ones.
	#[default]
	ProviderOverrides,
	/// Configured headers replace provider-supplied ones.
	ConfigOverrides,
}

/// Timeout, user agent, and header policy applied to every upstream call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Upper bound for a single `pre_auth` or `generate_tile` call.
	#[serde(rename = "timeout_ms", with = "millis")]
	pub timeout: StdDuration,
	/// `User-Agent` sent with every request.
	pub user_agent: String,
	/// Static headers sent with every request.
	pub headers: BTreeMap<String, String>,
	/// Collision policy between [`headers`](Self::headers) and provider headers.
	pub header_policy: HeaderPolicy,
}
impl ClientConfig {
	/// Default per-call timeout.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);
	/// Default user agent.
	pub const DEFAULT_USER_AGENT: &'static str =
		concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

	/// Overrides the per-call timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the user agent.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Adds a static header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Overrides the header collision policy.
	pub fn with_header_policy(mut self, policy: HeaderPolicy) -> Self {
		self.header_policy = policy;

		self
	}

	/// Combines configured headers with `extra` according to [`HeaderPolicy`].
	///
	/// Header names compare case-insensitively. The user agent is not part of the result; transports
	/// apply it separately.
	pub fn merge_headers(&self, extra: &[(String, String)]) -> Vec<(String, String)> {
		let mut merged = Vec::with_capacity(self.headers.len() + extra.len());

		match self.header_policy {
			HeaderPolicy::ProviderOverrides => {
				for (name, value) in &self.headers {
					if !extra.iter().any(|(other, _)| other.eq_ignore_ascii_case(name)) {
						merged.push((name.clone(), value.clone()));
					}
				}

				merged.extend(extra.iter().cloned());
			},
			HeaderPolicy::ConfigOverrides => {
				for (name, value) in extra {
					if !self.headers.keys().any(|other| other.eq_ignore_ascii_case(name)) {
						merged.push((name.clone(), value.clone()));
					}
				}

				merged.extend(self.headers.iter().map(|(n, v)| (n.clone(), v.clone())));
			},
		}

		merged
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			timeout: Self::DEFAULT_TIMEOUT,
			user_agent: Self::DEFAULT_USER_AGENT.into(),
			headers: BTreeMap::new(),
			header_policy: HeaderPolicy::default(),
		}
	}
}

mod millis {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &StdDuration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<StdDuration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(StdDuration::from_millis)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
		pairs.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect()
	}

	#[test]
	fn provider_headers_win_by_default() {
		let config = ClientConfig::default()
			.with_header("authorization", "Bearer static")
			.with_header("X-Trace", "on");
		let merged = config.merge_headers(&headers(&[("Authorization", "Bearer abc")]));

		assert_eq!(merged, headers(&[("X-Trace", "on"), ("Authorization", "Bearer abc")]));
	}

	#[test]
	fn config_headers_can_win() {
		let config = ClientConfig::default()
			.with_header("Referer", "https://maps.example")
			.with_header_policy(HeaderPolicy::ConfigOverrides);
		let merged =
			config.merge_headers(&headers(&[("referer", "https://other"), ("X-Key", "k")]));

		assert_eq!(merged, headers(&[("X-Key", "k"), ("Referer", "https://maps.example")]));
	}

	#[test]
	fn deserializes_with_defaults() {
		let config: ClientConfig =
			serde_json::from_str(r#"{"timeout_ms":1500,"header_policy":"config_overrides"}"#)
				.expect("Client config should deserialize.");

		assert_eq!(config.timeout, StdDuration::from_millis(1500));
		assert_eq!(config.user_agent, ClientConfig::DEFAULT_USER_AGENT);
		assert_eq!(config.header_policy, HeaderPolicy::ConfigOverrides);
		assert!(config.headers.is_empty());
	}
}
