//! Untyped per-instance provider parameters.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::ConfigError};

/// String-keyed provider configuration as supplied by the host.
///
/// Providers call [`ProviderParams::parse`] once at construction so type mismatches surface as a
/// [`ConfigError`] up front instead of during tile fetches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderParams(Map<String, Value>);
impl ProviderParams {
	/// Creates an empty parameter map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a parameter.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.0.insert(key.into(), value.into());

		self
	}

	/// Returns the raw value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Returns `true` when no parameters are set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Deserializes the parameters into a typed struct, reporting the offending key path.
	pub fn parse<T>(&self) -> Result<T, ConfigError>
	where
		T: DeserializeOwned,
	{
		serde_path_to_error::deserialize(Value::Object(self.0.clone())).map_err(|err| {
			let path = err.path().to_string();

			ConfigError::InvalidParams { path, source: err.into_inner() }
		})
	}
}
impl<K, V> FromIterator<(K, V)> for ProviderParams
where
	K: Into<String>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}
impl TryFrom<Value> for ProviderParams {
	type Error = ConfigError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Object(map) => Ok(Self(map)),
			other => Err(ConfigError::InvalidParams {
				path: ".".into(),
				source: <serde_json::Error as serde::de::Error>::custom(format!(
					"expected a mapping, found {other}"
				)),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize)]
	struct Params {
		url: String,
		#[serde(default)]
		retries: u8,
	}

	#[test]
	fn parses_typed_params() {
		let params = ProviderParams::new().with("url", "https://t/{z}/{x}/{y}").with("retries", 2);
		let parsed: Params = params.parse().expect("Params should parse.");

		assert_eq!(parsed.url, "https://t/{z}/{x}/{y}");
		assert_eq!(parsed.retries, 2);
	}

	#[test]
	fn reports_the_failing_key() {
		let params = ProviderParams::new().with("url", 42);
		let err = params.parse::<Params>().expect_err("A numeric url should be rejected.");

		assert!(matches!(err, ConfigError::InvalidParams { ref path, .. } if path == "url"));
	}

	#[test]
	fn rejects_non_mapping_values() {
		let err = ProviderParams::try_from(serde_json::json!(["url"]))
			.expect_err("Arrays are not parameter maps.");

		assert!(matches!(err, ConfigError::InvalidParams { .. }));
	}
}
