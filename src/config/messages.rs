//! Localizable error message templates.

// self
use crate::{_prelude::*, provider::url_template};

/// Maps error keys to message templates containing `{name}` placeholders.
///
/// Lookups fall back to the built-in English template for well-known keys and finally to the key
/// itself, so rendering never fails.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorMessages(BTreeMap<String, String>);
impl ErrorMessages {
	/// `pre_auth` could not obtain credentials. Placeholders: `provider`, `reason`.
	pub const AUTH_FAILED: &'static str = "auth_failed";
	/// The upstream rejected the cached credentials. Placeholders: `provider`, `status`.
	pub const AUTH_EXPIRED: &'static str = "auth_expired";
	/// The upstream returned a non-success status. Placeholders: `provider`, `status`, `url`.
	pub const FETCH_FAILED: &'static str = "fetch_failed";
	/// The upstream answered with an unusable payload. Placeholders: `provider`, `reason`.
	pub const INVALID_RESPONSE: &'static str = "invalid_response";

	/// Adds or replaces the template for `key`.
	pub fn with_message(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
		self.0.insert(key.into(), template.into());

		self
	}

	/// Returns the raw template configured for `key`, if any.
	pub fn template(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str).or_else(|| default_template(key))
	}

	/// Renders the template for `key`, substituting `args` by name.
	///
	/// Unknown placeholders are kept verbatim.
	pub fn render(&self, key: &str, args: &[(&str, &dyn Display)]) -> String {
		let Some(template) = self.template(key) else {
			return key.to_owned();
		};

		url_template::expand(template, |name| {
			args.iter().find(|(arg, _)| *arg == name).map(|(_, value)| value.to_string())
		})
	}
}
impl FromIterator<(String, String)> for ErrorMessages {
	fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

fn default_template(key: &str) -> Option<&'static str> {
	match key {
		ErrorMessages::AUTH_FAILED => Some("{provider}: authentication failed: {reason}"),
		ErrorMessages::AUTH_EXPIRED =>
			Some("{provider}: upstream rejected the credentials (HTTP {status})"),
		ErrorMessages::FETCH_FAILED => Some("{provider}: HTTP {status} from {url}"),
		ErrorMessages::INVALID_RESPONSE => Some("{provider}: invalid response: {reason}"),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn renders_defaults_and_overrides() {
		let messages = ErrorMessages::default();

		assert_eq!(
			messages.render(ErrorMessages::FETCH_FAILED, &[
				("provider", &"osm"),
				("status", &500),
				("url", &"https://t/1/2/3"),
			]),
			"osm: HTTP 500 from https://t/1/2/3",
		);

		let messages = messages.with_message(ErrorMessages::AUTH_FAILED, "{provider} a refusé: {raison}");

		assert_eq!(
			messages.render(ErrorMessages::AUTH_FAILED, &[("provider", &"osm")]),
			"osm a refusé: {raison}",
		);
	}

	#[test]
	fn unknown_keys_render_as_the_key() {
		assert_eq!(ErrorMessages::default().render("quota_exceeded", &[]), "quota_exceeded");
	}

	#[test]
	fn deserializes_from_a_plain_map() {
		let messages: ErrorMessages =
			serde_json::from_str(r#"{"fetch_failed":"failed {url}"}"#).expect("Should parse.");

		assert_eq!(messages.template(ErrorMessages::FETCH_FAILED), Some("failed {url}"));
	}
}
