//! Construction of built-in providers by name.
//!
//! New built-in providers are added as [`ProviderKind`] variants; hosts describe an instance with a
//! [`ProviderSpec`] and call [`ProviderSpec::build`].

// self
use crate::{
	_prelude::*,
	config::ProviderParams,
	error::ConfigError,
	provider::{Provider, TemplateProvider, TokenProvider},
};

/// Built-in provider implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
	/// [`TemplateProvider`]: public tile server, no authentication.
	Template,
	/// [`TokenProvider`]: token exchange, token injected as a request header.
	Token,
}
impl ProviderKind {
	/// Returns the registration name.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderKind::Template => "template",
			ProviderKind::Token => "token",
		}
	}
}
impl Display for ProviderKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ProviderKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"template" => Ok(Self::Template),
			"token" => Ok(Self::Token),
			other => Err(ConfigError::UnknownProvider { name: other.into() }),
		}
	}
}

/// Host-side description of one provider instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
	/// Instance name used in logs and error messages.
	pub name: String,
	/// Implementation to construct.
	pub kind: ProviderKind,
	/// Implementation-specific parameters.
	#[serde(default)]
	pub params: ProviderParams,
}
impl ProviderSpec {
	/// Constructs the provider, validating its parameters.
	pub fn build(&self) -> Result<Arc<dyn Provider>, ConfigError> {
		build_provider(self.kind, self.name.as_str(), &self.params)
	}
}

/// Constructs a built-in provider.
pub fn build_provider(
	kind: ProviderKind,
	name: &str,
	params: &ProviderParams,
) -> Result<Arc<dyn Provider>, ConfigError> {
	Ok(match kind {
		ProviderKind::Template => Arc::new(TemplateProvider::from_params(name, params)?),
		ProviderKind::Token => Arc::new(TokenProvider::from_params(name, params)?),
	})
}
