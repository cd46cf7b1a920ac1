//! Unauthenticated provider that fetches tiles from a URL template.

// self
use crate::{
	_prelude::*,
	config::{ErrorMessages, ProviderParams},
	error::ConfigError,
	provider::{
		Provider, ProviderContext, ProviderEnv, ProviderError, ProviderErrorKind, ProviderFuture,
		UrlTemplate, map_fetch_error,
	},
	tile::{Image, TileRequest},
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateParams {
	url: String,
	#[serde(default)]
	headers: BTreeMap<String, String>,
}

/// Provider for public tile servers such as `https://tile.openstreetmap.org/{z}/{x}/{y}.png`.
///
/// `pre_auth` returns a bypass context, so it runs once per instance.
///
/// Parameters: `url` (template, required) and `headers` (map of extra request headers, optional).
#[derive(Clone, Debug)]
pub struct TemplateProvider {
	name: String,
	template: UrlTemplate,
	headers: Vec<(String, String)>,
}
impl TemplateProvider {
	/// Builds the provider from untyped parameters.
	pub fn from_params(
		name: impl Into<String>,
		params: &ProviderParams,
	) -> Result<Self, ConfigError> {
		let TemplateParams { url, headers } = params.parse()?;

		Ok(Self {
			name: name.into(),
			template: UrlTemplate::parse(url)?,
			headers: headers.into_iter().collect(),
		})
	}

	/// Builds the provider from an already parsed template.
	pub fn new(name: impl Into<String>, template: UrlTemplate) -> Self {
		Self { name: name.into(), template, headers: Vec::new() }
	}

	/// Returns the configured template.
	pub fn template(&self) -> &UrlTemplate {
		&self.template
	}
}
impl Provider for TemplateProvider {
	fn name(&self) -> &str {
		&self.name
	}

	fn pre_auth<'a>(
		&'a self,
		_previous: &'a ProviderContext,
		_env: &'a ProviderEnv,
	) -> ProviderFuture<'a, ProviderContext> {
		Box::pin(async { Ok(ProviderContext::bypass()) })
	}

	fn generate_tile<'a>(
		&'a self,
		_context: &'a ProviderContext,
		request: &'a TileRequest,
		env: &'a ProviderEnv,
	) -> ProviderFuture<'a, Image> {
		Box::pin(async move {
			let url = self.template.render_url(request).map_err(|e| {
				ProviderError::new(
					ProviderErrorKind::InvalidResponse,
					env.messages.render(ErrorMessages::INVALID_RESPONSE, &[
						("provider", &self.name),
						("reason", &e),
					]),
				)
				.with_source(e)
			})?;

			env.http
				.get(&env.client, &url, &self.headers)
				.await
				.map_err(|e| map_fetch_error(e, &self.name, &url, &env.messages))
		})
	}
}
