//! Provider that exchanges credentials for a token and injects it into tile requests.
//!
//! `pre_auth` POSTs a form to `token_url` (optionally with HTTP Basic client credentials) and
//! expects a JSON body carrying `token` or `access_token`, plus an optional `expires_in` in
//! seconds. `generate_tile` GETs the rendered template with `header: header_prefix + token`; the
//! upstream answering 401/403 marks the context as expired.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	config::{ErrorMessages, ProviderParams},
	error::ConfigError,
	http::FetchError,
	provider::{
		Provider, ProviderContext, ProviderEnv, ProviderError, ProviderErrorKind, ProviderFuture,
		UrlTemplate, map_fetch_error,
	},
	tile::{Image, TileRequest},
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TokenParams {
	url: String,
	token_url: String,
	#[serde(default)]
	client_id: Option<String>,
	#[serde(default)]
	client_secret: Option<String>,
	#[serde(default)]
	form: BTreeMap<String, String>,
	#[serde(default = "TokenParams::default_header")]
	header: String,
	#[serde(default = "TokenParams::default_header_prefix")]
	header_prefix: String,
}
impl TokenParams {
	fn default_header() -> String {
		"Authorization".into()
	}

	fn default_header_prefix() -> String {
		"Bearer ".into()
	}
}

// Both spellings are accepted; `token` wins when an upstream sends both.
#[derive(Debug, Deserialize)]
struct TokenResponse {
	#[serde(default)]
	token: Option<String>,
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}

/// Token-authenticated template provider.
///
/// Parameters: `url` (tile template), `token_url`, optional `client_id` + `client_secret` (sent as
/// HTTP Basic), optional `form` (extra form fields), optional `header` (default
/// `Authorization`), and optional `header_prefix` (default `"Bearer "`).
#[derive(Clone)]
pub struct TokenProvider {
	name: String,
	template: UrlTemplate,
	token_url: Url,
	basic_auth: Option<String>,
	form: Vec<(String, String)>,
	header: String,
	header_prefix: String,
}
impl TokenProvider {
	/// Builds the provider from untyped parameters.
	pub fn from_params(
		name: impl Into<String>,
		params: &ProviderParams,
	) -> Result<Self, ConfigError> {
		let TokenParams { url, token_url, client_id, client_secret, form, header, header_prefix } =
			params.parse()?;
		let token_url = Url::parse(&token_url)
			.map_err(|source| ConfigError::InvalidUrl { field: "token_url", source })?;
		let basic_auth = client_id.map(|id| {
			let credentials = format!("{id}:{}", client_secret.unwrap_or_default());

			format!("Basic {}", STANDARD.encode(credentials))
		});

		Ok(Self {
			name: name.into(),
			template: UrlTemplate::parse(url)?,
			token_url,
			basic_auth,
			form: form.into_iter().collect(),
			header,
			header_prefix,
		})
	}

	/// Returns the configured tile template.
	pub fn template(&self) -> &UrlTemplate {
		&self.template
	}

	fn invalid_response(&self, env: &ProviderEnv, reason: &dyn Display) -> ProviderError {
		ProviderError::new(
			ProviderErrorKind::InvalidResponse,
			env.messages.render(ErrorMessages::INVALID_RESPONSE, &[
				("provider", &self.name),
				("reason", reason),
			]),
		)
	}

	fn parse_token(
		&self,
		env: &ProviderEnv,
		body: &[u8],
	) -> Result<ProviderContext, ProviderError> {
		let mut de = serde_json::Deserializer::from_slice(body);
		let response: TokenResponse = serde_path_to_error::deserialize(&mut de).map_err(|e| {
			let reason = format!("token response at `{}`: {}", e.path(), e.inner());

			self.invalid_response(env, &reason).with_source(e.into_inner())
		})?;

		let Some(token) = response.token.or(response.access_token) else {
			return Err(self.invalid_response(env, &"token response carried no token"));
		};

		if token.is_empty() {
			return Err(self.invalid_response(env, &"token response carried an empty token"));
		}

		let mut context = ProviderContext::with_token(token);

		if let Some(secs) = response.expires_in {
			if secs <= 0 {
				return Err(self.invalid_response(env, &"expires_in must be positive"));
			}

			let Some(expires_at) = OffsetDateTime::now_utc().checked_add(Duration::seconds(secs))
			else {
				return Err(self.invalid_response(env, &"expires_in out of range"));
			};

			context = context.expiring_at(expires_at);
		}

		Ok(context)
	}
}
impl Debug for TokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProvider")
			.field("name", &self.name)
			.field("template", &self.template)
			.field("token_url", &self.token_url.as_str())
			.field("basic_auth_set", &self.basic_auth.is_some())
			.field("header", &self.header)
			.finish()
	}
}
impl Provider for TokenProvider {
	fn name(&self) -> &str {
		&self.name
	}

	fn pre_auth<'a>(
		&'a self,
		_previous: &'a ProviderContext,
		env: &'a ProviderEnv,
	) -> ProviderFuture<'a, ProviderContext> {
		Box::pin(async move {
			let headers = self
				.basic_auth
				.iter()
				.map(|value| ("Authorization".to_owned(), value.clone()))
				.collect::<Vec<_>>();
			let image = env
				.http
				.post_form(&env.client, &self.token_url, &self.form, &headers)
				.await
				.map_err(|e| {
					let kind = match e {
						FetchError::Timeout { .. } => ProviderErrorKind::Timeout,
						_ => ProviderErrorKind::Fetch,
					};
					let message = env.messages.render(ErrorMessages::AUTH_FAILED, &[
						("provider", &self.name),
						("reason", &e),
					]);

					ProviderError::new(kind, message).with_source(e)
				})?;

			self.parse_token(env, &image.bytes)
		})
	}

	fn generate_tile<'a>(
		&'a self,
		context: &'a ProviderContext,
		request: &'a TileRequest,
		env: &'a ProviderEnv,
	) -> ProviderFuture<'a, Image> {
		Box::pin(async move {
			let Some(token) = context.token.as_ref() else {
				return Err(ProviderError::auth_expired(format!(
					"{}: no token has been issued yet",
					self.name
				)));
			};

			if context.is_expired_at(OffsetDateTime::now_utc()) {
				return Err(ProviderError::auth_expired(format!(
					"{}: the issued token has expired",
					self.name
				)));
			}

			let url = self
				.template
				.render_url(request)
				.map_err(|e| self.invalid_response(env, &e).with_source(e))?;
			let value = format!("{}{}", self.header_prefix, token.expose());
			let headers = [(self.header.clone(), value)];

			env.http
				.get(&env.client, &url, &headers)
				.await
				.map_err(|e| map_fetch_error(e, &self.name, &url, &env.messages))
		})
	}
}
