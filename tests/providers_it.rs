// crates.io
use httpmock::prelude::*;
// self
use tile_broker::{
	_preludet::*,
	broker::TileBroker,
	cache::AuthState,
	config::{ClientConfig, ProviderParams},
	provider::{ProviderErrorKind, TemplateProvider, TokenProvider, UrlTemplate},
};

fn token_broker(server: &MockServer, client: ClientConfig) -> TileBroker {
	let params = ProviderParams::new()
		.with("url", server.url("/{z}/{x}/{y}"))
		.with("token_url", server.url("/token"))
		.with("client_id", "id")
		.with("client_secret", "secret");
	let provider =
		TokenProvider::from_params("token", &params).expect("Token params should be valid.");

	TileBroker::new(Arc::new(provider), reqwest_env(client))
}

#[tokio::test]
async fn token_provider_serves_tiles_with_the_issued_token() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("authorization", "Basic aWQ6c2VjcmV0");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"token":"abc","expires_in":3600}"#);
		})
		.await;
	let tile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/1/2/3").header("authorization", "Bearer abc");
			then.status(200).header("content-type", "image/png").body("png-bytes");
		})
		.await;
	let broker = token_broker(&server, ClientConfig::default());
	let image = broker.fetch_tile(&tile(1, 2, 3)).await.expect("Tile fetch should succeed.");

	assert_eq!(image.bytes, b"png-bytes");
	assert_eq!(image.content_type.as_deref(), Some("image/png"));

	broker.fetch_tile(&tile(1, 2, 3)).await.expect("Cached token should be reused.");

	token_mock.assert_hits_async(1).await;
	tile_mock.assert_hits_async(2).await;
	assert_eq!(broker.cache().state(), AuthState::Valid);
}

#[tokio::test]
async fn token_provider_reports_server_errors_as_fetch_failures() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(r#"{"token":"abc"}"#);
		})
		.await;
	let tile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/1/2/3").header("authorization", "Bearer abc");
			then.status(500).body("boom");
		})
		.await;
	let broker = token_broker(&server, ClientConfig::default());
	let err = broker.fetch_tile(&tile(1, 2, 3)).await.expect_err("A 500 should fail the fetch.");

	assert!(matches!(err, Error::Fetch { .. }));

	let source = err.provider_error().expect("Fetch failures carry the provider error.");

	assert_eq!(source.kind(), ProviderErrorKind::Fetch);
	assert!(source.message().contains("HTTP 500"));
	token_mock.assert_hits_async(1).await;
	tile_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn rejected_tokens_are_refreshed_exactly_once() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(r#"{"token":"abc"}"#);
		})
		.await;
	let tile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/1/2/3");
			then.status(401);
		})
		.await;
	let broker = token_broker(&server, ClientConfig::default());
	let err = broker.fetch_tile(&tile(1, 2, 3)).await.expect_err("A 401 should persist.");

	assert!(matches!(err, Error::AuthExpired { .. }));
	token_mock.assert_hits_async(2).await;
	tile_mock.assert_hits_async(2).await;
}

#[tokio::test]
async fn failed_token_exchange_surfaces_as_refresh_error() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).body("maintenance");
		})
		.await;
	let broker = token_broker(&server, ClientConfig::default());
	let err = broker.fetch_tile(&tile(1, 2, 3)).await.expect_err("Token exchange should fail.");

	assert!(matches!(err, Error::AuthenticationRefresh { .. }));
	assert_eq!(err.provider_error().map(|e| e.kind()), Some(ProviderErrorKind::Fetch));
	token_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn template_provider_fetches_without_authentication() {
	let server = MockServer::start_async().await;
	let tile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/3/5/2.png");
			then.status(200).header("content-type", "image/png").body("tile");
		})
		.await;
	let template = UrlTemplate::parse(server.url("/{z}/{x}/{y}.png"))
		.expect("Mock template should parse.");
	let provider = TemplateProvider::new("osm", template);
	let broker = TileBroker::new(Arc::new(provider), reqwest_env(ClientConfig::default()));

	for _ in 0..3 {
		let image = broker.fetch_tile(&tile(3, 5, 2)).await.expect("Tile fetch should succeed.");

		assert_eq!(image.bytes, b"tile");
	}

	tile_mock.assert_hits_async(3).await;
	assert_eq!(broker.cache().state(), AuthState::Bypassed);
	assert_eq!(broker.cache().metrics().attempts(), 1);
}

#[tokio::test]
async fn slow_tiles_time_out() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/1/2/3.png");
			then.status(200).delay(StdDuration::from_millis(500)).body("late");
		})
		.await;

	let template = UrlTemplate::parse(server.url("/{z}/{x}/{y}.png"))
		.expect("Mock template should parse.");
	let provider = TemplateProvider::new("slow", template);
	let client = ClientConfig::default().with_timeout(StdDuration::from_millis(50));
	let broker = TileBroker::new(Arc::new(provider), reqwest_env(client));
	let err = broker.fetch_tile(&tile(1, 2, 3)).await.expect_err("The fetch should time out.");

	assert!(matches!(err, Error::Fetch { .. }));
	assert_eq!(err.provider_error().map(|e| e.kind()), Some(ProviderErrorKind::Timeout));
}
