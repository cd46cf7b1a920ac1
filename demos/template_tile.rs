//! Demonstrates building a template provider from a host-side spec and fetching tiles through the
//! broker with the default reqwest transport and a customized error message.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use tile_broker::{
	broker::TileBroker,
	config::{ClientConfig, ErrorMessages},
	http::ReqwestHttpClient,
	provider::{ProviderEnv, ProviderKind, ProviderSpec},
	reqwest::Client,
	tile::{LayerName, TileRequest},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let tile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/satellite/3/5/2.png");
			then.status(200).header("content-type", "image/png").body("demo-tile");
		})
		.await;
	let spec = ProviderSpec {
		name: "demo-tiles".into(),
		kind: ProviderKind::Template,
		params: serde_json::from_value(serde_json::json!({
			"url": server.url("/{layer}/{z}/{x}/{y}.png"),
		}))?,
	};
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let messages = ErrorMessages::default()
		.with_message(ErrorMessages::FETCH_FAILED, "{provider} has no tile at {url} ({status})");
	let env = ProviderEnv::new(ClientConfig::default(), messages, http_client);
	let broker = TileBroker::from_spec(&spec, env)?;
	let layer = LayerName::new("satellite")?;
	let image = broker.fetch_tile(&TileRequest::new(layer.clone(), 3, 5, 2)).await?;

	println!("Fetched {} bytes ({:?}).", image.len(), image.content_type);

	if let Err(e) = broker.fetch_tile(&TileRequest::new(layer, 3, 5, 3)).await {
		let message = e.provider_error().map(|source| source.message().to_owned());

		println!("Missing tile: {}.", message.unwrap_or_else(|| e.to_string()));
	}

	tile_mock.assert_async().await;

	Ok(())
}
