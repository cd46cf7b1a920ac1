// self
use tile_broker::{_preludet::*, broker::TileBroker, cache::AuthState};

const CONCURRENCY: usize = 16;

async fn fetch_concurrently(broker: &Arc<TileBroker>, count: usize) -> Vec<Result<String>> {
	let handles = (0..count)
		.map(|i| {
			let broker = broker.clone();

			tokio::spawn(async move {
				let x = u32::try_from(i).expect("Tile index should fit in u32.");
				let image = broker.fetch_tile(&tile(5, x, 7)).await?;

				Ok::<_, Error>(String::from_utf8(image.bytes).expect("Counting tiles are UTF-8."))
			})
		})
		.collect::<Vec<_>>();
	let mut results = Vec::with_capacity(count);

	for handle in handles {
		results.push(handle.await.expect("Fetch task should not panic."));
	}

	results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_runs_one_pre_auth() {
	let provider = Arc::new(CountingProvider::new());
	let broker = Arc::new(counting_broker(provider.clone()));
	let results = fetch_concurrently(&broker, CONCURRENCY).await;

	for (i, result) in results.into_iter().enumerate() {
		let body = result.expect("Every fetch should share the first context.");

		assert_eq!(body, format!("test/5/{i}/7@token-1"));
	}

	assert_eq!(provider.pre_auths(), 1);
	assert_eq!(provider.tiles(), CONCURRENCY);
	assert_eq!(broker.cache().metrics().attempts(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_waiters_share_one_refresh_failure() {
	let provider = Arc::new(
		CountingProvider::new()
			.failing_pre_auths(1)
			.with_pre_auth_delay(StdDuration::from_millis(200)),
	);
	let broker = Arc::new(counting_broker(provider.clone()));
	let handles = (0..CONCURRENCY)
		.map(|_| {
			let broker = broker.clone();

			tokio::spawn(async move { broker.fetch_tile(&tile(1, 1, 1)).await })
		})
		.collect::<Vec<_>>();
	let mut sources = Vec::new();

	for handle in handles {
		let err = handle
			.await
			.expect("Fetch task should not panic.")
			.expect_err("Every waiter should observe the failed refresh.");
		let Error::AuthenticationRefresh { source, .. } = err else {
			panic!("Expected an authentication refresh failure.");
		};

		sources.push(source);
	}

	assert!(sources.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
	assert_eq!(provider.pre_auths(), 1);
	assert_eq!(provider.tiles(), 0);
	assert_eq!(broker.cache().state(), AuthState::Uninitialized);

	broker.fetch_tile(&tile(1, 1, 1)).await.expect("The next cycle should refresh again.");

	assert_eq!(provider.pre_auths(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_expiry_reports_trigger_one_refresh() {
	let provider = Arc::new(CountingProvider::new().with_script(TileScript::ExpireUntil(2)));
	let broker = Arc::new(counting_broker(provider.clone()));
	let results = fetch_concurrently(&broker, CONCURRENCY).await;

	for result in results {
		let body = result.expect("Every fetch should succeed after the refresh.");

		assert!(body.ends_with("@token-2"), "Unexpected tile body `{body}`.");
	}

	assert_eq!(provider.pre_auths(), 2);
	assert_eq!(broker.cache().metrics().invalidations(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bypass_stops_pre_auth_for_a_thousand_fetches() {
	let provider = Arc::new(CountingProvider::new().bypassing());
	let broker = Arc::new(counting_broker(provider.clone()));

	broker.fetch_tile(&tile(0, 0, 0)).await.expect("Initial fetch should succeed.");

	assert_eq!(provider.pre_auths(), 1);

	let results = fetch_concurrently(&broker, 1000).await;

	assert!(results.iter().all(|result| result.is_ok()));
	assert_eq!(provider.pre_auths(), 1);
	assert_eq!(broker.cache().state(), AuthState::Bypassed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bypass_ignores_expiry_signals() {
	let provider =
		Arc::new(CountingProvider::new().bypassing().with_script(TileScript::AlwaysExpired));
	let broker = Arc::new(counting_broker(provider.clone()));
	let results = fetch_concurrently(&broker, 1000).await;

	assert!(results.iter().all(|result| matches!(result, Err(Error::AuthExpired { .. }))));
	assert_eq!(provider.pre_auths(), 1);
	assert_eq!(broker.cache().metrics().invalidations(), 0);
}
