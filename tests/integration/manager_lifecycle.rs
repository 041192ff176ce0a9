//! Manager readiness, failure, and publication behaviour.

// std
use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use jsonwebtoken::jwk::JwkSet;
use jwks_mesh::{Error, KeyManager, KeySource, ReadinessState, Result, StaticKeySource};
use tokio_util::sync::CancellationToken;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};
// self
use crate::common::{self, JWKS_PATH};

async fn requests(server: &MockServer) -> usize {
	server.received_requests().await.map(|requests| requests.len()).unwrap_or_default()
}

#[tokio::test]
async fn max_age_defers_next_manager_refresh() -> Result<()> {
	common::init_tracing();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_string(common::jwks_body(vec![common::public_jwk("k1", 1)]))
				.insert_header("cache-control", "public, max-age=120"),
		)
		.mount(&server)
		.await;

	// Keep the upstream connection alive across the paused interval.
	let client = reqwest::Client::builder().pool_idle_timeout(None).build()?;
	let manager =
		KeyManager::builder().policy(common::fast_policy(5)).http_client(client).build()?;

	manager.add_source_urls([format!("{}{JWKS_PATH}", server.uri())])?;

	let (cancel, handle) = common::start(&manager).await;

	assert_eq!(requests(&server).await, 1);

	tokio::time::pause();
	tokio::task::yield_now().await;
	tokio::time::advance(Duration::from_secs(119)).await;
	tokio::task::yield_now().await;

	assert_eq!(requests(&server).await, 1);

	tokio::time::advance(Duration::from_secs(2)).await;

	for _ in 0..200 {
		if requests(&server).await >= 2 {
			break;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	assert!(requests(&server).await >= 2);

	cancel.cancel();
	handle.await.expect("join")?;

	Ok(())
}

#[tokio::test]
async fn static_key_is_published_once_ready() -> Result<()> {
	common::init_tracing();

	let manager = common::manager(common::fast_policy(5));

	manager.add_public_keys([common::public_jwk("local", 1)])?;

	let (cancel, handle) = common::start(&manager).await;
	let published: JwkSet = serde_json::from_slice(&manager.jwks())?;

	assert_eq!(common::key_ids(&published), ["local"]);
	assert_eq!(manager.get_keys("local")?.len(), 1);
	assert_eq!(manager.readiness(), ReadinessState::Ready);

	cancel.cancel();

	handle.await.expect("join")?;

	Ok(())
}

#[tokio::test]
async fn source_that_never_loads_fails_the_manager() {
	common::init_tracing();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ResponseTemplate::new(500))
		.expect(3)
		.mount(&server)
		.await;

	let manager = common::manager(common::fast_policy(2));

	manager.add_public_keys([common::public_jwk("local", 1)]).expect("keys");
	manager.add_source_urls([format!("{}{JWKS_PATH}", server.uri())]).expect("urls");

	let result = tokio::time::timeout(Duration::from_secs(5), manager.run(CancellationToken::new()))
		.await
		.expect("run returns");

	assert!(matches!(result, Err(Error::SourceFetch { .. })));
	assert!(matches!(
		manager.wait_for_keys(&CancellationToken::new()).await,
		Err(Error::ManagerFailed(_))
	));
	assert!(matches!(manager.readiness(), ReadinessState::Failed(_)));

	server.verify().await;
}

#[tokio::test]
async fn source_that_loaded_once_keeps_the_manager_alive() {
	common::init_tracing();

	let server = MockServer::start().await;
	let served = Arc::new(AtomicUsize::new(0));
	let body = common::jwks_body(vec![common::public_jwk("upstream", 2)]);

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with({
			let served = served.clone();

			move |_: &wiremock::Request| {
				if served.fetch_add(1, Ordering::SeqCst) == 0 {
					ResponseTemplate::new(200).set_body_string(body.clone())
				} else {
					ResponseTemplate::new(500)
				}
			}
		})
		.mount(&server)
		.await;

	let manager = common::manager(common::fast_policy(1));

	manager.add_source_urls([format!("{}{JWKS_PATH}", server.uri())]).expect("urls");

	let (cancel, handle) = common::start(&manager).await;

	// Far more failures than the warm-up budget allows.
	tokio::time::sleep(Duration::from_millis(200)).await;

	assert!(!handle.is_finished());
	assert!(served.load(Ordering::SeqCst) > 3);
	assert_eq!(common::key_ids(&manager.merged_keys()), ["upstream"]);

	let summary = manager.key_summary();

	assert_eq!(summary[0].keys, ["upstream"]);
	assert!(summary[0].refresh.refresh_errors > 1);

	cancel.cancel();

	assert!(handle.await.expect("join").is_ok());
}

#[tokio::test]
async fn duplicate_ids_across_sources() {
	let manager = common::manager(common::fast_policy(1));

	manager
		.add_public_keys([common::public_jwk("shared", 1), common::public_jwk("clash", 1)])
		.expect("a");
	manager.add_public_keys([common::public_jwk("shared", 1)]).expect("b");
	manager.add_public_keys([common::public_jwk("clash", 2)]).expect("c");

	let (cancel, _handle) = common::start(&manager).await;

	assert_eq!(manager.get_keys("shared").expect("shared").len(), 1);
	assert!(matches!(manager.get_keys("clash"), Err(Error::KeyConflict { .. })));
	assert_eq!(manager.merged_keys().keys.len(), 4);

	cancel.cancel();
}

#[derive(Debug)]
struct FlippingSource {
	sets: [Arc<JwkSet>; 2],
	current: AtomicBool,
}
#[async_trait::async_trait]
impl KeySource for FlippingSource {
	async fn refresh(&self) -> Result<Duration> {
		Ok(Duration::from_secs(3600))
	}

	fn keys(&self) -> Arc<JwkSet> {
		self.sets[self.current.load(Ordering::SeqCst) as usize].clone()
	}

	fn name(&self) -> &str {
		"flipping"
	}
}

#[test]
fn readers_never_observe_a_partial_merge() {
	let manager = common::manager(common::fast_policy(1));
	let small = JwkSet { keys: vec![common::public_jwk("a1", 1), common::public_jwk("a2", 2)] };
	let large = JwkSet {
		keys: vec![
			common::public_jwk("b1", 3),
			common::public_jwk("b2", 4),
			common::public_jwk("b3", 5),
		],
	};
	let expected = [common::key_ids(&small), common::key_ids(&large)];
	let source = Arc::new(FlippingSource {
		sets: [Arc::new(small), Arc::new(large)],
		current: AtomicBool::new(false),
	});

	manager.add_source(Arc::new(StaticKeySource::new(Vec::new())));
	manager.add_source(source.clone());
	manager.merge_keys();

	let done = AtomicBool::new(false);
	let violations = Mutex::new(Vec::new());

	std::thread::scope(|scope| {
		for _ in 0..4 {
			scope.spawn(|| {
				while !done.load(Ordering::SeqCst) {
					let document: JwkSet =
						serde_json::from_slice(&manager.jwks()).expect("document");
					let ids = common::key_ids(&document);

					if !expected.contains(&ids) {
						violations.lock().expect("lock").push(ids);
					}
				}
			});
		}

		for _ in 0..500 {
			source.current.fetch_xor(true, Ordering::SeqCst);
			manager.merge_keys();
		}

		done.store(true, Ordering::SeqCst);
	});

	assert!(violations.into_inner().expect("lock").is_empty());
}
