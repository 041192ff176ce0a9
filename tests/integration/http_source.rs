//! HTTP key source behaviour against a mock upstream.

// std
use std::time::Duration;
// crates.io
use jwks_mesh::{Error, HttpKeySource, KeySource, RefreshPolicy, Result, http::client};
use url::Url;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{header, method, path},
};
// self
use crate::common::{self, JWKS_PATH};

fn source(server: &MockServer, policy: RefreshPolicy) -> HttpKeySource {
	let url = Url::parse(&format!("{}{JWKS_PATH}", server.uri())).expect("url");

	HttpKeySource::new(url, client::default_client().expect("client"), policy)
}

fn ok_response(body: String) -> ResponseTemplate {
	ResponseTemplate::new(200).set_body_string(body).insert_header("content-type", "application/json")
}

#[tokio::test]
async fn max_age_schedules_next_refresh() -> Result<()> {
	common::init_tracing();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(
			ok_response(common::jwks_body(vec![common::public_jwk("k1", 1)]))
				.insert_header("cache-control", "public, max-age=120"),
		)
		.expect(1)
		.mount(&server)
		.await;

	let source = source(&server, RefreshPolicy::default());

	assert!(source.keys().keys.is_empty());
	assert_eq!(source.refresh().await?, Duration::from_secs(120));
	assert_eq!(common::key_ids(&source.keys()), ["k1"]);
	assert!(source.last_refreshed().is_some());

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn caching_prohibitions_use_default_interval() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(
			ok_response(common::jwks_body(vec![common::public_jwk("k1", 1)]))
				.insert_header("cache-control", "no-store, max-age=600"),
		)
		.mount(&server)
		.await;

	let source = source(&server, RefreshPolicy::default());

	assert_eq!(source.refresh().await?, Duration::from_secs(30));

	Ok(())
}

#[tokio::test]
async fn etag_is_replayed_and_not_modified_keeps_keys() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.and(header("if-none-match", "\"v1\""))
		.respond_with(ResponseTemplate::new(304).insert_header("cache-control", "max-age=45"))
		.with_priority(1)
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(
			ok_response(common::jwks_body(vec![common::public_jwk("k1", 1)]))
				.insert_header("etag", "\"v1\""),
		)
		.expect(1)
		.mount(&server)
		.await;

	let source = source(&server, RefreshPolicy::default());

	assert_eq!(source.refresh().await?, Duration::from_secs(30));
	assert_eq!(source.refresh().await?, Duration::from_secs(45));
	assert_eq!(common::key_ids(&source.keys()), ["k1"]);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn failures_leave_previous_keys_in_place() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ok_response(common::jwks_body(vec![common::public_jwk("k1", 1)])))
		.up_to_n_times(1)
		.mount(&server)
		.await;

	let source = source(&server, RefreshPolicy::default());

	source.refresh().await?;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ResponseTemplate::new(503))
		.up_to_n_times(1)
		.mount(&server)
		.await;

	assert!(matches!(source.refresh().await, Err(Error::SourceFetch { .. })));

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ok_response("{\"keys\": [".into()))
		.mount(&server)
		.await;

	assert!(matches!(source.refresh().await, Err(Error::SourceParse { .. })));
	assert_eq!(common::key_ids(&source.keys()), ["k1"]);

	Ok(())
}

#[tokio::test]
async fn oversized_documents_are_rejected() {
	let server = MockServer::start().await;
	let keys = (0..8).map(|i| common::public_jwk(&format!("k{i}"), i)).collect();

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ok_response(common::jwks_body(keys)))
		.mount(&server)
		.await;

	let policy = RefreshPolicy { max_response_bytes: 256, ..Default::default() };
	let source = source(&server, policy);

	assert!(matches!(source.refresh().await, Err(Error::SourceFetch { .. })));
	assert!(source.keys().keys.is_empty());
}
